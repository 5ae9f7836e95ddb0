use geo::Point;
use log::debug;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::error::NetworkError;
use crate::geom;

/// The planned cable network over lot centroids (plus any Steiner points
/// that survived pruning).
#[derive(Debug, Clone, PartialEq)]
pub struct CableNetwork {
    pub nodes: Vec<Point<f64>>,
    /// Spanning-tree edges as node index pairs.
    pub tree_edges: Vec<(usize, usize)>,
    /// Redundancy edges closing rings for fault tolerance.
    pub loop_edges: Vec<(usize, usize)>,
    pub total_length: f64,
}

impl CableNetwork {
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.tree_edges.len() + self.loop_edges.len()
    }

    fn length_of(&self, edges: &[(usize, usize)]) -> f64 {
        edges
            .iter()
            .map(|&(a, b)| geom::dist(self.nodes[a], self.nodes[b]))
            .sum()
    }
}

/// Candidate Steiner points: centroids of the Delaunay triangles over the
/// terminals.
pub fn steiner_candidates(terminals: &[Point<f64>]) -> Vec<Point<f64>> {
    let mut triangulation = DelaunayTriangulation::<Point2<f64>>::new();
    for p in terminals {
        let _ = triangulation.insert(Point2::new(p.x(), p.y()));
    }
    triangulation
        .inner_faces()
        .map(|face| {
            let [a, b, c] = face.positions();
            Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
        })
        .collect()
}

/// Plan the cable network: distance-cut graph, Kruskal MST, then the
/// `⌈ratio·n⌉` shortest non-tree edges that close a ring.
///
/// With `steiner` candidates, the tree is built over terminals plus
/// candidates and candidate leaves are pruned away afterwards.
///
/// A disconnected graph returns `NetworkError::Disconnected` carrying the
/// spanning forest and the node groups, so callers can keep the forest
/// and surface a warning.
pub fn plan_network(
    terminals: &[Point<f64>],
    steiner: &[Point<f64>],
    max_edge_distance: f64,
    redundancy_ratio: f64,
) -> Result<CableNetwork, NetworkError> {
    if terminals.is_empty() {
        return Err(NetworkError::Empty);
    }
    let mut nodes: Vec<Point<f64>> = terminals.to_vec();
    nodes.extend_from_slice(steiner);
    let n = nodes.len();

    let mut graph = UnGraph::<(), f64>::with_capacity(n, n * 4);
    let indices: Vec<_> = nodes.iter().map(|_| graph.add_node(())).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let d = geom::dist(nodes[i], nodes[j]);
            if d <= max_edge_distance {
                graph.add_edge(indices[i], indices[j], d);
            }
        }
    }

    // Kruskal with union-find inside petgraph; edge insertion order above
    // is deterministic, so ties resolve identically on every run.
    let mut tree_edges: Vec<(usize, usize)> = petgraph::algo::min_spanning_tree(&graph)
        .filter_map(|element| match element {
            Element::Edge { source, target, .. } => {
                Some((source.min(target), source.max(target)))
            }
            Element::Node { .. } => None,
        })
        .collect();
    tree_edges.sort_unstable();

    // Prune Steiner candidates that ended up as dead ends: a degree-1
    // candidate shortens nothing.
    if !steiner.is_empty() {
        loop {
            let mut degree = vec![0usize; n];
            for &(a, b) in &tree_edges {
                degree[a] += 1;
                degree[b] += 1;
            }
            let before = tree_edges.len();
            tree_edges.retain(|&(a, b)| {
                let leaf_candidate = |v: usize| v >= terminals.len() && degree[v] == 1;
                !leaf_candidate(a) && !leaf_candidate(b)
            });
            if tree_edges.len() == before {
                break;
            }
        }
    }

    // Connected components under the tree.
    let mut uf = UnionFind::<usize>::new(n);
    for &(a, b) in &tree_edges {
        uf.union(a, b);
    }
    let used: Vec<bool> = {
        let mut used = vec![false; n];
        for i in 0..terminals.len() {
            used[i] = true;
        }
        for &(a, b) in &tree_edges {
            used[a] = true;
            used[b] = true;
        }
        used
    };

    let mut ring_edges: Vec<(usize, usize, f64)> = graph
        .edge_indices()
        .filter_map(|e| {
            let (a, b) = graph.edge_endpoints(e)?;
            let (a, b) = (a.index().min(b.index()), a.index().max(b.index()));
            if tree_edges.binary_search(&(a, b)).is_ok() || !used[a] || !used[b] {
                return None;
            }
            // Only edges inside one component close a ring.
            (uf.find(a) == uf.find(b)).then(|| (a, b, graph[e]))
        })
        .collect();
    ring_edges.sort_by(|x, y| x.2.total_cmp(&y.2).then_with(|| (x.0, x.1).cmp(&(y.0, y.1))));

    let target_loops = (redundancy_ratio * terminals.len() as f64).ceil() as usize;
    let loop_edges: Vec<(usize, usize)> =
        ring_edges.into_iter().take(target_loops).map(|(a, b, _)| (a, b)).collect();

    // Drop unused Steiner nodes and remap indices.
    let mut remap = vec![usize::MAX; n];
    let mut compact_nodes = Vec::new();
    for (i, keep) in used.iter().enumerate() {
        if *keep {
            remap[i] = compact_nodes.len();
            compact_nodes.push(nodes[i]);
        }
    }
    let remap_edges = |edges: Vec<(usize, usize)>| {
        edges.into_iter().map(|(a, b)| (remap[a], remap[b])).collect::<Vec<_>>()
    };
    let mut network = CableNetwork {
        nodes: compact_nodes,
        tree_edges: remap_edges(tree_edges),
        loop_edges: remap_edges(loop_edges),
        total_length: 0.0,
    };
    network.total_length =
        network.length_of(&network.tree_edges) + network.length_of(&network.loop_edges);

    // A spanning tree over c components has n - c edges; fewer terminals
    // reached than exist means the cut-off disconnected the graph.
    let mut components: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
    for i in 0..terminals.len() {
        components.entry(uf.find(i)).or_default().push(i);
    }
    if components.len() > 1 {
        debug!("cable network split into {} components", components.len());
        return Err(NetworkError::Disconnected {
            network,
            components: components.into_values().collect(),
        });
    }
    Ok(network)
}
