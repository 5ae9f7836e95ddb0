use std::collections::HashMap;

use geo::Point;
use log::debug;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::config::DrainageMode;
use crate::geom;
use crate::types::{Block, BlockClass, Lot, RoadNetwork, Site};

/// Per-lot drainage vector toward the WWTP.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainageArrow {
    pub origin: Point<f64>,
    /// Unit direction.
    pub direction: (f64, f64),
    pub magnitude: f64,
}

/// The drainage sink. The WWTP sits on the utility block hosting it when
/// one was allocated, otherwise at the lowest-elevation site vertex under
/// the elevation model, otherwise at the site centroid.
pub fn wwtp_point(
    site: &Site,
    blocks: &[Block],
    elevation_gradient: Option<(f64, f64)>,
) -> Point<f64> {
    if let Some(host) = blocks
        .iter()
        .filter(|b| b.class == BlockClass::Utility)
        .min_by(|a, b| a.elevation.total_cmp(&b.elevation))
    {
        return host.centroid;
    }
    match elevation_gradient {
        Some((gx, gy)) => site
            .polygon()
            .exterior()
            .points()
            .min_by(|a, b| (gx * a.x() + gy * a.y()).total_cmp(&(gx * b.x() + gy * b.y())))
            .unwrap_or_else(|| site.centroid()),
        None => site.centroid(),
    }
}

/// Straight-line mode: unit vector from each lot centroid toward the WWTP.
fn plan_direct(lots: &[Lot], wwtp: Point<f64>, arrow_length: f64) -> Vec<DrainageArrow> {
    lots.iter()
        .map(|lot| {
            let dx = wwtp.x() - lot.centroid.x();
            let dy = wwtp.y() - lot.centroid.y();
            let len = dx.hypot(dy);
            let direction = if len > geom::EPSILON { (dx / len, dy / len) } else { (0.0, 0.0) };
            DrainageArrow { origin: lot.centroid, direction, magnitude: arrow_length }
        })
        .collect()
}

/// Road-graph node key at millimetre resolution.
fn node_key(p: Point<f64>) -> (i64, i64) {
    ((p.x() * 1_000.0).round() as i64, (p.y() * 1_000.0).round() as i64)
}

/// Network mode: arrows follow the first road-graph edge of the shortest
/// path from each lot's nearest road node toward the WWTP. Lots attached
/// to a node the WWTP cannot reach fall back to the direct vector.
fn plan_over_roads(
    lots: &[Lot],
    roads: &RoadNetwork,
    wwtp: Point<f64>,
    arrow_length: f64,
) -> Vec<DrainageArrow> {
    let mut graph = UnGraph::<Point<f64>, f64>::new_undirected();
    let mut nodes: HashMap<(i64, i64), NodeIndex> = HashMap::new();

    let mut node_at = |graph: &mut UnGraph<Point<f64>, f64>, p: Point<f64>| {
        *nodes.entry(node_key(p)).or_insert_with(|| graph.add_node(p))
    };
    for segment in &roads.segments {
        for line in segment.line.lines() {
            let a = Point::new(line.start.x, line.start.y);
            let b = Point::new(line.end.x, line.end.y);
            let (na, nb) = (node_at(&mut graph, a), node_at(&mut graph, b));
            if na != nb {
                graph.add_edge(na, nb, geom::dist(a, b));
            }
        }
    }
    if graph.node_count() == 0 {
        return plan_direct(lots, wwtp, arrow_length);
    }

    let nearest_node = |p: Point<f64>| {
        graph
            .node_indices()
            .min_by(|&a, &b| {
                geom::dist(p, graph[a]).total_cmp(&geom::dist(p, graph[b]))
            })
            .expect("graph checked non-empty")
    };

    // Single-source shortest paths from the sink; the downhill neighbour
    // of any node is the one closing the distance gap.
    let sink = nearest_node(wwtp);
    let distances = dijkstra(&graph, sink, None, |e| *e.weight());

    lots.iter()
        .map(|lot| {
            let attach = nearest_node(lot.centroid);
            let attach_distance = distances.get(&attach);
            let next_hop = graph
                .edges(attach)
                .filter_map(|edge| {
                    let other = if edge.source() == attach { edge.target() } else { edge.source() };
                    distances.get(&other).map(|d| (other, *d))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(node, _)| node);

            match (attach_distance, next_hop) {
                (Some(&d), Some(next)) if d > 0.0 => {
                    let from = graph[attach];
                    let to = graph[next];
                    let dx = to.x() - from.x();
                    let dy = to.y() - from.y();
                    let len = dx.hypot(dy).max(geom::EPSILON);
                    DrainageArrow {
                        origin: lot.centroid,
                        direction: (dx / len, dy / len),
                        magnitude: arrow_length,
                    }
                }
                (Some(_), _) => {
                    // Attached at the sink node itself: point at the WWTP.
                    plan_direct(std::slice::from_ref(lot), wwtp, arrow_length).remove(0)
                }
                (None, _) => {
                    debug!("lot {} attached to a road node unreachable from the WWTP", lot.id);
                    plan_direct(std::slice::from_ref(lot), wwtp, arrow_length).remove(0)
                }
            }
        })
        .collect()
}

/// Drainage arrows for every lot, fully deterministic given the inputs.
pub fn plan_drainage(
    lots: &[Lot],
    roads: &RoadNetwork,
    wwtp: Point<f64>,
    mode: DrainageMode,
    arrow_length: f64,
) -> Vec<DrainageArrow> {
    match mode {
        DrainageMode::Direct => plan_direct(lots, wwtp, arrow_length),
        DrainageMode::Network => plan_over_roads(lots, roads, wwtp, arrow_length),
    }
}
