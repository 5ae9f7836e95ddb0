use geo::Point;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom;

/// Lloyd iterations cap for each k-means run.
const MAX_ITERATIONS: usize = 100;

/// Convergence: stop once no centre moves further than this (m).
const CENTER_TOLERANCE: f64 = 0.1;

/// A placed transformer and the lots it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformer {
    pub position: Point<f64>,
    /// Ids of the lots assigned to this transformer.
    pub served: Vec<u32>,
    /// Summed load of the served lots (kW).
    pub load_kw: f64,
}

/// Cost model for choosing between feasible cluster counts.
#[derive(Debug, Clone, Copy)]
pub struct TransformerCosts {
    pub transformer: f64,
    pub cable_per_m: f64,
    /// Weight on the variance of cluster loads.
    pub variance_weight: f64,
}

#[derive(Debug, Clone)]
pub struct TransformerPlan {
    pub transformers: Vec<Transformer>,
    pub cost: f64,
    /// False when no k in the band kept every cluster under capacity.
    pub feasible: bool,
    /// Largest centre movement on the final Lloyd iteration.
    pub final_movement: f64,
}

impl TransformerPlan {
    pub fn max_load(&self) -> f64 {
        self.transformers.iter().map(|t| t.load_kw).fold(0.0, f64::max)
    }
}

/// k-means++ initialisation: first centre uniform, the rest weighted by
/// squared distance to the nearest chosen centre.
fn kmeans_pp_init(points: &[Point<f64>], k: usize, rng: &mut StdRng) -> Vec<Point<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..points.len())]);
    while centers.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centers
                    .iter()
                    .map(|c| geom::dist(*p, *c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= f64::EPSILON {
            // All points coincide with a centre already.
            centers.push(points[rng.random_range(0..points.len())]);
            continue;
        }
        let mut draw = rng.random::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            draw -= w;
            if draw <= 0.0 {
                chosen = i;
                break;
            }
        }
        centers.push(points[chosen]);
    }
    centers
}

/// Lloyd's algorithm. Returns centres, assignment and the final maximum
/// centre movement.
fn kmeans(
    points: &[Point<f64>],
    k: usize,
    rng: &mut StdRng,
) -> (Vec<Point<f64>>, Vec<usize>, f64) {
    let mut centers = kmeans_pp_init(points, k, rng);
    let mut assignment = vec![0usize; points.len()];
    let mut movement = f64::INFINITY;

    for _ in 0..MAX_ITERATIONS {
        for (i, p) in points.iter().enumerate() {
            assignment[i] = centers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    geom::dist(*p, **a).total_cmp(&geom::dist(*p, **b))
                })
                .map(|(idx, _)| idx)
                .unwrap_or(0);
        }

        let mut sums = vec![(0.0f64, 0.0f64, 0usize); k];
        for (p, &a) in points.iter().zip(&assignment) {
            sums[a].0 += p.x();
            sums[a].1 += p.y();
            sums[a].2 += 1;
        }
        // An empty cluster reseeds at the point farthest from its current
        // centre, which keeps every run deterministic.
        let farthest = points
            .iter()
            .enumerate()
            .max_by(|(i, p), (j, q)| {
                geom::dist(**p, centers[assignment[*i]])
                    .total_cmp(&geom::dist(**q, centers[assignment[*j]]))
            })
            .map(|(_, p)| *p);

        movement = 0.0;
        for (c, center) in centers.iter_mut().enumerate() {
            let (sx, sy, count) = sums[c];
            let next = if count == 0 {
                farthest.unwrap_or(*center)
            } else {
                Point::new(sx / count as f64, sy / count as f64)
            };
            movement = movement.max(geom::dist(*center, next));
            *center = next;
        }
        if movement < CENTER_TOLERANCE {
            break;
        }
    }
    (centers, assignment, movement)
}

/// Choose a transformer count and placement.
///
/// k ranges over `[⌈ΣP/C⌉, 2·⌈ΣP/C⌉]`, searched outward from the
/// `lots_hint` size hint; each k is clustered with seeded k-means and
/// scored `k·transformer_cost + cable_cost·Σdist + λ·Var(loads)`. The
/// cheapest plan with every cluster under capacity wins; if none is
/// feasible the least overloaded plan is returned flagged infeasible.
pub fn plan_transformers(
    centroids: &[Point<f64>],
    lot_ids: &[u32],
    load_per_lot_kw: f64,
    capacity_kva: f64,
    lots_hint: usize,
    costs: TransformerCosts,
    seed: u64,
) -> Option<TransformerPlan> {
    if centroids.is_empty() {
        return None;
    }
    debug_assert!(centroids.len() == lot_ids.len(), "one id per centroid");

    let total_load = load_per_lot_kw * centroids.len() as f64;
    let k_min = ((total_load / capacity_kva).ceil().max(1.0) as usize).min(centroids.len());
    let k_max = (2 * k_min).min(centroids.len());

    // The lots-per-transformer hint only orders the search inside the band:
    // counts near it are tried first and win exact-cost ties.
    let hint = centroids.len().div_ceil(lots_hint.max(1)).clamp(k_min, k_max);
    let mut candidates: Vec<usize> = (k_min..=k_max).collect();
    candidates.sort_by_key(|&k| (k.abs_diff(hint), k));

    let mut best: Option<(TransformerPlan, bool)> = None;

    for k in candidates {
        // Independent stream per k keeps the choice of k separable from
        // the clustering draws.
        let mut rng = StdRng::seed_from_u64(seed ^ (k as u64).wrapping_mul(0x9e37_79b9));
        let (centers, assignment, final_movement) = kmeans(centroids, k, &mut rng);

        let mut transformers: Vec<Transformer> = centers
            .iter()
            .map(|&position| Transformer { position, served: Vec::new(), load_kw: 0.0 })
            .collect();
        let mut cable = 0.0;
        for (i, &cluster) in assignment.iter().enumerate() {
            transformers[cluster].served.push(lot_ids[i]);
            transformers[cluster].load_kw += load_per_lot_kw;
            cable += geom::dist(centroids[i], centers[cluster]);
        }
        transformers.retain(|t| !t.served.is_empty());

        let loads: Vec<f64> = transformers.iter().map(|t| t.load_kw).collect();
        let mean = loads.iter().sum::<f64>() / loads.len() as f64;
        let variance =
            loads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / loads.len() as f64;
        let feasible = loads.iter().all(|&l| l <= capacity_kva);
        let cost = transformers.len() as f64 * costs.transformer
            + cable * costs.cable_per_m
            + costs.variance_weight * variance;

        let plan = TransformerPlan { transformers, cost, feasible, final_movement };
        let replace = match &best {
            None => true,
            Some((current, current_feasible)) => match (feasible, current_feasible) {
                (true, false) => true,
                (false, true) => false,
                (true, true) => plan.cost < current.cost,
                (false, false) => plan.max_load() < current.max_load(),
            },
        };
        if replace {
            best = Some((plan, feasible));
        }
    }

    let (plan, feasible) = best?;
    if !feasible {
        debug!("no transformer count in [{k_min}, {k_max}] respects capacity {capacity_kva} kVA");
    }
    Some(plan)
}
