use geo::{Contains, Polygon, Rect};

use crate::geom;
use crate::roads::RoadGrid;

use super::{Bounds, Evaluation, Problem};

/// A facility type with its dimension range (m).
#[derive(Debug, Clone)]
pub struct FacilityKind {
    pub name: &'static str,
    pub min_dim: f64,
    pub max_dim: f64,
}

/// One decoded plot: centre position plus dimensions.
#[derive(Debug, Clone, Copy)]
pub struct FacilityPlot {
    pub kind: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FacilityPlot {
    pub fn polygon(&self) -> Polygon<f64> {
        geom::rect_polygon(
            self.x - self.width / 2.0,
            self.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Hard-constrained facility placement: position `kinds.len()` rectangular
/// plots inside the buildable area.
///
/// Genes per plot: `(x, y)` normalised to the buildable bounds plus
/// `(width, height)` in metres. Objectives (minimised): −total plot area,
/// centroid spread (clustering), and summed pairwise distance (a road
/// length proxy). Constraints follow the constraint-domination rule:
///  * g₁: every plot pair keeps its type-pair minimum separation,
///  * g₂: every plot lies inside the buildable area,
///  * g₃ (when a road grid is attached): every plot reaches a road cell.
pub struct FacilityProblem {
    kinds: Vec<FacilityKind>,
    buildable: Polygon<f64>,
    extent: Rect<f64>,
    /// `separations[i][j]` = minimum edge-to-edge gap between kinds i, j.
    separations: Vec<Vec<f64>>,
    road_grid: Option<RoadGrid>,
    bounds: Bounds,
}

impl FacilityProblem {
    pub fn new(
        buildable: Polygon<f64>,
        kinds: Vec<FacilityKind>,
        base_separation: f64,
    ) -> Self {
        assert!(!kinds.is_empty(), "at least one facility kind is required");
        let extent = geom::bounds(&buildable).expect("buildable area must be non-empty");
        let n = kinds.len();
        let separations = vec![vec![base_separation; n]; n];

        let mut lower = Vec::with_capacity(n * 4);
        let mut upper = Vec::with_capacity(n * 4);
        for kind in &kinds {
            lower.extend_from_slice(&[0.0, 0.0, kind.min_dim, kind.min_dim]);
            upper.extend_from_slice(&[1.0, 1.0, kind.max_dim, kind.max_dim]);
        }

        Self {
            kinds,
            buildable,
            extent,
            separations,
            road_grid: None,
            bounds: Bounds::new(lower, upper),
        }
    }

    /// Override the minimum separation for one unordered type pair.
    pub fn set_separation(&mut self, a: usize, b: usize, distance: f64) {
        self.separations[a][b] = distance;
        self.separations[b][a] = distance;
    }

    /// Require every plot to reach a road cell on this grid.
    pub fn with_road_grid(mut self, grid: RoadGrid) -> Self {
        self.road_grid = Some(grid);
        self
    }

    #[inline]
    pub fn num_plots(&self) -> usize {
        self.kinds.len()
    }

    /// Decode a gene vector into concrete plots.
    pub fn decode(&self, genes: &[f64]) -> Vec<FacilityPlot> {
        let width_range = self.extent.width();
        let height_range = self.extent.height();
        (0..self.num_plots())
            .map(|i| {
                let g = &genes[i * 4..i * 4 + 4];
                FacilityPlot {
                    kind: i,
                    x: self.extent.min().x + g[0] * width_range,
                    y: self.extent.min().y + g[1] * height_range,
                    width: g[2],
                    height: g[3],
                }
            })
            .collect()
    }
}

impl Problem for FacilityProblem {
    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn num_objectives(&self) -> usize {
        3
    }

    fn evaluate(&self, genes: &[f64]) -> Evaluation {
        let plots = self.decode(genes);
        let n = plots.len();

        let total_area: f64 = plots.iter().map(FacilityPlot::area).sum();

        let mean_x = plots.iter().map(|p| p.x).sum::<f64>() / n as f64;
        let mean_y = plots.iter().map(|p| p.y).sum::<f64>() / n as f64;
        let spread: f64 = plots
            .iter()
            .map(|p| (p.x - mean_x).hypot(p.y - mean_y))
            .sum();

        let mut pairwise = 0.0;
        let mut violation = 0.0;

        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&plots[i], &plots[j]);
                pairwise += (a.x - b.x).hypot(a.y - b.y);

                // Edge-to-edge gap along the freer axis; a plot pair is
                // separated as soon as one axis clears the requirement.
                let sep_x = (a.x - b.x).abs() - (a.width + b.width) / 2.0;
                let sep_y = (a.y - b.y).abs() - (a.height + b.height) / 2.0;
                let g = self.separations[a.kind][b.kind] - sep_x.max(sep_y);
                if g > 0.0 {
                    violation += g;
                }
            }
        }

        for plot in &plots {
            let shape = plot.polygon();
            if !self.buildable.contains(&shape) {
                let outside = geom::multi_area(&geom::difference(
                    &geo::MultiPolygon(vec![shape]),
                    &geo::MultiPolygon(vec![self.buildable.clone()]),
                ));
                // Touching the boundary is fine; any real excursion counts.
                if outside > geom::AREA_EPSILON {
                    violation += outside;
                }
            }
        }

        if let Some(grid) = &self.road_grid {
            for plot in &plots {
                let reachable = grid
                    .cell_of(geo::Point::new(plot.x, plot.y))
                    .is_some_and(|cell| grid.can_reach_road(cell));
                if !reachable {
                    violation += 1.0;
                }
            }
        }

        Evaluation {
            objectives: vec![-total_area, spread, pairwise],
            violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::deadline::Deadline;
    use crate::geom::rect_polygon;
    use crate::optimize::{self, Nsga2Params};

    use super::*;

    fn four_kinds() -> Vec<FacilityKind> {
        vec![
            FacilityKind { name: "warehouse", min_dim: 30.0, max_dim: 80.0 },
            FacilityKind { name: "office", min_dim: 30.0, max_dim: 60.0 },
            FacilityKind { name: "factory", min_dim: 30.0, max_dim: 90.0 },
            FacilityKind { name: "storage", min_dim: 30.0, max_dim: 70.0 },
        ]
    }

    #[test]
    fn decode_maps_normalised_positions_into_bounds() {
        let problem = FacilityProblem::new(
            rect_polygon(0.0, 0.0, 500.0, 400.0),
            four_kinds(),
            10.0,
        );
        let genes = vec![
            0.5, 0.5, 40.0, 40.0,
            0.0, 0.0, 30.0, 30.0,
            1.0, 1.0, 30.0, 30.0,
            0.25, 0.75, 50.0, 50.0,
        ];
        let plots = problem.decode(&genes);
        assert_eq!(plots.len(), 4);
        assert!((plots[0].x - 250.0).abs() < 1e-9);
        assert!((plots[0].y - 200.0).abs() < 1e-9);
        assert!((plots[2].x - 500.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_plots_violate_separation() {
        let problem = FacilityProblem::new(
            rect_polygon(0.0, 0.0, 500.0, 400.0),
            four_kinds(),
            10.0,
        );
        // All four plots stacked at the centre.
        let genes: Vec<f64> = (0..4).flat_map(|_| [0.5, 0.5, 40.0, 40.0]).collect();
        let eval = problem.evaluate(&genes);
        assert!(eval.violation > 0.0);
    }

    #[test]
    fn well_separated_plots_are_feasible() {
        let problem = FacilityProblem::new(
            rect_polygon(0.0, 0.0, 500.0, 400.0),
            four_kinds(),
            10.0,
        );
        let genes = vec![
            0.15, 0.2, 40.0, 40.0,
            0.85, 0.2, 40.0, 40.0,
            0.15, 0.8, 40.0, 40.0,
            0.85, 0.8, 40.0, 40.0,
        ];
        let eval = problem.evaluate(&genes);
        assert_eq!(eval.violation, 0.0, "violation {}", eval.violation);
    }

    #[test]
    fn road_access_constraint_flags_far_plots() {
        use geo::{Coord, LineString, Rect};

        use crate::types::{RoadClass, RoadNetwork, RoadSegment};

        // One vertical road near the east edge of a 500x500 area.
        let road = RoadSegment::new(
            LineString(vec![Coord { x: 490.0, y: 0.0 }, Coord { x: 490.0, y: 500.0 }]),
            10.0,
            RoadClass::Main,
        );
        let network = RoadNetwork { segments: vec![road], ..Default::default() };
        let grid = RoadGrid::build(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 500.0, y: 500.0 }),
            &network,
            1.0,
        );
        let problem = FacilityProblem::new(
            rect_polygon(0.0, 0.0, 500.0, 500.0),
            vec![FacilityKind { name: "warehouse", min_dim: 30.0, max_dim: 80.0 }],
            10.0,
        )
        .with_road_grid(grid);

        // 15 m from the road: reachable, no violation.
        let near = problem.evaluate(&[0.95, 0.5, 40.0, 40.0]);
        assert_eq!(near.violation, 0.0, "violation {}", near.violation);
        // 440 m away: beyond the search radius, counted as unreachable.
        let far = problem.evaluate(&[0.1, 0.5, 40.0, 40.0]);
        assert!(far.violation >= 1.0);
    }

    #[test]
    fn constrained_search_reaches_feasibility() {
        let mut problem = FacilityProblem::new(
            rect_polygon(0.0, 0.0, 500.0, 400.0),
            four_kinds(),
            10.0,
        );
        problem.set_separation(0, 1, 50.0);
        problem.set_separation(2, 1, 100.0);

        let params = Nsga2Params {
            population_size: 40,
            generations: 60,
            mutation_prob: 1.0 / 16.0,
            seed: 42,
            ..Default::default()
        };
        let outcome = optimize::run(&problem, &params, Deadline::none()).unwrap();
        let best = problem.decode(&outcome.best.genes);

        // Replay the constraint checks on the winning layout.
        for i in 0..best.len() {
            for j in (i + 1)..best.len() {
                let (a, b) = (&best[i], &best[j]);
                let sep_x = (a.x - b.x).abs() - (a.width + b.width) / 2.0;
                let sep_y = (a.y - b.y).abs() - (a.height + b.height) / 2.0;
                let required = if (i, j) == (0, 1) {
                    50.0
                } else if (i, j) == (1, 2) {
                    100.0
                } else {
                    10.0
                };
                assert!(
                    sep_x.max(sep_y) >= required - 1e-6,
                    "plots {i},{j} separated by {:.1} < {required}",
                    sep_x.max(sep_y)
                );
            }
        }
    }
}
