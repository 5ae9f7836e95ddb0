use geo::{LineString, MultiPolygon, Polygon};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::blocks;
use crate::config::{LayoutMethod, PipelineConfig};
use crate::deadline::Deadline;
use crate::error::{NetworkError, PipelineError};
use crate::geom::{self, SpatialIndex};
use crate::grid::{self, GridGenes};
use crate::infra::{self, TransformerCosts};
use crate::optimize::{self, GridProblem, Nsga2Params};
use crate::roads::{Connectivity, RoadGrid};
use crate::subdivide;
use crate::types::{
    BlockClass, Layout, LayoutMetrics, LayoutStatus, Lot, RoadClass, RoadNetwork, RoadSegment,
    Site, Warning,
};
use crate::voronoi::{self, VoronoiParams};

/// Sites above this area default to the Voronoi generator in `auto` mode.
const VORONOI_AREA_THRESHOLD: f64 = 50_000.0;

/// Sub-regions below this area are skipped when a pre-split leaves slivers.
const MIN_REGION_AREA: f64 = 1_000.0;

/// Result of stage 1, whichever generator produced it.
struct StageOne {
    roads: RoadNetwork,
    block_polygons: Vec<Polygon<f64>>,
    partial: bool,
}

/// The three-stage layout pipeline. Construct once per configuration and
/// run against as many sites as needed; each run is independent and
/// deterministic under its seed.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on a site given as an outer ring plus holes, with
    /// optional pre-routed main roads as `(polyline, width)` pairs.
    ///
    /// Boundary failures (`InvalidSite`) surface as `Err`; everything
    /// downstream is recovered into the layout's warnings.
    pub fn run(
        &self,
        outer: Vec<(f64, f64)>,
        holes: Vec<Vec<(f64, f64)>>,
        user_roads: &[(Vec<(f64, f64)>, f64)],
    ) -> Result<Layout, PipelineError> {
        self.run_with_deadline(outer, holes, user_roads, Deadline::none())
    }

    /// `run` with a cooperative deadline: long solves return best-so-far
    /// and the layout is marked partial.
    pub fn run_with_deadline(
        &self,
        outer: Vec<(f64, f64)>,
        holes: Vec<Vec<(f64, f64)>>,
        user_roads: &[(Vec<(f64, f64)>, f64)],
        deadline: Deadline,
    ) -> Result<Layout, PipelineError> {
        let site = Site::from_rings(outer, holes)
            .map_err(|e| PipelineError::InvalidSite(e.to_string()))?;
        if deadline.expired() {
            return Ok(Layout::failed(site, PipelineError::Cancelled));
        }
        Ok(self.run_on_site(site, user_roads, deadline))
    }

    fn run_on_site(
        &self,
        site: Site,
        user_roads: &[(Vec<(f64, f64)>, f64)],
        deadline: Deadline,
    ) -> Layout {
        let config = &self.config;
        let mut warnings = Vec::new();
        info!(
            "pipeline start: site {:.0} m², method {:?}, seed {}",
            site.area(),
            config.layout_method,
            config.seed
        );

        let user_segments = user_road_segments(user_roads);

        // ---- Stage 1: road network and blocks --------------------------
        let method = self.resolve_method(&site, &user_segments);
        let stage_one = match method {
            LayoutMethod::Voronoi => {
                match self.stage1_voronoi(&site, &user_segments) {
                    Some(result) => result,
                    None => {
                        warnings.push(Warning::VoronoiFallback);
                        match self.stage1_grid(&site, &user_segments, deadline) {
                            Ok(result) => result,
                            Err(e) => return Layout::failed(site, e),
                        }
                    }
                }
            }
            _ => match self.stage1_grid(&site, &user_segments, deadline) {
                Ok(result) => result,
                Err(e) => return Layout::failed(site, e),
            },
        };
        if stage_one.partial {
            warnings.push(Warning::OptimizerPartial);
        }

        // ---- Stage 2: classification and subdivision --------------------
        let mut blocks = blocks::classify_blocks(&site, stage_one.block_polygons, config);
        let mut discarded = blocks.iter().filter(|b| b.class == BlockClass::Discard).count();
        info!(
            "stage 1 done: {} blocks ({} discarded), road area {:.0} m²",
            blocks.len(),
            discarded,
            stage_one.roads.footprint_area()
        );

        let mut lots: Vec<Lot> = Vec::new();
        for block in &mut blocks {
            if block.class != BlockClass::Commercial {
                continue;
            }
            // Per-block budget adapts to frontage length, bounded by both
            // the configured limit and the pipeline deadline.
            let frontage = block.stats.obb_edges.1;
            let budget = config
                .solver_time_limit_sec
                .min((frontage / 100.0).max(0.5));
            let block_deadline = if deadline.expired() {
                Deadline::after_secs(0.0)
            } else {
                deadline.capped_at_secs(budget)
            };

            match subdivide::slice_block(block, config, block_deadline) {
                Ok(outcome) => {
                    if outcome.partial {
                        warnings.push(Warning::SolverTimeout { block_id: block.id });
                    }
                    let mut kept = 0usize;
                    for mut lot in outcome.lots {
                        if lot.area < config.min_lot_area {
                            continue; // undersized residual stays green space
                        }
                        lot.id = lots.len() as u32;
                        lots.push(lot);
                        kept += 1;
                    }
                    if kept == 0 {
                        block.class = BlockClass::Green;
                        warnings.push(Warning::BlockInfeasible { block_id: block.id });
                        discarded += 1;
                    }
                }
                Err(_) => {
                    block.class = BlockClass::Green;
                    warnings.push(Warning::BlockInfeasible { block_id: block.id });
                    discarded += 1;
                }
            }
        }
        info!("stage 2 done: {} lots over {} blocks", lots.len(), blocks.len());

        let overlap = lot_overlap_area(&lots);
        if overlap > geom::AREA_EPSILON {
            warn!("lot overlap area {overlap:.4} m² exceeds tolerance");
        }

        // ---- Road-connectivity check ------------------------------------
        if !stage_one.roads.is_empty() {
            let grid = RoadGrid::build(site.bounds(), &stage_one.roads, config.raster_cell_size);
            let connectivity = Connectivity::check(&grid, &lots);
            if !connectivity.is_valid() {
                warnings.push(Warning::UnreachableLots {
                    lot_ids: connectivity.unreachable.clone(),
                });
                let unreachable: std::collections::HashSet<u32> =
                    connectivity.unreachable.into_iter().collect();
                lots.retain(|lot| !unreachable.contains(&lot.id));
                for (i, lot) in lots.iter_mut().enumerate() {
                    lot.id = i as u32;
                }
            }
        }

        // ---- Stage 3: infrastructure ------------------------------------
        let centroids: Vec<geo::Point<f64>> = lots.iter().map(|l| l.centroid).collect();
        let lot_ids: Vec<u32> = lots.iter().map(|l| l.id).collect();

        let steiner = if config.use_steiner_points {
            infra::steiner_candidates(&centroids)
        } else {
            Vec::new()
        };
        let network = match infra::plan_network(
            &centroids,
            &steiner,
            config.max_edge_distance,
            config.loop_redundancy_ratio,
        ) {
            Ok(network) => Some(network),
            Err(NetworkError::Disconnected { network, components }) => {
                warnings.push(Warning::NetworkDisconnected { components: components.len() });
                Some(network)
            }
            Err(NetworkError::Empty) => None,
        };

        let transformers = infra::plan_transformers(
            &centroids,
            &lot_ids,
            config.lot_load_kw,
            config.transformer_capacity_kva,
            config.lots_per_transformer,
            TransformerCosts {
                transformer: config.transformer_cost,
                cable_per_m: config.cable_cost_per_m,
                variance_weight: config.load_variance_weight,
            },
            config.seed,
        );
        let transformers = match transformers {
            Some(plan) => {
                if !plan.feasible {
                    warnings.push(Warning::TransformerOverload { worst_load_kw: plan.max_load() });
                }
                plan.transformers
            }
            None => Vec::new(),
        };

        let wwtp = infra::wwtp_point(&site, &blocks, config.elevation_gradient);
        let drainage = infra::plan_drainage(
            &lots,
            &stage_one.roads,
            wwtp,
            config.drainage_mode,
            config.drainage_arrow_length,
        );

        // ---- Metrics and assembly ---------------------------------------
        let commercial_area: f64 = blocks
            .iter()
            .filter(|b| b.class == BlockClass::Commercial)
            .map(|b| b.stats.area)
            .sum();
        let lot_area: f64 = lots.iter().map(|l| l.area).sum();
        let green_area: f64 = blocks
            .iter()
            .filter(|b| b.class == BlockClass::Green)
            .map(|b| b.stats.area)
            .sum();
        let accounted: f64 = blocks.iter().map(|b| b.stats.area).sum::<f64>()
            + stage_one.roads.footprint_area();
        let area_error = (accounted - site.area()).abs() / site.area();
        if area_error > 0.01 {
            warnings.push(Warning::AreaMismatch { relative_error: area_error });
        }

        let metrics = LayoutMetrics {
            site_area: site.area(),
            road_area: stage_one.roads.footprint_area(),
            total_commercial_area: commercial_area,
            total_green_area: green_area,
            utilization_ratio: (commercial_area / site.area()).clamp(0.0, 1.0),
            lot_count: lots.len(),
            average_lot_area: if lots.is_empty() { 0.0 } else { lot_area / lots.len() as f64 },
            discarded_blocks: discarded,
            mst_length: network.as_ref().map_or(0.0, |n| n.total_length),
            transformer_count: transformers.len(),
        };

        let partial = warnings
            .iter()
            .any(|w| matches!(w, Warning::OptimizerPartial | Warning::SolverTimeout { .. }));
        let status = if partial { LayoutStatus::Partial } else { LayoutStatus::Ok };
        info!(
            "pipeline done: {} lots, utilization {:.2}, status {:?}",
            metrics.lot_count, metrics.utilization_ratio, status
        );

        Layout {
            site,
            roads: stage_one.roads,
            blocks,
            lots,
            network,
            transformers,
            drainage,
            metrics,
            status,
            warnings,
            error: None,
        }
    }

    fn resolve_method(&self, site: &Site, user_segments: &[RoadSegment]) -> LayoutMethod {
        match self.config.layout_method {
            LayoutMethod::Auto => {
                if site.area() > VORONOI_AREA_THRESHOLD && user_segments.is_empty() {
                    LayoutMethod::Voronoi
                } else {
                    LayoutMethod::Grid
                }
            }
            explicit => explicit,
        }
    }

    fn voronoi_params(&self, num_seeds: usize) -> VoronoiParams {
        let config = &self.config;
        VoronoiParams {
            num_seeds,
            lloyd_iterations: config.lloyd_iterations,
            main_width: config.road_main_width,
            internal_width: config.road_internal_width,
            turning_radius: config.turning_radius,
            min_block_area: config.min_block_area,
        }
    }

    /// Voronoi stage 1. With user roads the site is pre-split and each
    /// sub-region tessellated on its own, so the supplied mains stay
    /// straight. Returns `None` when no usable blocks come out.
    fn stage1_voronoi(&self, site: &Site, user_segments: &[RoadSegment]) -> Option<StageOne> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut regions: Vec<Polygon<f64>> = vec![site.polygon().clone()];
        let mut footprint = MultiPolygon(Vec::new());
        let mut segments: Vec<RoadSegment> = Vec::new();

        if !user_segments.is_empty() {
            for segment in user_segments {
                footprint = geom::union(&footprint, &segment.footprint());
                segments.push(segment.clone());
            }
            footprint = geom::intersection(&footprint, &site.as_multi());
            regions = geom::parts(geom::difference(&site.as_multi(), &footprint))
                .into_iter()
                .filter(|p| geom::area(p) >= MIN_REGION_AREA)
                .collect();
        }

        let total_region_area: f64 = regions.iter().map(geom::area).sum();
        let mut blocks = Vec::new();
        for region in regions {
            let share = geom::area(&region) / total_region_area.max(1.0);
            let seeds = ((config.voronoi_seeds as f64 * share).round() as usize).max(3);
            let sub_site = Site::new(region).ok()?;
            let outcome = voronoi::generate(&sub_site, &self.voronoi_params(seeds), &mut rng);
            footprint = geom::union(&footprint, &outcome.roads.footprint);
            segments.extend(outcome.roads.segments);
            blocks.extend(outcome.blocks);
        }

        if blocks.is_empty() {
            debug!("voronoi produced no usable blocks");
            return None;
        }
        Some(StageOne {
            roads: RoadNetwork { segments, footprint },
            block_polygons: blocks,
            partial: false,
        })
    }

    /// Grid stage 1: NSGA-II over the lattice genes, then blocks from the
    /// winning lattice with road gaps between tiles.
    fn stage1_grid(
        &self,
        site: &Site,
        user_segments: &[RoadSegment],
        deadline: Deadline,
    ) -> Result<StageOne, PipelineError> {
        let config = &self.config;
        let problem = GridProblem::new(site, config);
        let params = Nsga2Params {
            population_size: config.population_size,
            generations: config.generations,
            crossover_prob: config.crossover_prob,
            mutation_prob: config.mutation_prob_for(GridGenes::LEN),
            seed: config.seed,
            ..Default::default()
        };
        let outcome = optimize::run(&problem, &params, deadline)?;
        let genes = GridGenes::from_slice(&outcome.best.genes);
        debug!(
            "grid search: spacing ({:.1}, {:.1}) m, angle {:.1}°, {} generations",
            genes.spacing_x, genes.spacing_y, genes.angle_deg, outcome.generations_run
        );

        // Lattice boundary lines become internal roads; user mains keep
        // their own class and width.
        let mut segments: Vec<RoadSegment> = user_segments.to_vec();
        segments.extend(grid::lattice_lines(site, &genes).into_iter().map(|line| {
            RoadSegment::new(line, config.road_internal_width, RoadClass::Internal)
        }));

        // Blocks are the clipped tiles pulled back from the road reserve.
        let gap = config.road_internal_width / 2.0;
        let user_footprint = segments
            .iter()
            .filter(|s| s.class == RoadClass::Main)
            .fold(MultiPolygon(Vec::new()), |acc, s| geom::union(&acc, &s.footprint()));
        let mut block_polygons = Vec::new();
        for tile in problem.blocks_for(&genes) {
            let tile = geom::difference(&MultiPolygon(vec![tile]), &user_footprint);
            for part in geom::parts(tile) {
                for shrunk in geom::parts(geom::buffer(&part, -gap)) {
                    let cleaned = geom::simplify(&shrunk, 0.1);
                    if geom::area(&cleaned) >= config.min_block_area {
                        block_polygons.push(cleaned);
                    }
                }
            }
        }

        let block_union = geom::union_all(&block_polygons);
        let footprint = geom::difference(&site.as_multi(), &block_union);

        Ok(StageOne {
            roads: RoadNetwork { segments, footprint },
            block_polygons,
            partial: outcome.partial,
        })
    }
}

/// Convert caller polylines into main road segments.
fn user_road_segments(user_roads: &[(Vec<(f64, f64)>, f64)]) -> Vec<RoadSegment> {
    user_roads
        .iter()
        .filter(|(points, _)| points.len() >= 2)
        .map(|(points, width)| {
            let line = LineString::from(points.clone());
            RoadSegment::new(line, *width, RoadClass::Main)
        })
        .collect()
}

/// Total pairwise overlap area between lots: envelope candidates from the
/// spatial index, then the exact intersection.
fn lot_overlap_area(lots: &[Lot]) -> f64 {
    if lots.len() < 2 {
        return 0.0;
    }
    let index = SpatialIndex::new(lots.iter().map(|l| l.polygon.clone()).collect());
    let mut overlap = 0.0;
    for (i, lot) in lots.iter().enumerate() {
        for j in index.query_intersecting(&lot.polygon) {
            if j <= i {
                continue;
            }
            overlap += geom::multi_area(&geom::intersection(
                &MultiPolygon(vec![lot.polygon.clone()]),
                &MultiPolygon(vec![index.get(j).clone()]),
            ));
        }
    }
    overlap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = PipelineConfig { population_size: 1, ..Default::default() };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_site_is_rejected_at_the_boundary() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let result = pipeline.run(
            vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)],
            vec![],
            &[],
        );
        assert!(matches!(result, Err(PipelineError::InvalidSite(_))));
    }

    #[test]
    fn expired_deadline_cancels_before_stage_one() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let layout = pipeline
            .run_with_deadline(
                vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
                vec![],
                &[],
                Deadline::after_secs(0.0),
            )
            .unwrap();
        assert_eq!(layout.status, LayoutStatus::Failed);
        assert_eq!(layout.error, Some(PipelineError::Cancelled));
        assert!(layout.blocks.is_empty() && layout.lots.is_empty());
    }

    #[test]
    fn auto_mode_picks_by_site_scale() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let small = Site::new(geom::rect_polygon(0.0, 0.0, 100.0, 100.0)).unwrap();
        let large = Site::new(geom::rect_polygon(0.0, 0.0, 400.0, 400.0)).unwrap();
        assert_eq!(pipeline.resolve_method(&small, &[]), LayoutMethod::Grid);
        assert_eq!(pipeline.resolve_method(&large, &[]), LayoutMethod::Voronoi);
        // Internal road constraints force grid mode.
        let roads = user_road_segments(&[(vec![(0.0, 200.0), (400.0, 200.0)], 20.0)]);
        assert_eq!(pipeline.resolve_method(&large, &roads), LayoutMethod::Grid);
    }
}
