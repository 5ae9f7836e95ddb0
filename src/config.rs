use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Stage-1 road network strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMethod {
    /// Rectangular grid tuned by NSGA-II.
    Grid,
    /// Voronoi cells with Lloyd relaxation.
    Voronoi,
    /// Voronoi for large unconstrained sites, grid otherwise.
    #[default]
    Auto,
}

/// Drainage arrow strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrainageMode {
    /// Unit vector straight toward the WWTP.
    #[default]
    Direct,
    /// Along the first road-graph edge of the shortest path to the WWTP.
    Network,
}

/// Full pipeline configuration. Every field has a default matching the
/// production constants, so callers only override what they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout_method: LayoutMethod,

    // --- Stage 1: grid genes ---------------------------------------------
    pub spacing_min: f64,
    pub spacing_max: f64,
    pub angle_min: f64,
    pub angle_max: f64,

    // --- Stage 1: NSGA-II ------------------------------------------------
    pub population_size: usize,
    pub generations: usize,
    pub crossover_prob: f64,
    /// Per-gene mutation probability. `None` means `1 / n_genes`.
    pub mutation_prob: Option<f64>,

    // --- Stage 1: Voronoi ------------------------------------------------
    pub voronoi_seeds: usize,
    pub lloyd_iterations: usize,

    // --- Stage 2: subdivision --------------------------------------------
    pub target_lot_width: f64,
    pub min_lot_width: f64,
    pub max_lot_width: f64,
    pub setback_distance: f64,
    pub solver_time_limit_sec: f64,
    pub min_lot_area: f64,
    pub min_block_area: f64,
    pub min_rectangularity: f64,
    pub max_aspect_ratio: f64,
    pub service_area_ratio: f64,

    // --- Roads ------------------------------------------------------------
    pub road_main_width: f64,
    pub road_internal_width: f64,
    /// Radius of the closing pass that rounds road intersections.
    pub turning_radius: f64,
    /// Target rasterisation cell size for connectivity checks (m).
    pub raster_cell_size: f64,

    // --- Stage 3: infrastructure -----------------------------------------
    pub loop_redundancy_ratio: f64,
    pub max_edge_distance: f64,
    pub use_steiner_points: bool,
    pub transformer_capacity_kva: f64,
    pub lots_per_transformer: usize,
    pub lot_load_kw: f64,
    pub transformer_cost: f64,
    pub cable_cost_per_m: f64,
    pub load_variance_weight: f64,
    pub drainage_mode: DrainageMode,
    pub drainage_arrow_length: f64,
    /// Elevation plane `(gx, gy)`: elevation(p) = gx·x + gy·y. `None`
    /// disables elevation-aware placement (WWTP falls back to centroid).
    pub elevation_gradient: Option<(f64, f64)>,

    // --- Determinism ------------------------------------------------------
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout_method: LayoutMethod::Auto,
            spacing_min: 20.0,
            spacing_max: 100.0,
            angle_min: 0.0,
            angle_max: 90.0,
            population_size: 30,
            generations: 15,
            crossover_prob: 0.9,
            mutation_prob: None,
            voronoi_seeds: 15,
            lloyd_iterations: 30,
            target_lot_width: 40.0,
            min_lot_width: 20.0,
            max_lot_width: 80.0,
            setback_distance: 6.0,
            solver_time_limit_sec: 5.0,
            min_lot_area: 1000.0,
            min_block_area: 400.0,
            min_rectangularity: 0.65,
            max_aspect_ratio: 4.0,
            service_area_ratio: 0.10,
            road_main_width: 20.0,
            road_internal_width: 10.0,
            turning_radius: 15.0,
            raster_cell_size: 1.0,
            loop_redundancy_ratio: 0.15,
            max_edge_distance: 500.0,
            use_steiner_points: false,
            transformer_capacity_kva: 1000.0,
            lots_per_transformer: 15,
            lot_load_kw: 100.0,
            transformer_cost: 50_000.0,
            cable_cost_per_m: 120.0,
            load_variance_weight: 0.01,
            drainage_mode: DrainageMode::Direct,
            drainage_arrow_length: 30.0,
            elevation_gradient: None,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.spacing_min > 0.0 && self.spacing_min <= self.spacing_max) {
            return invalid(format!(
                "spacing bounds [{}, {}] must be positive and ordered",
                self.spacing_min, self.spacing_max
            ));
        }
        if !(0.0..360.0).contains(&self.angle_min) || self.angle_min > self.angle_max {
            return invalid(format!(
                "angle bounds [{}, {}] must be ordered and start in [0, 360)",
                self.angle_min, self.angle_max
            ));
        }
        if self.population_size < 4 {
            return invalid(format!("population_size {} below minimum of 4", self.population_size));
        }
        if self.generations == 0 {
            return invalid("generations must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.crossover_prob) {
            return invalid(format!("crossover_prob {} outside [0, 1]", self.crossover_prob));
        }
        if let Some(p) = self.mutation_prob {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("mutation_prob {} outside [0, 1]", p));
            }
        }
        if !(self.min_lot_width > 0.0 && self.min_lot_width <= self.max_lot_width) {
            return invalid(format!(
                "lot width bounds [{}, {}] must be positive and ordered",
                self.min_lot_width, self.max_lot_width
            ));
        }
        if self.target_lot_width < self.min_lot_width || self.target_lot_width > self.max_lot_width {
            return invalid(format!(
                "target_lot_width {} outside [{}, {}]",
                self.target_lot_width, self.min_lot_width, self.max_lot_width
            ));
        }
        if self.setback_distance < 0.0 {
            return invalid(format!("setback_distance {} must be non-negative", self.setback_distance));
        }
        if self.road_main_width <= 0.0 || self.road_internal_width <= 0.0 {
            return invalid("road widths must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.loop_redundancy_ratio) {
            return invalid(format!(
                "loop_redundancy_ratio {} outside [0, 1]",
                self.loop_redundancy_ratio
            ));
        }
        if self.transformer_capacity_kva <= 0.0 || self.lot_load_kw <= 0.0 {
            return invalid("transformer capacity and lot load must be positive".into());
        }
        if self.voronoi_seeds < 3 {
            return invalid(format!("voronoi_seeds {} below minimum of 3", self.voronoi_seeds));
        }
        if self.raster_cell_size <= 0.0 {
            return invalid(format!("raster_cell_size {} must be positive", self.raster_cell_size));
        }
        Ok(())
    }

    /// Effective per-gene mutation probability for an `n_genes` problem.
    #[inline]
    pub fn mutation_prob_for(&self, n_genes: usize) -> f64 {
        self.mutation_prob.unwrap_or(1.0 / n_genes.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_spacing_rejected() {
        let cfg = PipelineConfig { spacing_min: 80.0, spacing_max: 20.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn target_outside_width_bounds_rejected() {
        let cfg = PipelineConfig { target_lot_width: 120.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn mutation_prob_defaults_to_inverse_gene_count() {
        let cfg = PipelineConfig::default();
        assert!((cfg.mutation_prob_for(5) - 0.2).abs() < 1e-12);
    }
}
