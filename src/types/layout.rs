use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::infra::{CableNetwork, DrainageArrow, Transformer};
use crate::types::{Block, Lot, RoadNetwork, Site};

/// Overall outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStatus {
    /// Every stage completed inside its budget.
    Ok,
    /// At least one solve hit its deadline and returned best-so-far.
    Partial,
    /// A fatal boundary error; the layout carries no geometry.
    Failed,
}

/// Non-fatal conditions recorded on the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A block's subdivision was infeasible; it was relabelled green.
    BlockInfeasible { block_id: u32 },
    /// A block's width solve timed out; best-so-far widths were used.
    SolverTimeout { block_id: u32 },
    /// Lots that could not reach a road cell were relabelled green.
    UnreachableLots { lot_ids: Vec<u32> },
    /// The cable network splits into more than one component.
    NetworkDisconnected { components: usize },
    /// No feasible transformer count in the capacity band; the least
    /// overloaded plan was kept.
    TransformerOverload { worst_load_kw: f64 },
    /// Stage-1 optimisation hit its deadline.
    OptimizerPartial,
    /// Voronoi produced no usable commercial blocks; fell back to grid.
    VoronoiFallback,
    /// Block + road area does not reconcile with the site area within 1 %.
    AreaMismatch { relative_error: f64 },
}

/// Aggregate figures reported with every layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub site_area: f64,
    pub road_area: f64,
    pub total_commercial_area: f64,
    pub total_green_area: f64,
    /// total commercial lot area / site area, in [0, 1].
    pub utilization_ratio: f64,
    pub lot_count: usize,
    pub average_lot_area: f64,
    pub discarded_blocks: usize,
    pub mst_length: f64,
    pub transformer_count: usize,
}

/// The final, frozen record of a pipeline run. All geometry below the
/// layout is owned by it; stages hand their collections over by move.
#[derive(Debug)]
pub struct Layout {
    pub site: Site,
    pub roads: RoadNetwork,
    pub blocks: Vec<Block>,
    pub lots: Vec<Lot>,
    pub network: Option<CableNetwork>,
    pub transformers: Vec<Transformer>,
    pub drainage: Vec<DrainageArrow>,
    pub metrics: LayoutMetrics,
    pub status: LayoutStatus,
    pub warnings: Vec<Warning>,
    /// Populated only when `status == Failed`.
    pub error: Option<PipelineError>,
}

impl Layout {
    /// A failed layout: empty geometry, a single fatal error code.
    pub fn failed(site: Site, error: PipelineError) -> Self {
        Self {
            site,
            roads: RoadNetwork::default(),
            blocks: Vec::new(),
            lots: Vec::new(),
            network: None,
            transformers: Vec::new(),
            drainage: Vec::new(),
            metrics: LayoutMetrics::default(),
            status: LayoutStatus::Failed,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status != LayoutStatus::Failed
    }
}
