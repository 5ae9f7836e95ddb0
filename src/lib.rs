#![doc = "Industrial-estate layout engine: grid/Voronoi road networks, \
constraint-based block subdivision, and utility infrastructure planning."]

mod blocks;
mod config;
mod deadline;
mod error;
pub mod geom;
mod grid;
mod infra;
pub mod optimize;
mod pipeline;
mod roads;
mod subdivide;
mod types;
mod voronoi;

#[doc(inline)]
pub use config::{DrainageMode, LayoutMethod, PipelineConfig};

#[doc(inline)]
pub use deadline::Deadline;

#[doc(inline)]
pub use error::{GeometryError, NetworkError, OptimizerError, PipelineError, SolverError};

#[doc(inline)]
pub use pipeline::Pipeline;

#[doc(inline)]
pub use types::{
    Block, BlockClass, Layout, LayoutMetrics, LayoutStatus, Lot, RoadClass, RoadNetwork,
    RoadSegment, ShapeStats, Site, Warning,
};

#[doc(inline)]
pub use infra::{CableNetwork, DrainageArrow, Transformer};

pub use blocks::{aesthetic_score, classify_blocks, shape_stats};
pub use geom::SpatialIndex;
pub use infra::{
    plan_drainage, plan_network, plan_transformers, steiner_candidates, wwtp_point,
    TransformerCosts, TransformerPlan,
};
pub use optimize::{FacilityKind, FacilityPlot, FacilityProblem, Nsga2Params};
pub use roads::{astar, Connectivity, RoadGrid};
pub use subdivide::{slice_block, solve_widths, SliceOutcome, WidthSolution};
