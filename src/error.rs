use thiserror::Error;

/// Errors produced by the geometry kernel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// Input geometry is malformed: non-finite coordinates, open ring,
    /// self-intersection, or zero area.
    #[error("invalid input geometry: {0}")]
    InvalidInput(String),

    /// An operation produced a geometry that collapsed or self-intersected
    /// where a usable polygon was required.
    #[error("degenerate result: {0}")]
    DegenerateResult(String),
}

/// Errors produced by the width solver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// No lot count admits widths within bounds summing to the frontage.
    #[error("no feasible subdivision: frontage {frontage:.2} m, widths [{min_width:.2}, {max_width:.2}] m")]
    Infeasible {
        frontage: f64,
        min_width: f64,
        max_width: f64,
    },

    /// The deadline expired before any feasible solution was found.
    #[error("width solver timed out before finding a feasible solution")]
    Timeout,
}

/// Errors produced by the evolutionary optimizer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    /// Hard-constrained mode finished its final generation with every
    /// individual violating at least one constraint.
    #[error("no feasible solution after {generations} generations")]
    NoFeasibleSolution { generations: usize },
}

/// Errors produced by the infrastructure planners.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    /// The distance-cut graph does not connect all nodes. Carries the
    /// spanning forest that was built and the node groups it splits into.
    #[error("cable network is disconnected ({} components)", components.len())]
    Disconnected {
        network: crate::infra::CableNetwork,
        components: Vec<Vec<usize>>,
    },

    /// No nodes were supplied.
    #[error("cannot plan a network over an empty node set")]
    Empty,
}

/// Fatal pipeline errors. Recoverable conditions (infeasible blocks,
/// timeouts, disconnected infrastructure) never surface here; they are
/// folded into the layout's warnings instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid site: {0}")]
    InvalidSite(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// External cancellation before any usable result existed.
    #[error("pipeline cancelled")]
    Cancelled,

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
}

impl From<GeometryError> for PipelineError {
    fn from(e: GeometryError) -> Self {
        PipelineError::InvalidSite(e.to_string())
    }
}
