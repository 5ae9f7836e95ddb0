mod driver;
mod facility;
mod grid;
mod individual;
mod nsga;
mod operators;

pub use driver::{run, Nsga2Params, OptimizerOutcome};
pub use facility::{FacilityKind, FacilityPlot, FacilityProblem};
pub use grid::GridProblem;
pub use individual::{Bounds, Evaluation, Individual};
pub use nsga::{crowding_distance, fast_nondominated_sort, order_key};

/// A multi-objective problem over a real-valued gene vector.
///
/// Evaluation must be a pure function of the genes and the problem's
/// immutable data: the driver evaluates individuals in parallel and relies
/// on identical gene vectors producing identical objective vectors.
pub trait Problem: Sync {
    /// Per-gene search bounds; the gene count is `bounds().len()`.
    fn bounds(&self) -> &Bounds;

    /// Number of objectives, all minimised.
    fn num_objectives(&self) -> usize;

    /// Objectives plus summed constraint violation (0 when feasible).
    fn evaluate(&self, genes: &[f64]) -> Evaluation;
}
