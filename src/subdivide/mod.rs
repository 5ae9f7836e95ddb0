mod slicer;
mod solver;

pub use slicer::{slice_block, SliceOutcome};
pub use solver::{solve_widths, WidthSolution};
