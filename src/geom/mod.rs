mod bbox;
mod index;
mod kernel;

use bbox::BoundingBox;
pub use index::SpatialIndex;
pub use kernel::*;
