mod block;
mod layout;
mod lot;
mod road;
mod site;

pub use block::{Block, BlockClass, ShapeStats};
pub use layout::{Layout, LayoutMetrics, LayoutStatus, Warning};
pub use lot::Lot;
pub use road::{RoadClass, RoadNetwork, RoadSegment};
pub use site::Site;
