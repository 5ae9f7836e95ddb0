mod astar;
mod raster;

pub use astar::{astar, Connectivity};
pub use raster::RoadGrid;
