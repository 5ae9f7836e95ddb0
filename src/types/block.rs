use geo::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// Role assigned to a block by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockClass {
    /// Subdivided into sellable lots.
    Commercial,
    /// Reserved for shared facilities (part of the service quota).
    Service,
    /// Too irregular or left over; kept as green space.
    Green,
    /// Hosts site utilities; the lowest block carries the WWTP.
    Utility,
    /// Below the minimum area, excluded from the layout.
    Discard,
}

/// Shape statistics derived from a block's minimum rotated rectangle.
#[derive(Debug, Clone, Copy)]
pub struct ShapeStats {
    pub area: f64,
    pub perimeter: f64,
    /// area / OBB area, 1.0 for a perfect rectangle.
    pub rectangularity: f64,
    /// longer OBB edge / shorter OBB edge, >= 1.
    pub aspect: f64,
    /// Unit vector along the longer OBB edge (the frontage direction).
    pub dominant_edge: (f64, f64),
    /// (shorter, longer) OBB edge lengths.
    pub obb_edges: (f64, f64),
}

/// A block carved out of the site by the stage-1 road network.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: u32,
    pub polygon: Polygon<f64>,
    pub stats: ShapeStats,
    pub class: BlockClass,
    /// `0.7·rectangularity + 0.3/aspect`; used as a tie-break when
    /// selecting blocks for the service quota.
    pub aesthetic: f64,
    pub centroid: Point<f64>,
    /// Elevation of the centroid under the configured elevation model.
    pub elevation: f64,
}

impl Block {
    #[inline]
    pub fn is_commercial(&self) -> bool {
        self.class == BlockClass::Commercial
    }
}
