use geo::{Point, Polygon};

/// A sellable lot inside a block. Sliced as an axis-aligned rectangle in
/// the block's dominant-edge frame, then rotated back to site coordinates.
#[derive(Debug, Clone)]
pub struct Lot {
    pub id: u32,
    /// Index of the parent block in the layout's block vector.
    pub block_id: u32,
    pub polygon: Polygon<f64>,
    /// Frontage width along the block's dominant edge (m).
    pub width: f64,
    /// Depth perpendicular to the frontage, setbacks already removed (m).
    pub depth: f64,
    pub area: f64,
    pub centroid: Point<f64>,
}
