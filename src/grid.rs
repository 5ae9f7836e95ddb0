use geo::{Intersects, Polygon};

use crate::geom;
use crate::types::Site;

/// Stage-1 grid genes: rectangular tile sizes, lattice rotation about the
/// site centroid, and lattice phase offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGenes {
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub angle_deg: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl GridGenes {
    pub const LEN: usize = 5;

    /// Decode from a raw gene vector `[sx, sy, angle, ox, oy]`.
    pub fn from_slice(genes: &[f64]) -> Self {
        debug_assert!(genes.len() == Self::LEN, "grid gene vector must have 5 entries");
        Self {
            spacing_x: genes[0],
            spacing_y: genes[1],
            angle_deg: genes[2],
            offset_x: genes[3],
            offset_y: genes[4],
        }
    }
}

/// Generate the lattice of candidate tiles for one gene vector.
///
/// The lattice is sized to the site's bounding circle so every part of the
/// site stays covered after rotation, then rotated about the site centroid.
/// Only tiles that actually intersect the site survive; exact clipping is
/// left to the fitness function.
pub fn generate_tiles(site: &Site, genes: &GridGenes) -> Vec<Polygon<f64>> {
    let center = site.centroid();
    let radius = site.bounding_radius();
    let (sx, sy) = (genes.spacing_x.max(1.0), genes.spacing_y.max(1.0));

    // Phase offsets wrap within one tile so the gene range is unbounded.
    let ox = genes.offset_x.rem_euclid(sx);
    let oy = genes.offset_y.rem_euclid(sy);

    let nx = (2.0 * radius / sx).ceil() as i64 + 1;
    let ny = (2.0 * radius / sy).ceil() as i64 + 1;
    let x0 = center.x() - radius + ox - sx;
    let y0 = center.y() - radius + oy - sy;

    let mut tiles = Vec::new();
    for i in 0..=nx {
        for j in 0..=ny {
            let tile = geom::rect_polygon(x0 + i as f64 * sx, y0 + j as f64 * sy, sx, sy);
            let tile = geom::rotate_around(&tile, genes.angle_deg, center);
            if tile.intersects(site.polygon()) {
                tiles.push(tile);
            }
        }
    }
    tiles
}

/// Road centrelines along the tile boundaries of the same lattice,
/// rotated with it. Lines that miss the site entirely are dropped.
pub fn lattice_lines(site: &Site, genes: &GridGenes) -> Vec<geo::LineString<f64>> {
    use geo::{Coord, LineString};

    let center = site.centroid();
    let radius = site.bounding_radius();
    let (sx, sy) = (genes.spacing_x.max(1.0), genes.spacing_y.max(1.0));
    let ox = genes.offset_x.rem_euclid(sx);
    let oy = genes.offset_y.rem_euclid(sy);

    let nx = (2.0 * radius / sx).ceil() as i64 + 2;
    let ny = (2.0 * radius / sy).ceil() as i64 + 2;
    let x0 = center.x() - radius + ox - sx;
    let y0 = center.y() - radius + oy - sy;
    let x_end = x0 + nx as f64 * sx;
    let y_end = y0 + ny as f64 * sy;

    let rotate_line = |line: LineString<f64>| {
        use geo::Rotate;
        line.rotate_around_point(genes.angle_deg, center)
    };

    let mut lines = Vec::new();
    for i in 0..=nx {
        let x = x0 + i as f64 * sx;
        lines.push(rotate_line(LineString(vec![
            Coord { x, y: y0 },
            Coord { x, y: y_end },
        ])));
    }
    for j in 0..=ny {
        let y = y0 + j as f64 * sy;
        lines.push(rotate_line(LineString(vec![
            Coord { x: x0, y },
            Coord { x: x_end, y },
        ])));
    }
    lines.retain(|line| line.intersects(site.polygon()));
    lines
}
