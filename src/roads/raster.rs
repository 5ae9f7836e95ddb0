use geo::{Point, Rect};
use log::debug;

use crate::types::RoadNetwork;

/// Rasterised grids stay below this many cells; the cell size grows on
/// larger sites until they fit.
const MAX_CELLS: usize = 1_000_000;

/// Default search radius (in cells) when hunting for the nearest road cell.
pub(crate) const SEARCH_RADIUS: i32 = 100;

/// A boolean occupancy grid over the site: true cells lie on or within a
/// road half-width of a centreline.
#[derive(Debug, Clone)]
pub struct RoadGrid {
    origin: (f64, f64),
    cell: f64,
    nx: i32,
    ny: i32,
    road: Vec<bool>,
    road_cells: Vec<(i32, i32)>,
}

impl RoadGrid {
    /// Rasterise a road network over `bounds`. `target_cell` is the
    /// requested resolution in metres; it is coarsened as needed to keep
    /// the grid under a million cells.
    pub fn build(bounds: Rect<f64>, network: &RoadNetwork, target_cell: f64) -> Self {
        let width = bounds.width().max(1.0);
        let height = bounds.height().max(1.0);
        let mut cell = target_cell.max(0.1);
        while ((width / cell) * (height / cell)) as usize > MAX_CELLS {
            cell *= 2.0;
        }
        let nx = (width / cell).ceil() as i32 + 1;
        let ny = (height / cell).ceil() as i32 + 1;

        let mut grid = Self {
            origin: (bounds.min().x, bounds.min().y),
            cell,
            nx,
            ny,
            road: vec![false; (nx * ny) as usize],
            road_cells: Vec::new(),
        };

        for segment in &network.segments {
            let dilation = ((segment.width / 2.0) / cell).ceil() as i32;
            for line in segment.line.lines() {
                // Endpoints are clamped into the grid so centrelines that
                // overshoot the site bounds still rasterise their crossing.
                let start = grid.cell_of_clamped(Point::new(line.start.x, line.start.y));
                let end = grid.cell_of_clamped(Point::new(line.end.x, line.end.y));
                for cell in bresenham(start, end) {
                    grid.mark_disc(cell, dilation);
                }
            }
        }

        grid.road_cells = (0..nx)
            .flat_map(|x| (0..ny).map(move |y| (x, y)))
            .filter(|&c| grid.is_road(c))
            .collect();
        debug!(
            "rasterised {} segments onto {}x{} grid at {:.1} m ({} road cells)",
            network.segments.len(),
            nx,
            ny,
            cell,
            grid.road_cells.len()
        );
        grid
    }

    /// Mark every cell within `radius` cells of `center` as road.
    fn mark_disc(&mut self, center: (i32, i32), radius: i32) {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let cell = (center.0 + dx, center.1 + dy);
                if self.in_bounds(cell) {
                    let idx = self.index(cell);
                    if !self.road[idx] {
                        self.road[idx] = true;
                    }
                }
            }
        }
    }

    #[inline]
    fn index(&self, (x, y): (i32, i32)) -> usize {
        (y * self.nx + x) as usize
    }

    #[inline]
    pub fn in_bounds(&self, (x, y): (i32, i32)) -> bool {
        x >= 0 && x < self.nx && y >= 0 && y < self.ny
    }

    #[inline]
    pub fn is_road(&self, cell: (i32, i32)) -> bool {
        self.in_bounds(cell) && self.road[self.index(cell)]
    }

    #[inline]
    pub fn dims(&self) -> (i32, i32) {
        (self.nx, self.ny)
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    /// Grid cell containing a site-coordinate point.
    pub fn cell_of(&self, p: Point<f64>) -> Option<(i32, i32)> {
        let x = ((p.x() - self.origin.0) / self.cell).floor() as i32;
        let y = ((p.y() - self.origin.1) / self.cell).floor() as i32;
        self.in_bounds((x, y)).then_some((x, y))
    }

    /// Like `cell_of`, but out-of-range coordinates clamp to the edge.
    fn cell_of_clamped(&self, p: Point<f64>) -> (i32, i32) {
        let x = ((p.x() - self.origin.0) / self.cell).floor() as i32;
        let y = ((p.y() - self.origin.1) / self.cell).floor() as i32;
        (x.clamp(0, self.nx - 1), y.clamp(0, self.ny - 1))
    }

    /// Nearest road cell by Manhattan distance within the search radius.
    pub fn nearest_road_cell(&self, from: (i32, i32)) -> Option<(i32, i32)> {
        self.road_cells
            .iter()
            .map(|&c| ((c.0 - from.0).abs() + (c.1 - from.1).abs(), c))
            .filter(|&(d, _)| d <= SEARCH_RADIUS)
            .min_by_key(|&(d, c)| (d, c))
            .map(|(_, c)| c)
    }

    /// True if an A* path from `from` to some road cell exists.
    pub fn can_reach_road(&self, from: (i32, i32)) -> bool {
        if self.is_road(from) {
            return true;
        }
        match self.nearest_road_cell(from) {
            Some(goal) => super::astar(self, from, goal, false).is_some(),
            None => false,
        }
    }
}

/// All cells on the line between two cells.
fn bresenham(start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x0, mut y0) = start;
    let (x1, y1) = end;
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let mut cells = Vec::with_capacity((dx + dy) as usize + 1);

    loop {
        cells.push((x0, y0));
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
    cells
}
