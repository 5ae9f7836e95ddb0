use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use log::debug;

use crate::types::Lot;

use super::RoadGrid;

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Open-set entry ordered by lowest f first, cell as a stable tie-break.
#[derive(Debug, PartialEq)]
struct HeapEntry {
    f: f64,
    cell: (i32, i32),
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest f.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Manhattan for 4-connectivity, octile for 8-connectivity. Both are
/// admissible for their movement model, so the search is optimal.
fn heuristic(a: (i32, i32), b: (i32, i32), diagonal: bool) -> f64 {
    let dx = (a.0 - b.0).abs() as f64;
    let dy = (a.1 - b.1).abs() as f64;
    if diagonal {
        dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
    } else {
        dx + dy
    }
}

/// Shortest grid path from `start` to `goal`, or `None` when unreachable.
/// Any in-bounds cell is traversable; roads are destinations, not
/// obstacles.
pub fn astar(
    grid: &RoadGrid,
    start: (i32, i32),
    goal: (i32, i32),
    diagonal: bool,
) -> Option<Vec<(i32, i32)>> {
    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return None;
    }

    let mut steps = vec![(1, 0), (-1, 0), (0, 1), (0, -1)];
    if diagonal {
        steps.extend([(1, 1), (1, -1), (-1, 1), (-1, -1)]);
    }

    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<(i32, i32), f64> = HashMap::new();
    let mut parent: HashMap<(i32, i32), (i32, i32)> = HashMap::new();

    g_score.insert(start, 0.0);
    open.push(HeapEntry { f: heuristic(start, goal, diagonal), cell: start });

    while let Some(HeapEntry { cell, .. }) = open.pop() {
        if cell == goal {
            let mut path = vec![cell];
            let mut current = cell;
            while let Some(&prev) = parent.get(&current) {
                path.push(prev);
                current = prev;
            }
            path.reverse();
            return Some(path);
        }
        let current_g = g_score[&cell];

        for &(dx, dy) in &steps {
            let neighbour = (cell.0 + dx, cell.1 + dy);
            if !grid.in_bounds(neighbour) {
                continue;
            }
            let step_cost = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
            let tentative = current_g + step_cost;
            if tentative < *g_score.get(&neighbour).unwrap_or(&f64::INFINITY) {
                g_score.insert(neighbour, tentative);
                parent.insert(neighbour, cell);
                open.push(HeapEntry {
                    f: tentative + heuristic(neighbour, goal, diagonal),
                    cell: neighbour,
                });
            }
        }
    }
    None
}

/// Result of validating lot access against the road grid.
#[derive(Debug)]
pub struct Connectivity {
    /// Ids of lots with no path to a road cell.
    pub unreachable: Vec<u32>,
}

impl Connectivity {
    /// A layout is road-valid iff every lot reaches a road cell.
    pub fn check(grid: &RoadGrid, lots: &[Lot]) -> Self {
        let unreachable: Vec<u32> = lots
            .iter()
            .filter(|lot| {
                !grid
                    .cell_of(lot.centroid)
                    .is_some_and(|cell| grid.can_reach_road(cell))
            })
            .map(|lot| lot.id)
            .collect();
        if !unreachable.is_empty() {
            debug!("{}/{} lots cannot reach the road network", unreachable.len(), lots.len());
        }
        Self { unreachable }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.unreachable.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geo::{Coord, LineString, Rect};

    use super::*;
    use crate::types::{RoadClass, RoadNetwork, RoadSegment};

    fn crossing_grid() -> RoadGrid {
        let vertical = RoadSegment::new(
            LineString(vec![Coord { x: 25.0, y: 0.0 }, Coord { x: 25.0, y: 50.0 }]),
            2.0,
            RoadClass::Main,
        );
        let horizontal = RoadSegment::new(
            LineString(vec![Coord { x: 0.0, y: 25.0 }, Coord { x: 50.0, y: 25.0 }]),
            2.0,
            RoadClass::Main,
        );
        let network = RoadNetwork {
            segments: vec![vertical, horizontal],
            ..Default::default()
        };
        RoadGrid::build(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 50.0, y: 50.0 }),
            &network,
            1.0,
        )
    }

    #[test]
    fn path_starts_at_plot_and_ends_on_a_road() {
        let grid = crossing_grid();
        let start = (10, 10);
        let goal = grid.nearest_road_cell(start).unwrap();
        let path = astar(&grid, start, goal, false).unwrap();
        assert_eq!(path[0], start);
        assert!(grid.is_road(*path.last().unwrap()));
    }

    #[test]
    fn four_connected_path_length_is_manhattan_on_open_grid() {
        let grid = crossing_grid();
        let path = astar(&grid, (0, 0), (5, 3), false).unwrap();
        // Steps = Manhattan distance on an obstacle-free grid.
        assert_eq!(path.len() - 1, 8);
    }

    #[test]
    fn diagonal_path_is_shorter_in_steps() {
        let grid = crossing_grid();
        let four = astar(&grid, (0, 0), (7, 7), false).unwrap();
        let eight = astar(&grid, (0, 0), (7, 7), true).unwrap();
        assert_eq!(four.len() - 1, 14);
        assert_eq!(eight.len() - 1, 7);
    }

    #[test]
    fn out_of_bounds_goal_is_unreachable() {
        let grid = crossing_grid();
        assert!(astar(&grid, (0, 0), (500, 500), false).is_none());
    }

    #[test]
    fn isolated_cell_cannot_reach_empty_network() {
        let empty = RoadGrid::build(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 50.0, y: 50.0 }),
            &RoadNetwork::default(),
            1.0,
        );
        assert!(!empty.can_reach_road((10, 10)));
    }
}
