use geo::MultiPolygon;
use log::debug;

use crate::config::PipelineConfig;
use crate::deadline::Deadline;
use crate::error::SolverError;
use crate::geom;
use crate::types::{Block, Lot};

use super::solve_widths;

/// A sliced lot must keep this share of its rectangle after clipping to
/// the block; anything less means the block was not rectangular enough in
/// the rotated frame.
const CLIP_ACCEPTANCE: f64 = 0.9;

#[derive(Debug)]
pub struct SliceOutcome {
    /// Lots in site coordinates. `id` fields are renumbered by the caller.
    pub lots: Vec<Lot>,
    /// True when the width solve hit its deadline.
    pub partial: bool,
}

/// Subdivide a commercial block into lots along its dominant edge.
///
/// The block is rotated so its dominant edge runs along +x, sliced into
/// solver widths with front/rear setbacks removed, and each lot is rotated
/// back and clipped to the block.
pub fn slice_block(
    block: &Block,
    config: &PipelineConfig,
    deadline: Deadline,
) -> Result<SliceOutcome, SolverError> {
    let (dx, dy) = block.stats.dominant_edge;
    let theta_deg = dy.atan2(dx).to_degrees();
    let origin = block.centroid;

    let aligned = geom::rotate_around(&block.polygon, -theta_deg, origin);
    let frame = geom::bounds(&aligned).map_err(|_| SolverError::Infeasible {
        frontage: 0.0,
        min_width: config.min_lot_width,
        max_width: config.max_lot_width,
    })?;
    let frontage = frame.width();
    let depth = frame.height() - 2.0 * config.setback_distance;
    if depth <= 0.0 {
        return Err(SolverError::Infeasible {
            frontage,
            min_width: config.min_lot_width,
            max_width: config.max_lot_width,
        });
    }

    let solution = solve_widths(
        frontage,
        config.min_lot_width,
        config.max_lot_width,
        config.target_lot_width,
        deadline,
    )?;

    let block_multi = MultiPolygon(vec![block.polygon.clone()]);
    let y0 = frame.min().y + config.setback_distance;
    let mut lots = Vec::with_capacity(solution.widths.len());
    let mut cursor = frame.min().x;
    let mut rejected = 0usize;

    for &width in &solution.widths {
        let rect = geom::rect_polygon(cursor, y0, width, depth);
        cursor += width;

        let restored = geom::rotate_around(&rect, theta_deg, origin);
        let clipped = geom::intersection(&MultiPolygon(vec![restored]), &block_multi);
        let Some(shape) = geom::parts(clipped).into_iter().max_by(|a, b| {
            geom::area(a)
                .partial_cmp(&geom::area(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            rejected += 1;
            continue;
        };

        let area = geom::area(&shape);
        if area < CLIP_ACCEPTANCE * width * depth {
            rejected += 1;
            continue;
        }
        let Ok(centroid) = geom::centroid(&shape) else {
            rejected += 1;
            continue;
        };
        lots.push(Lot {
            id: 0,
            block_id: block.id,
            polygon: shape,
            width,
            depth,
            area,
            centroid,
        });
    }

    if rejected > 0 {
        debug!("block {}: rejected {rejected} slices after clipping", block.id);
    }
    Ok(SliceOutcome { lots, partial: solution.partial })
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;
    use crate::blocks::shape_stats;
    use crate::geom::rect_polygon;
    use crate::types::BlockClass;

    fn block_from(polygon: geo::Polygon<f64>) -> Block {
        let stats = shape_stats(&polygon).unwrap();
        let centroid = geom::centroid(&polygon).unwrap();
        Block {
            id: 0,
            polygon,
            stats,
            class: BlockClass::Commercial,
            aesthetic: 0.0,
            centroid,
            elevation: 0.0,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            min_lot_width: 10.0,
            max_lot_width: 30.0,
            target_lot_width: 20.0,
            setback_distance: 6.0,
            ..Default::default()
        }
    }

    #[test]
    fn axis_aligned_block_slices_cleanly() {
        let block = block_from(rect_polygon(0.0, 0.0, 100.0, 40.0));
        let outcome = slice_block(&block, &config(), Deadline::none()).unwrap();
        assert_eq!(outcome.lots.len(), 5);
        for lot in &outcome.lots {
            assert!((lot.width - 20.0).abs() < 1e-9);
            assert!((lot.depth - 28.0).abs() < 1e-9);
            assert!((lot.area - 20.0 * 28.0).abs() < 0.1);
        }
        // Lots sit inside the block and respect the setback.
        for lot in &outcome.lots {
            assert!(geom::contains_polygon(&block.polygon, &lot.polygon));
        }
    }

    #[test]
    fn rotated_block_round_trips_to_the_same_lots() {
        let base = rect_polygon(0.0, 0.0, 100.0, 40.0);
        let straight = block_from(base.clone());
        let rotated = block_from(geom::rotate_around(&base, 33.0, Point::new(50.0, 20.0)));

        let lots_straight = slice_block(&straight, &config(), Deadline::none()).unwrap().lots;
        let lots_rotated = slice_block(&rotated, &config(), Deadline::none()).unwrap().lots;

        assert_eq!(lots_straight.len(), lots_rotated.len());
        let mut widths_a: Vec<f64> = lots_straight.iter().map(|l| l.width).collect();
        let mut widths_b: Vec<f64> = lots_rotated.iter().map(|l| l.width).collect();
        widths_a.sort_by(|x, y| x.partial_cmp(y).unwrap());
        widths_b.sort_by(|x, y| x.partial_cmp(y).unwrap());
        for (a, b) in widths_a.iter().zip(&widths_b) {
            assert!((a - b).abs() < 1e-6);
        }
        for (a, b) in lots_straight.iter().zip(&lots_rotated) {
            assert!((a.area - b.area).abs() < 0.5);
        }
    }

    #[test]
    fn too_shallow_block_is_infeasible() {
        // Depth 10 leaves nothing after two 6 m setbacks.
        let block = block_from(rect_polygon(0.0, 0.0, 100.0, 10.0));
        assert!(matches!(
            slice_block(&block, &config(), Deadline::none()),
            Err(SolverError::Infeasible { .. })
        ));
    }

    #[test]
    fn l_shaped_block_drops_slices_over_the_notch() {
        // An L: 100x40 with the right half's top 30 m missing.
        let polygon = geo::Polygon::new(
            geo::LineString::from(vec![
                (0.0, 0.0),
                (100.0, 0.0),
                (100.0, 10.0),
                (50.0, 10.0),
                (50.0, 40.0),
                (0.0, 40.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let block = block_from(polygon);
        let outcome = slice_block(&block, &config(), Deadline::none()).unwrap();
        // Slices over the notch fail the 0.9 clip acceptance.
        assert!(outcome.lots.len() < 5);
        for lot in &outcome.lots {
            assert!(lot.centroid.x() < 55.0, "lot at x {}", lot.centroid.x());
        }
    }
}
