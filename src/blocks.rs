use geo::{Point, Polygon};
use log::debug;

use crate::config::PipelineConfig;
use crate::error::GeometryError;
use crate::geom;
use crate::types::{Block, BlockClass, ShapeStats, Site};

/// A block edge within this distance of the site exterior counts as
/// boundary contact.
const BOUNDARY_TOLERANCE: f64 = 0.5;

/// Shape statistics from the minimum rotated rectangle.
pub fn shape_stats(poly: &Polygon<f64>) -> Result<ShapeStats, GeometryError> {
    let area = geom::area(poly);
    let obb = geom::minimum_rotated_rect(poly)?;
    let obb_area = geom::area(&obb).max(f64::EPSILON);

    // First two OBB edges give the two distinct edge directions.
    let ring = &obb.exterior().0;
    if ring.len() < 4 {
        return Err(GeometryError::DegenerateResult("OBB ring too short".into()));
    }
    let e0 = (ring[1].x - ring[0].x, ring[1].y - ring[0].y);
    let e1 = (ring[2].x - ring[1].x, ring[2].y - ring[1].y);
    let len0 = e0.0.hypot(e0.1);
    let len1 = e1.0.hypot(e1.1);
    let (short, long, long_edge) = if len0 >= len1 {
        (len1, len0, e0)
    } else {
        (len0, len1, e1)
    };
    if long <= geom::EPSILON {
        return Err(GeometryError::DegenerateResult("OBB collapsed to a point".into()));
    }

    Ok(ShapeStats {
        area,
        perimeter: geom::perimeter(poly),
        rectangularity: area / obb_area,
        aspect: long / short.max(geom::EPSILON),
        dominant_edge: (long_edge.0 / long, long_edge.1 / long),
        obb_edges: (short, long),
    })
}

/// `0.7·rectangularity + 0.3/aspect`; higher reads better.
#[inline]
pub fn aesthetic_score(stats: &ShapeStats) -> f64 {
    0.7 * stats.rectangularity + 0.3 / stats.aspect.max(1.0)
}

/// Elevation under the configured plane model; falls back to the
/// y-coordinate so ordering stays deterministic without a model.
#[inline]
pub fn elevation_of(p: Point<f64>, gradient: Option<(f64, f64)>) -> f64 {
    match gradient {
        Some((gx, gy)) => gx * p.x() + gy * p.y(),
        None => p.y(),
    }
}

/// Total length of the block's exterior lying on the site exterior.
fn boundary_contact(site: &Site, poly: &Polygon<f64>) -> f64 {
    let site_ring = site.polygon().exterior();
    poly.exterior()
        .lines()
        .filter(|seg| {
            let mid = Point::new((seg.start.x + seg.end.x) / 2.0, (seg.start.y + seg.end.y) / 2.0);
            geom::distance_point_to_line(Point::new(seg.start.x, seg.start.y), site_ring)
                <= BOUNDARY_TOLERANCE
                && geom::distance_point_to_line(Point::new(seg.end.x, seg.end.y), site_ring)
                    <= BOUNDARY_TOLERANCE
                && geom::distance_point_to_line(mid, site_ring) <= BOUNDARY_TOLERANCE
        })
        .map(|seg| (seg.end.x - seg.start.x).hypot(seg.end.y - seg.start.y))
        .sum()
}

/// The classification decision table, first match wins.
fn classify_shape(
    site: &Site,
    poly: &Polygon<f64>,
    stats: &ShapeStats,
    config: &PipelineConfig,
) -> BlockClass {
    if stats.area < config.min_lot_area {
        return BlockClass::Discard;
    }
    if stats.rectangularity < config.min_rectangularity || stats.aspect > config.max_aspect_ratio {
        return BlockClass::Green;
    }
    let contact = boundary_contact(site, poly);
    if contact > 0.0 && contact <= 1.2 * stats.obb_edges.0 {
        return BlockClass::Utility;
    }
    BlockClass::Commercial
}

/// Classify stage-1 blocks and allocate roles: the decision table first,
/// then the lowest block relabelled utility to host the WWTP, then the
/// service quota interleaved across the elevation order.
pub fn classify_blocks(
    site: &Site,
    polygons: Vec<Polygon<f64>>,
    config: &PipelineConfig,
) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::with_capacity(polygons.len());
    for (i, polygon) in polygons.into_iter().enumerate() {
        let Ok(stats) = shape_stats(&polygon) else {
            debug!("block {i} dropped: degenerate shape");
            continue;
        };
        let Ok(centroid) = geom::centroid(&polygon) else { continue };
        let class = classify_shape(site, &polygon, &stats, config);
        blocks.push(Block {
            id: blocks.len() as u32,
            polygon,
            aesthetic: aesthetic_score(&stats),
            stats,
            class,
            centroid,
            elevation: elevation_of(centroid, config.elevation_gradient),
        });
    }

    allocate_roles(&mut blocks, config);
    blocks
}

/// Service quota + WWTP host, over the commercially classified blocks.
fn allocate_roles(blocks: &mut [Block], config: &PipelineConfig) {
    let mut commercial: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.class == BlockClass::Commercial)
        .map(|(i, _)| i)
        .collect();
    if commercial.len() < 2 {
        return;
    }

    // Elevation order, aesthetic as the deterministic tie-break: the less
    // regular of two level blocks gives way to service use first.
    commercial.sort_by(|&a, &b| {
        blocks[a]
            .elevation
            .partial_cmp(&blocks[b].elevation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                blocks[a]
                    .aesthetic
                    .partial_cmp(&blocks[b].aesthetic)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| blocks[a].id.cmp(&blocks[b].id))
    });

    // The lowest block hosts the WWTP; without an elevation model the
    // y-coordinate fallback keeps the choice deterministic.
    let lowest = commercial.remove(0);
    blocks[lowest].class = BlockClass::Utility;

    let total_area: f64 = commercial.iter().map(|&i| blocks[i].stats.area).sum();
    let target = total_area * config.service_area_ratio;
    if target <= 0.0 || commercial.is_empty() {
        return;
    }
    let avg_area = total_area / commercial.len() as f64;
    let count = ((target / avg_area).round() as usize)
        .clamp(1, (commercial.len() * 3 / 10).max(1));
    if count >= commercial.len() {
        return;
    }

    // Interleave service blocks through the elevation order instead of
    // clumping them at one end.
    let step = commercial.len() as f64 / count as f64;
    for k in 0..count {
        let pick = commercial[(k as f64 * step) as usize];
        blocks[pick].class = BlockClass::Service;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::rect_polygon;

    fn site_300() -> Site {
        Site::new(rect_polygon(0.0, 0.0, 300.0, 300.0)).unwrap()
    }

    #[test]
    fn rectangle_stats_are_exact() {
        let stats = shape_stats(&rect_polygon(10.0, 10.0, 40.0, 20.0)).unwrap();
        assert!((stats.rectangularity - 1.0).abs() < 1e-6);
        assert!((stats.aspect - 2.0).abs() < 1e-6);
        assert!((stats.obb_edges.1 - 40.0).abs() < 1e-6);
        // Dominant edge runs along x.
        assert!(stats.dominant_edge.0.abs() > 0.99);
    }

    #[test]
    fn dominant_edge_follows_rotation() {
        let rotated = geom::rotate_around(
            &rect_polygon(0.0, 0.0, 60.0, 20.0),
            30.0,
            Point::new(30.0, 10.0),
        );
        let stats = shape_stats(&rotated).unwrap();
        let angle = stats.dominant_edge.1.atan2(stats.dominant_edge.0).to_degrees();
        // Direction is defined up to sign.
        let folded = ((angle % 180.0) + 180.0) % 180.0;
        assert!((folded - 30.0).abs() < 1.0, "angle {folded}");
    }

    #[test]
    fn tiny_block_discarded() {
        let site = site_300();
        let config = PipelineConfig::default();
        let blocks = classify_blocks(&site, vec![rect_polygon(10.0, 10.0, 10.0, 10.0)], &config);
        assert_eq!(blocks[0].class, BlockClass::Discard);
    }

    #[test]
    fn elongated_block_goes_green() {
        let site = site_300();
        let config = PipelineConfig::default();
        // 250 x 10: aspect 25, area 2500 (above the discard floor).
        let blocks =
            classify_blocks(&site, vec![rect_polygon(20.0, 100.0, 250.0, 10.0)], &config);
        assert_eq!(blocks[0].class, BlockClass::Green);
    }

    #[test]
    fn interior_block_is_commercial() {
        let site = site_300();
        let config = PipelineConfig::default();
        let blocks =
            classify_blocks(&site, vec![rect_polygon(50.0, 50.0, 80.0, 60.0)], &config);
        assert_eq!(blocks[0].class, BlockClass::Commercial);
    }

    #[test]
    fn single_short_edge_contact_is_utility() {
        let site = site_300();
        let config = PipelineConfig::default();
        // Touches the west boundary with its short (40 m) edge only.
        let blocks =
            classify_blocks(&site, vec![rect_polygon(0.0, 100.0, 80.0, 40.0)], &config);
        assert_eq!(blocks[0].class, BlockClass::Utility);
    }

    #[test]
    fn service_quota_interleaves_and_lowest_hosts_wwtp() {
        let site = site_300();
        let config = PipelineConfig {
            elevation_gradient: Some((0.0, 1.0)),
            ..Default::default()
        };
        // A column of ten interior commercial blocks at increasing y.
        let polys: Vec<_> = (0..10)
            .map(|i| rect_polygon(100.0, 8.0 + i as f64 * 28.0, 60.0, 24.0))
            .collect();
        let blocks = classify_blocks(&site, polys, &config);
        let utility = blocks.iter().filter(|b| b.class == BlockClass::Utility).count();
        let service = blocks.iter().filter(|b| b.class == BlockClass::Service).count();
        let commercial = blocks.iter().filter(|b| b.class == BlockClass::Commercial).count();
        assert_eq!(utility, 1);
        assert!(service >= 1);
        assert!(commercial >= 6);
        // The WWTP host is the lowest block.
        let host = blocks.iter().find(|b| b.class == BlockClass::Utility).unwrap();
        assert!(blocks.iter().all(|b| b.elevation >= host.elevation - 1e-9));
    }

    #[test]
    fn lowest_block_hosts_wwtp_without_an_elevation_model() {
        let site = site_300();
        let config = PipelineConfig::default();
        // Four interior commercial blocks stacked at increasing y.
        let polys: Vec<_> = (0..4)
            .map(|i| rect_polygon(100.0, 20.0 + i as f64 * 70.0, 60.0, 40.0))
            .collect();
        let blocks = classify_blocks(&site, polys, &config);
        // With no gradient configured, elevation falls back to the
        // y-coordinate and the southernmost block takes the WWTP role.
        let host = blocks.iter().find(|b| b.class == BlockClass::Utility).unwrap();
        assert_eq!(host.id, 0);
        assert!(blocks.iter().all(|b| b.elevation >= host.elevation));
    }

    #[test]
    fn aesthetic_rewards_square_regular_blocks() {
        let square = shape_stats(&rect_polygon(0.0, 0.0, 40.0, 40.0)).unwrap();
        let sliver = shape_stats(&rect_polygon(0.0, 0.0, 120.0, 10.0)).unwrap();
        assert!(aesthetic_score(&square) > aesthetic_score(&sliver));
    }
}
