use geo::{
    Area, BooleanOps, BoundingRect, Buffer, Centroid, Contains, Coord, Intersects, LineString,
    MinimumRotatedRect, MultiPolygon, Point, Polygon, Rect, Rotate, Simplify, Translate,
};

use crate::error::GeometryError;

/// Coordinate tolerance: points closer than this are considered equal.
pub const EPSILON: f64 = 1e-6;

/// Areas below this are treated as empty (square of the coordinate tolerance
/// scaled up to absorb boolean-op slivers).
pub const AREA_EPSILON: f64 = 1e-4;

/// Reject any geometry carrying non-finite coordinates.
pub fn ensure_finite(poly: &Polygon<f64>) -> Result<(), GeometryError> {
    let finite = poly
        .exterior()
        .coords()
        .chain(poly.interiors().iter().flat_map(|r| r.coords()))
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if finite {
        Ok(())
    } else {
        Err(GeometryError::InvalidInput("non-finite coordinate".into()))
    }
}

/// Validity for this engine: finite coordinates, closed simple rings,
/// positive area.
pub fn is_valid(poly: &Polygon<f64>) -> bool {
    if ensure_finite(poly).is_err() {
        return false;
    }
    if !ring_closed(poly.exterior()) || poly.interiors().iter().any(|r| !ring_closed(r)) {
        return false;
    }
    if poly.unsigned_area() <= AREA_EPSILON {
        return false;
    }
    !ring_self_intersects(poly.exterior())
}

/// True if the ring's first and last coordinates coincide within tolerance.
pub fn ring_closed(ring: &LineString<f64>) -> bool {
    match (ring.coords().next(), ring.coords().last()) {
        (Some(a), Some(b)) => points_equal(*a, *b),
        _ => false,
    }
}

#[inline]
pub fn points_equal(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() <= EPSILON && (a.y - b.y).abs() <= EPSILON
}

/// O(n²) proper-crossing test over non-adjacent ring segments. Ring sizes in
/// this engine stay small (tiles, cells, lots), so the quadratic scan is fine.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let segs: Vec<_> = ring.lines().collect();
    let n = segs.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // The closing segment is adjacent to the first.
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_cross(
                segs[i].start, segs[i].end, segs[j].start, segs[j].end,
            ) {
                return true;
            }
        }
    }
    false
}

fn segments_cross(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    let orient = |p: Coord<f64>, q: Coord<f64>, r: Coord<f64>| {
        (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
    };
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

#[inline]
pub fn area(poly: &Polygon<f64>) -> f64 {
    poly.unsigned_area()
}

#[inline]
pub fn multi_area(mp: &MultiPolygon<f64>) -> f64 {
    mp.unsigned_area()
}

/// Centroid, rejecting degenerate polygons.
pub fn centroid(poly: &Polygon<f64>) -> Result<Point<f64>, GeometryError> {
    poly.centroid()
        .ok_or_else(|| GeometryError::DegenerateResult("polygon has no centroid".into()))
}

/// Axis-aligned bounds, rejecting empty polygons.
pub fn bounds(poly: &Polygon<f64>) -> Result<Rect<f64>, GeometryError> {
    poly.bounding_rect()
        .ok_or_else(|| GeometryError::DegenerateResult("polygon has no bounds".into()))
}

/// Buffer by `d` (negative contracts). A contraction that vanishes returns
/// the empty multipolygon rather than an error; callers decide whether empty
/// is acceptable.
pub fn buffer(poly: &Polygon<f64>, d: f64) -> MultiPolygon<f64> {
    snap(poly.buffer(d))
}

pub fn buffer_multi(mp: &MultiPolygon<f64>, d: f64) -> MultiPolygon<f64> {
    snap(mp.buffer(d))
}

/// Footprint of a polyline: the line buffered by half its width.
pub fn buffer_line(line: &LineString<f64>, half_width: f64) -> MultiPolygon<f64> {
    snap(line.buffer(half_width))
}

pub fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    snap(a.intersection(b))
}

pub fn difference(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    snap(a.difference(b))
}

pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    snap(a.union(b))
}

/// Union of many polygons at once. Pairwise folding is fine at this
/// engine's block counts.
pub fn union_all(polys: &[Polygon<f64>]) -> MultiPolygon<f64> {
    let merged = polys
        .iter()
        .map(|p| MultiPolygon(vec![p.clone()]))
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| MultiPolygon(Vec::new()));
    snap(merged)
}

/// Rotate `poly` by `degrees` counter-clockwise around `origin`.
pub fn rotate_around(poly: &Polygon<f64>, degrees: f64, origin: Point<f64>) -> Polygon<f64> {
    poly.rotate_around_point(degrees, origin)
}

pub fn translate(poly: &Polygon<f64>, dx: f64, dy: f64) -> Polygon<f64> {
    Translate::translate(poly, dx, dy)
}

pub fn simplify(poly: &Polygon<f64>, tol: f64) -> Polygon<f64> {
    Simplify::simplify(poly, tol)
}

/// Snap-round a boolean-op result: drop spurious vertices and slivers.
pub fn snap(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon(
        mp.0.into_iter()
            .map(|p| Simplify::simplify(&p, EPSILON))
            .filter(|p| p.unsigned_area() > AREA_EPSILON)
            .collect(),
    )
}

/// Split a multipolygon into its parts, dropping empties.
pub fn parts(mp: MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    mp.0.into_iter()
        .filter(|p| p.unsigned_area() > AREA_EPSILON)
        .collect()
}

/// Minimum rotated rectangle (OBB) of a polygon.
pub fn minimum_rotated_rect(poly: &Polygon<f64>) -> Result<Polygon<f64>, GeometryError> {
    poly.minimum_rotated_rect()
        .ok_or_else(|| GeometryError::DegenerateResult("no minimum rotated rectangle".into()))
}

#[inline]
pub fn contains_point(poly: &Polygon<f64>, p: Point<f64>) -> bool {
    poly.contains(&p)
}

#[inline]
pub fn contains_polygon(outer: &Polygon<f64>, inner: &Polygon<f64>) -> bool {
    outer.contains(inner)
}

#[inline]
pub fn intersects(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b)
}

/// Euclidean distance between two points.
#[inline]
pub fn dist(a: Point<f64>, b: Point<f64>) -> f64 {
    (a.x() - b.x()).hypot(a.y() - b.y())
}

/// Distance from `p` to the segment `(a, b)`.
pub fn distance_point_to_segment(p: Point<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 <= EPSILON * EPSILON {
        return (p.x() - a.x).hypot(p.y() - a.y);
    }
    let t = (((p.x() - a.x) * dx + (p.y() - a.y) * dy) / len2).clamp(0.0, 1.0);
    (p.x() - (a.x + t * dx)).hypot(p.y() - (a.y + t * dy))
}

/// Distance from a point to the nearest point on a polyline.
pub fn distance_point_to_line(p: Point<f64>, line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|seg| distance_point_to_segment(p, seg.start, seg.end))
        .fold(f64::INFINITY, f64::min)
}

/// Total length of a polyline.
pub fn polyline_length(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|seg| (seg.end.x - seg.start.x).hypot(seg.end.y - seg.start.y))
        .sum()
}

/// Perimeter of a polygon, hole boundaries included.
pub fn perimeter(poly: &Polygon<f64>) -> f64 {
    polyline_length(poly.exterior())
        + poly.interiors().iter().map(polyline_length).sum::<f64>()
}

/// Axis-aligned rectangle polygon from corner and size.
pub fn rect_polygon(min_x: f64, min_y: f64, width: f64, height: f64) -> Polygon<f64> {
    Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: min_x + width, y: min_y + height },
    )
    .to_polygon()
}
