use geo::{BoundingRect, Intersects, Polygon, Rect};
use rstar::{RTree, AABB};

use super::BoundingBox;

/// A collection of polygons with an R-tree over their envelopes.
///
/// Queries never miss a true positive; envelope hits may be false positives,
/// which the exact-predicate helpers filter out. The index is rebuilt per
/// collection and does not outlive it.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    shapes: Vec<Polygon<f64>>,
    rtree: RTree<BoundingBox>,
}

impl SpatialIndex {
    /// Build an index over a collection of polygons. Degenerate polygons
    /// (no bounding rect) are kept in the store but never matched.
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let boxes = polygons
            .iter()
            .enumerate()
            .filter_map(|(i, poly)| poly.bounding_rect().map(|r| BoundingBox::new(i, r)))
            .collect();
        Self { rtree: RTree::bulk_load(boxes), shapes: polygons }
    }

    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    #[inline] pub fn shapes(&self) -> &[Polygon<f64>] { &self.shapes }

    #[inline] pub fn get(&self, idx: usize) -> &Polygon<f64> { &self.shapes[idx] }

    /// Indices of polygons whose envelope intersects `rect`.
    pub fn query_envelope(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut hits: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|b| b.idx())
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Indices of polygons that exactly intersect `poly`
    /// (envelope candidates filtered by the exact predicate).
    pub fn query_intersecting(&self, poly: &Polygon<f64>) -> Vec<usize> {
        let Some(rect) = poly.bounding_rect() else { return Vec::new() };
        self.query_envelope(&rect)
            .into_iter()
            .filter(|&i| self.shapes[i].intersects(poly))
            .collect()
    }

    /// Indices of the `k` polygons whose envelopes are nearest to `point`.
    pub fn query_nearest(&self, point: [f64; 2], k: usize) -> Vec<usize> {
        self.rtree
            .nearest_neighbor_iter(&point)
            .take(k)
            .map(|b| b.idx())
            .collect()
    }
}
