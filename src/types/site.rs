use geo::{MultiPolygon, Point, Polygon, Rect};

use crate::error::GeometryError;
use crate::geom;

/// The top-level site polygon. Immutable for the lifetime of a pipeline run;
/// area, centroid and bounds are computed once at construction.
#[derive(Debug, Clone)]
pub struct Site {
    polygon: Polygon<f64>,
    area: f64,
    centroid: Point<f64>,
    bounds: Rect<f64>,
}

impl Site {
    /// Validate and freeze a site polygon.
    pub fn new(polygon: Polygon<f64>) -> Result<Self, GeometryError> {
        geom::ensure_finite(&polygon)?;
        if !geom::is_valid(&polygon) {
            return Err(GeometryError::InvalidInput(
                "site ring must be closed, simple, and enclose positive area".into(),
            ));
        }
        let area = geom::area(&polygon);
        let centroid = geom::centroid(&polygon)?;
        let bounds = geom::bounds(&polygon)?;
        Ok(Self { polygon, area, centroid, bounds })
    }

    /// Build a site from an outer ring and optional holes, closing the
    /// rings if the caller left them open.
    pub fn from_rings(
        outer: Vec<(f64, f64)>,
        holes: Vec<Vec<(f64, f64)>>,
    ) -> Result<Self, GeometryError> {
        let close = |mut ring: Vec<(f64, f64)>| {
            if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
                if (first.0 - last.0).abs() > geom::EPSILON
                    || (first.1 - last.1).abs() > geom::EPSILON
                {
                    ring.push(first);
                }
            }
            geo::LineString::from(ring)
        };
        let polygon = Polygon::new(close(outer), holes.into_iter().map(close).collect());
        Self::new(polygon)
    }

    #[inline] pub fn polygon(&self) -> &Polygon<f64> { &self.polygon }

    #[inline] pub fn area(&self) -> f64 { self.area }

    #[inline] pub fn centroid(&self) -> Point<f64> { self.centroid }

    #[inline] pub fn bounds(&self) -> Rect<f64> { self.bounds }

    /// The site as a one-element multipolygon, for boolean ops.
    #[inline]
    pub fn as_multi(&self) -> MultiPolygon<f64> {
        MultiPolygon(vec![self.polygon.clone()])
    }

    /// Radius of the bounding circle around the centroid: the lattice in
    /// stage 1 must cover this much in every direction to survive rotation.
    pub fn bounding_radius(&self) -> f64 {
        let w = self.bounds.width();
        let h = self.bounds.height();
        (w * w + h * h).sqrt() / 2.0 + geom::EPSILON
    }
}
