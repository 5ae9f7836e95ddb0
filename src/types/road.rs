use geo::{LineString, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::geom;

/// Functional class of a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadClass {
    Main,
    Internal,
}

/// A road centreline with a width; the footprint is the centreline
/// buffered by half the width.
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub line: LineString<f64>,
    pub width: f64,
    pub class: RoadClass,
}

impl RoadSegment {
    pub fn new(line: LineString<f64>, width: f64, class: RoadClass) -> Self {
        Self { line, width, class }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        geom::polyline_length(&self.line)
    }

    /// Buffered footprint of this segment alone.
    pub fn footprint(&self) -> MultiPolygon<f64> {
        geom::buffer_line(&self.line, self.width / 2.0)
    }
}

/// The stage-1 road network: segments plus their merged footprint,
/// already clipped to the site.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    pub segments: Vec<RoadSegment>,
    pub footprint: MultiPolygon<f64>,
}

impl Default for RoadNetwork {
    fn default() -> Self {
        Self { segments: Vec::new(), footprint: MultiPolygon(Vec::new()) }
    }
}

impl RoadNetwork {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total centreline length over all segments.
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(RoadSegment::length).sum()
    }

    /// Total paved area.
    pub fn footprint_area(&self) -> f64 {
        geom::multi_area(&self.footprint)
    }
}
