use geo::MultiPolygon;

use crate::config::PipelineConfig;
use crate::geom;
use crate::grid::{generate_tiles, GridGenes};
use crate::types::Site;

use super::{Bounds, Evaluation, Problem};

/// Clipped tile parts need at least this rectangularity to count toward
/// usable commercial area.
const USABLE_RECTANGULARITY: f64 = 0.75;

/// Stage-1 grid search: find `(spacing_x, spacing_y, angle, ox, oy)` that
/// carves the site into large, well-shaped blocks.
///
/// Objectives (both minimised):
///  * f₁ = −Σ area of clipped blocks with rectangularity ≥ 0.75
///  * f₂ = number of fragment blocks below the minimum lot area
pub struct GridProblem<'a> {
    site: &'a Site,
    site_multi: MultiPolygon<f64>,
    bounds: Bounds,
    min_lot_area: f64,
}

impl<'a> GridProblem<'a> {
    pub fn new(site: &'a Site, config: &PipelineConfig) -> Self {
        let bounds = Bounds::new(
            vec![config.spacing_min, config.spacing_min, config.angle_min, 0.0, 0.0],
            vec![
                config.spacing_max,
                config.spacing_max,
                config.angle_max,
                config.spacing_max,
                config.spacing_max,
            ],
        );
        Self {
            site,
            site_multi: site.as_multi(),
            bounds,
            min_lot_area: config.min_lot_area,
        }
    }

    /// The blocks a gene vector produces: tiles clipped to the site,
    /// multi-part results split apart.
    pub fn blocks_for(&self, genes: &GridGenes) -> Vec<geo::Polygon<f64>> {
        generate_tiles(self.site, genes)
            .into_iter()
            .flat_map(|tile| {
                geom::parts(geom::intersection(
                    &MultiPolygon(vec![tile]),
                    &self.site_multi,
                ))
            })
            .collect()
    }
}

impl Problem for GridProblem<'_> {
    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn num_objectives(&self) -> usize {
        2
    }

    fn evaluate(&self, genes: &[f64]) -> Evaluation {
        let genes = GridGenes::from_slice(genes);
        let mut usable_area = 0.0;
        let mut fragments = 0usize;

        for block in self.blocks_for(&genes) {
            let area = geom::area(&block);
            if area < self.min_lot_area {
                fragments += 1;
            }
            let rectangularity = geom::minimum_rotated_rect(&block)
                .map(|obb| area / geom::area(&obb).max(f64::EPSILON))
                .unwrap_or(0.0);
            if rectangularity >= USABLE_RECTANGULARITY {
                usable_area += area;
            }
        }
        Evaluation::feasible(vec![-usable_area, fragments as f64])
    }
}
