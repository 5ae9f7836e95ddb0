// End-to-end scenarios: full pipeline runs over canonical sites, plus the
// layout invariants every run must hold.

use geo::{Contains, Point};
use groundplan::{
    BlockClass, Deadline, FacilityKind, FacilityProblem, Layout, LayoutMethod, LayoutStatus,
    Nsga2Params, Pipeline, PipelineConfig, SpatialIndex, Warning,
};

fn square(side: f64) -> Vec<(f64, f64)> {
    vec![(0.0, 0.0), (side, 0.0), (side, side), (0.0, side), (0.0, 0.0)]
}

fn rect(width: f64, height: f64) -> Vec<(f64, f64)> {
    vec![(0.0, 0.0), (width, 0.0), (width, height), (0.0, height), (0.0, 0.0)]
}

/// Pairwise lot overlap area via the public spatial index.
fn lot_overlap(layout: &Layout) -> f64 {
    use geo::{Area, BooleanOps};
    let polys: Vec<_> = layout.lots.iter().map(|l| l.polygon.clone()).collect();
    let index = SpatialIndex::new(polys.clone());
    let mut total = 0.0;
    for (i, poly) in polys.iter().enumerate() {
        for j in index.query_intersecting(poly) {
            if j > i {
                total += poly.intersection(&polys[j]).unsigned_area();
            }
        }
    }
    total
}

fn assert_core_invariants(layout: &Layout, config: &PipelineConfig) {
    use geo::{Area, BooleanOps};

    // I2: every lot lies in exactly one block.
    for lot in &layout.lots {
        let block = &layout.blocks[lot.block_id as usize];
        let holders = layout
            .blocks
            .iter()
            .filter(|b| b.polygon.contains(&lot.centroid))
            .count();
        assert!(block.polygon.contains(&lot.centroid), "lot {} outside its block", lot.id);
        assert_eq!(holders, 1, "lot {} held by {holders} blocks", lot.id);
    }

    // I3: lots are pairwise disjoint up to tolerance.
    let total_lot_area: f64 = layout.lots.iter().map(|l| l.area).sum();
    assert!(
        lot_overlap(layout) <= 1e-6 * total_lot_area.max(1.0),
        "lots overlap"
    );

    // I4: lot widths within bounds, areas above the floor.
    for lot in &layout.lots {
        assert!(
            lot.width >= config.min_lot_width - 1e-6 && lot.width <= config.max_lot_width + 1e-6,
            "lot {} width {} outside bounds",
            lot.id,
            lot.width
        );
        assert!(lot.area >= config.min_lot_area - 1e-6);
    }

    // I5: the cable network spans every lot.
    if let Some(network) = &layout.network {
        assert_eq!(network.tree_edges.len() + 1, network.nodes.len());
        let cap = (config.loop_redundancy_ratio * layout.lots.len() as f64).ceil() as usize;
        assert!(network.loop_edges.len() <= cap);
    }

    // I6: transformer loads respect capacity unless flagged.
    let overloaded = layout
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::TransformerOverload { .. }));
    if !overloaded {
        for t in &layout.transformers {
            assert!(t.load_kw <= config.transformer_capacity_kva + 1e-9);
        }
    }

    // P2: utilization is a ratio.
    assert!((0.0..=1.0).contains(&layout.metrics.utilization_ratio));

    // Every block stays inside the site.
    let site_multi = geo::MultiPolygon(vec![layout.site.polygon().clone()]);
    for block in &layout.blocks {
        let inside = geo::MultiPolygon(vec![block.polygon.clone()]).intersection(&site_multi);
        assert!(
            (inside.unsigned_area() - block.stats.area).abs() < 0.01 * block.stats.area.max(1.0),
            "block {} leaks outside the site",
            block.id
        );
    }
}

/// Scenario: 100x100 m site, grid mode, seeded. The optimizer should carve
/// most of the site into commercial blocks and fill them with lots.
#[test]
fn unit_square_grid_layout() {
    let config = PipelineConfig {
        layout_method: LayoutMethod::Grid,
        spacing_min: 20.0,
        spacing_max: 30.0,
        population_size: 50,
        generations: 20,
        target_lot_width: 10.0,
        min_lot_width: 5.0,
        max_lot_width: 10.0,
        setback_distance: 6.0,
        min_lot_area: 50.0,
        min_block_area: 300.0,
        road_internal_width: 2.0,
        service_area_ratio: 0.05,
        seed: 42,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config.clone()).unwrap();
    let layout = pipeline.run(square(100.0), vec![], &[]).unwrap();

    assert_ne!(layout.status, LayoutStatus::Failed);
    let commercial = layout.blocks.iter().filter(|b| b.class == BlockClass::Commercial).count();
    assert!(commercial >= 1, "no commercial blocks");
    assert!(
        layout.metrics.utilization_ratio >= 0.55,
        "utilization {}",
        layout.metrics.utilization_ratio
    );
    assert!(layout.metrics.lot_count >= 20, "only {} lots", layout.metrics.lot_count);
    assert_core_invariants(&layout, &config);
}

/// Scenario: thin 200x30 m strip. Lots form a single row along the long
/// axis of the widest block and nothing is discarded.
#[test]
fn thin_rectangle_single_row() {
    let config = PipelineConfig {
        layout_method: LayoutMethod::Grid,
        spacing_min: 20.0,
        spacing_max: 30.0,
        population_size: 24,
        generations: 10,
        target_lot_width: 10.0,
        min_lot_width: 5.0,
        max_lot_width: 10.0,
        setback_distance: 3.0,
        min_lot_area: 50.0,
        min_block_area: 350.0,
        max_aspect_ratio: 15.0,
        road_internal_width: 2.0,
        seed: 42,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config.clone()).unwrap();
    let layout = pipeline.run(rect(200.0, 30.0), vec![], &[]).unwrap();

    assert_ne!(layout.status, LayoutStatus::Failed);
    assert_eq!(layout.metrics.discarded_blocks, 0, "warnings: {:?}", layout.warnings);
    assert!(layout.metrics.lot_count >= 6, "only {} lots", layout.metrics.lot_count);

    // The widest block carries a single row of lots: every lot centroid
    // projects to the same offset across the block's dominant edge.
    let widest = layout
        .blocks
        .iter()
        .filter(|b| b.class == BlockClass::Commercial)
        .max_by(|a, b| a.stats.area.total_cmp(&b.stats.area))
        .expect("at least one commercial block");
    let row: Vec<&groundplan::Lot> =
        layout.lots.iter().filter(|l| l.block_id == widest.id).collect();
    assert!(!row.is_empty());
    let (dx, dy) = widest.stats.dominant_edge;
    let across = |p: Point<f64>| -dy * p.x() + dx * p.y();
    for pair in row.windows(2) {
        assert!(
            (across(pair[0].centroid) - across(pair[1].centroid)).abs() < 1.0,
            "lots stacked across the frontage"
        );
    }
    assert_core_invariants(&layout, &config);
}

fn l_shape() -> Vec<(f64, f64)> {
    // 200x200 outer square with the 100x100 north-east corner notched out.
    vec![
        (0.0, 0.0),
        (200.0, 0.0),
        (200.0, 100.0),
        (100.0, 100.0),
        (100.0, 200.0),
        (0.0, 200.0),
        (0.0, 0.0),
    ]
}

/// Scenario: L-shaped site, Voronoi mode. Blocks stay inside the L and the
/// seeded road network replays identically.
#[test]
fn l_shape_voronoi_deterministic() {
    let config = PipelineConfig {
        layout_method: LayoutMethod::Voronoi,
        voronoi_seeds: 15,
        lloyd_iterations: 20,
        road_main_width: 8.0,
        road_internal_width: 6.0,
        turning_radius: 5.0,
        min_block_area: 400.0,
        min_lot_area: 200.0,
        min_lot_width: 10.0,
        max_lot_width: 40.0,
        target_lot_width: 25.0,
        seed: 7,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config.clone()).unwrap();
    let layout = pipeline.run(l_shape(), vec![], &[]).unwrap();

    assert_ne!(layout.status, LayoutStatus::Failed);
    assert!(layout.blocks.len() >= 5, "only {} blocks", layout.blocks.len());
    assert_core_invariants(&layout, &config);

    // Deterministic replay: identical seed, identical road network.
    let replay = pipeline.run(l_shape(), vec![], &[]).unwrap();
    assert_eq!(layout.roads.segments.len(), replay.roads.segments.len());
    assert!(
        (layout.roads.total_length() - replay.roads.total_length()).abs() < 1e-9,
        "road length not reproducible"
    );
    assert_eq!(layout.metrics.lot_count, replay.metrics.lot_count);
}

/// I7: two full runs with the same site, config and seed produce an
/// identical layout.
#[test]
fn deterministic_replay_byte_identical() {
    let config = PipelineConfig {
        layout_method: LayoutMethod::Grid,
        spacing_min: 20.0,
        spacing_max: 30.0,
        population_size: 12,
        generations: 6,
        min_lot_width: 5.0,
        max_lot_width: 12.0,
        target_lot_width: 10.0,
        min_lot_area: 50.0,
        min_block_area: 300.0,
        road_internal_width: 2.0,
        seed: 1234,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let a = pipeline.run(square(80.0), vec![], &[]).unwrap();
    let b = pipeline.run(square(80.0), vec![], &[]).unwrap();

    assert_eq!(a.lots.len(), b.lots.len());
    for (x, y) in a.lots.iter().zip(&b.lots) {
        assert_eq!(x.polygon, y.polygon);
        assert_eq!(x.block_id, y.block_id);
    }
    assert_eq!(
        a.network.as_ref().map(|n| n.tree_edges.clone()),
        b.network.as_ref().map(|n| n.tree_edges.clone())
    );
    assert_eq!(a.transformers.len(), b.transformers.len());
    for (x, y) in a.transformers.iter().zip(&b.transformers) {
        assert_eq!(x.position, y.position);
        assert_eq!(x.served, y.served);
    }
    assert_eq!(a.metrics.mst_length, b.metrics.mst_length);
}

/// Scenario: hard-constrained facility placement on a 500x400 m site with
/// type-pair separations. The search must end with a feasible front whose
/// members satisfy every constraint.
#[test]
fn constrained_facilities_feasible_front() {
    let kinds = vec![
        FacilityKind { name: "warehouse", min_dim: 30.0, max_dim: 80.0 },
        FacilityKind { name: "office", min_dim: 30.0, max_dim: 60.0 },
        FacilityKind { name: "factory", min_dim: 30.0, max_dim: 90.0 },
        FacilityKind { name: "storage", min_dim: 30.0, max_dim: 70.0 },
    ];
    let buildable = geo::Rect::new(
        geo::Coord { x: 0.0, y: 0.0 },
        geo::Coord { x: 500.0, y: 400.0 },
    )
    .to_polygon();
    let mut problem = FacilityProblem::new(buildable.clone(), kinds, 10.0);
    problem.set_separation(0, 1, 50.0);
    problem.set_separation(2, 1, 100.0);

    let params = Nsga2Params {
        population_size: 60,
        generations: 80,
        mutation_prob: 1.0 / 16.0,
        seed: 42,
        ..Default::default()
    };
    let outcome = groundplan::optimize::run(&problem, &params, Deadline::none()).unwrap();

    let feasible: Vec<_> = outcome.front.iter().filter(|ind| ind.is_feasible()).collect();
    assert!(!feasible.is_empty(), "no feasible Pareto solutions");
    let buildable_multi = geo::MultiPolygon(vec![buildable.clone()]);
    for individual in feasible {
        let plots = problem.decode(&individual.genes);
        for i in 0..plots.len() {
            use geo::{Area, BooleanOps};
            let outside = geo::MultiPolygon(vec![plots[i].polygon()])
                .difference(&buildable_multi)
                .unsigned_area();
            assert!(outside <= 1e-3, "plot {i} leaves the buildable area by {outside} m²");
            for j in (i + 1)..plots.len() {
                let (a, b) = (&plots[i], &plots[j]);
                let sep_x = (a.x - b.x).abs() - (a.width + b.width) / 2.0;
                let sep_y = (a.y - b.y).abs() - (a.height + b.height) / 2.0;
                let required = match (i, j) {
                    (0, 1) => 50.0,
                    (1, 2) => 100.0,
                    _ => 10.0,
                };
                assert!(
                    sep_x.max(sep_y) >= required - 1e-6,
                    "plots {i},{j} too close"
                );
            }
        }
    }
}

/// Scenario: MST over 10 seeded-uniform lot centroids in 100x100 m with a
/// 500 m cut-off: 9 tree edges, then ⌈0.15·10⌉ = 2 redundancy edges.
#[test]
fn mst_over_ten_uniform_centroids() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(99);
    let points: Vec<Point<f64>> = (0..10)
        .map(|_| Point::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)))
        .collect();

    let bare = groundplan::plan_network(&points, &[], 500.0, 0.0).unwrap();
    assert_eq!(bare.tree_edges.len(), 9);

    let looped = groundplan::plan_network(&points, &[], 500.0, 0.15).unwrap();
    assert_eq!(looped.tree_edges.len(), 9);
    assert_eq!(looped.loop_edges.len(), 2);
    assert!(looped.total_length > bare.total_length);
}
