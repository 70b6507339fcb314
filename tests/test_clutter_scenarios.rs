use approx::assert_relative_eq;
use ndarray::{s, Array2};
use simclutter::core::frames::geodetic_to_ecef;
use simclutter::core::{
    BoundingBoxCalculator, ClutterSimulator, CoordinateTransform, FacetGridGenerator, FacetParams,
    GeodeticTransform, NavRecord, OutputAssembler, ScatteringLaw, SimulationParams, TerrainWindow,
    TraceParams, TrajectoryPreprocessor,
};
use simclutter::{simulate_trajectory, GeoTransform};

const C: f64 = 299_792_458.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 0.001 degree lon/lat raster covering [-0.1, 0.1] x [-0.1, 0.1]
fn terrain_gt() -> GeoTransform {
    GeoTransform::from_gdal([-0.1, 0.001, 0.0, 0.1, 0.0, -0.001])
}

fn flat_terrain(elevation: f32) -> TerrainWindow {
    TerrainWindow::new(Array2::from_elem((200, 200), elevation), terrain_gt(), Some(-9999.0)).unwrap()
}

fn rough_elevations() -> Array2<f32> {
    Array2::from_shape_fn((200, 200), |(r, c)| {
        let (r, c) = (r as f32, c as f32);
        400.0 + 60.0 * (c / 7.0).sin() + 45.0 * (r / 5.0).cos() + 0.5 * c
    })
}

fn rough_terrain() -> TerrainWindow {
    let mut data = rough_elevations();
    data[[100, 103]] = -9999.0;
    TerrainWindow::new(data, terrain_gt(), Some(-9999.0)).unwrap()
}

fn nav_row(lat: f64, lon: f64, h: f64, datum: f64) -> NavRecord {
    let p = geodetic_to_ecef(lat, lon, h);
    NavRecord { x: p.x, y: p.y, z: p.z, datum }
}

fn params(dist: (f64, f64), step: (f64, f64)) -> SimulationParams {
    SimulationParams {
        facet: FacetParams { at_dist: dist.0, ct_dist: dist.1, at_step: step.0, ct_step: step.1 },
        scattering: ScatteringLaw::default(),
        speed_light: C,
    }
}

#[test]
fn test_nadir_only_flat_terrain() {
    init_logging();

    let h = 5000.0;
    let dt = 1e-8;
    let samples = 2048;
    let trajectory = TrajectoryPreprocessor::prepare(&[nav_row(0.0, 0.0, h, 0.0)]).unwrap();
    let sim = params((0.0, 0.0), (10.0, 10.0));

    let output = simulate_trajectory(
        &trajectory,
        &flat_terrain(0.0),
        &GeodeticTransform::terrain_pair(),
        sim,
        TraceParams { dt, trace_samples: samples },
        false,
    )
    .unwrap();

    assert_eq!(output.facet_count, 1);
    let binned = &output.traces[0];
    let expected_bin = ((2.0 * h / C) / dt).floor() as usize % samples;
    let expected_power = ScatteringLaw::default().power(0.0, h);

    for (i, &v) in binned.trace.iter().enumerate() {
        if i == expected_bin {
            assert_relative_eq!(v, expected_power, max_relative = 1e-6);
        } else {
            assert_eq!(v, 0.0, "unexpected power in sample {}", i);
        }
    }

    let fret = binned.first_return.unwrap();
    assert_relative_eq!((fret - geodetic_to_ecef(0.0, 0.0, 0.0)).norm(), 0.0, epsilon = 1e-6);
}

#[test]
fn test_nadir_only_flat_terrain_mid_latitude() {
    init_logging();

    let h = 5000.0;
    let dt = 1e-8;
    let samples = 2048;
    let terrain = TerrainWindow::new(
        Array2::from_elem((100, 100), 0.0f32),
        GeoTransform::from_gdal([44.95, 0.001, 0.0, 45.05, 0.0, -0.001]),
        Some(-9999.0),
    )
    .unwrap();
    let trajectory = TrajectoryPreprocessor::prepare(&[nav_row(45.0, 45.0, h, 0.0)]).unwrap();
    let sim = params((0.0, 0.0), (10.0, 10.0));
    let frames = GeodeticTransform::terrain_pair();

    // Flat ground seen straight down: the facet normal is the ellipsoid normal
    let facets = ClutterSimulator::new(&terrain, sim).simulate(&trajectory.points[0], &frames.build().unwrap());
    assert_eq!(facets.len(), 1);
    assert!(facets[0].incidence < 1e-6, "incidence {}", facets[0].incidence);
    assert_relative_eq!(facets[0].power, ScatteringLaw::default().power(0.0, h), max_relative = 1e-9);

    let output = simulate_trajectory(&trajectory, &terrain, &frames, sim, TraceParams { dt, trace_samples: samples }, false)
        .unwrap();
    let binned = &output.traces[0];
    let expected_bin = ((2.0 * h / C) / dt).floor() as usize % samples;
    assert!(binned.trace[expected_bin] > 0.0);
    assert_eq!(binned.trace.iter().filter(|&&v| v > 0.0).count(), 1);

    let fret = binned.first_return.unwrap();
    assert_relative_eq!((fret - geodetic_to_ecef(45.0, 45.0, 0.0)).norm(), 0.0, epsilon = 1e-6);
}

#[test]
fn test_footprint_outside_terrain_gives_zero_trace() {
    init_logging();

    let rows = vec![nav_row(0.0, 1.0, 3000.0, 0.0), nav_row(0.0, 1.01, 3000.0, 0.0)];
    let trajectory = TrajectoryPreprocessor::prepare(&rows).unwrap();

    let output = simulate_trajectory(
        &trajectory,
        &flat_terrain(100.0),
        &GeodeticTransform::terrain_pair(),
        params((500.0, 500.0), (50.0, 50.0)),
        TraceParams { dt: 1e-8, trace_samples: 512 },
        false,
    )
    .unwrap();

    assert_eq!(output.empty_points, 2);
    for binned in &output.traces {
        assert!(binned.trace.iter().all(|&v| v == 0.0));
        assert!(binned.first_return.is_none());
    }
}

#[test]
fn test_duplicate_rows_get_identical_columns() {
    init_logging();

    let rows = vec![
        nav_row(0.0, -0.02, 4000.0, 1e-6),
        nav_row(0.0, -0.01, 4000.0, 1e-6),
        nav_row(0.0, 0.0, 4000.0, 1e-6),
        nav_row(0.0, -0.01, 4000.0, 1e-6),
        nav_row(0.0, 0.01, 4000.0, 1e-6),
        nav_row(0.0, 0.0, 4000.0, 1e-6),
    ];
    let trajectory = TrajectoryPreprocessor::prepare(&rows).unwrap();
    assert_eq!(trajectory.points.len(), 4);

    let trace = TraceParams { dt: 2e-8, trace_samples: 1024 };
    let output = simulate_trajectory(
        &trajectory,
        &rough_terrain(),
        &GeodeticTransform::terrain_pair(),
        params((600.0, 400.0), (30.0, 20.0)),
        trace,
        false,
    )
    .unwrap();

    let product = OutputAssembler::scatter(&output.traces, &trajectory.index, trace.trace_samples).unwrap();

    assert_eq!(product.combined.dim(), (1024, 6));
    assert_eq!(product.combined.column(1), product.combined.column(3));
    assert_eq!(product.combined.column(2), product.combined.column(5));
    assert_eq!(product.first_returns[1], product.first_returns[3]);
    assert_eq!(product.first_returns[2], product.first_returns[5]);
    assert_ne!(product.combined.column(0), product.combined.column(1));
    assert!(product.combined.sum() > 0.0);
}

#[test]
fn test_simulation_is_deterministic() {
    init_logging();

    let rows: Vec<NavRecord> = (0..12)
        .map(|i| nav_row(0.001 * i as f64, -0.03 + 0.005 * i as f64, 3500.0, 0.0))
        .collect();
    let trajectory = TrajectoryPreprocessor::prepare(&rows).unwrap();
    let terrain = rough_terrain();
    let trace = TraceParams { dt: 1e-8, trace_samples: 800 };
    let sim = params((900.0, 600.0), (30.0, 30.0));

    let first = simulate_trajectory(&trajectory, &terrain, &GeodeticTransform::terrain_pair(), sim, trace, true).unwrap();
    let second = simulate_trajectory(&trajectory, &terrain, &GeodeticTransform::terrain_pair(), sim, trace, false).unwrap();

    assert_eq!(first.facet_count, second.facet_count);
    for (a, b) in first.traces.iter().zip(second.traces.iter()) {
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.first_return, b.first_return);
    }
}

#[test]
fn test_facets_stay_inside_bounding_window() {
    init_logging();

    let rows: Vec<NavRecord> = (0..8).map(|i| nav_row(0.0, -0.04 + 0.01 * i as f64, 3000.0, 0.0)).collect();
    let trajectory = TrajectoryPreprocessor::prepare(&rows).unwrap();
    let sim = params((900.0, 450.0), (30.0, 30.0));
    let full = rough_elevations();
    let gt = terrain_gt();
    let frames = GeodeticTransform::terrain_pair();

    let window = BoundingBoxCalculator::calculate(
        &trajectory.points,
        &sim.facet,
        &frames.to_terrain,
        &gt,
        (full.ncols(), full.nrows()),
    )
    .unwrap();

    for point in &trajectory.points {
        let mut footprints = FacetGridGenerator::generate(point, &sim.facet).footprints;
        frames.to_terrain.transform(&mut footprints).unwrap();
        for p in &footprints {
            let (col, row) = gt.world_to_pixel(p.x, p.y).unwrap();
            assert!(
                window.contains(col.floor() as i64, row.floor() as i64),
                "pixel ({}, {}) outside {:?}",
                col,
                row,
                window
            );
        }
    }

    // Simulating on the loaded sub-window matches simulating on the whole raster
    let sub = full
        .slice(s![window.row_min..=window.row_max, window.col_min..=window.col_max])
        .to_owned();
    let windowed = TerrainWindow::new(sub, gt.shifted(window.col_min, window.row_min), Some(-9999.0)).unwrap();
    let whole = TerrainWindow::new(full, gt, Some(-9999.0)).unwrap();
    let trace = TraceParams { dt: 1e-8, trace_samples: 1000 };

    let a = simulate_trajectory(&trajectory, &windowed, &frames, sim, trace, false).unwrap();
    let b = simulate_trajectory(&trajectory, &whole, &frames, sim, trace, false).unwrap();
    assert_eq!(a.facet_count, b.facet_count);
    for (x, y) in a.traces.iter().zip(b.traces.iter()) {
        assert_eq!(x.trace, y.trace);
    }
}

#[test]
fn test_return_at_trace_length_is_dropped() {
    init_logging();

    let h = 2000.0;
    let dt = 1e-8;
    let samples = 100;
    let sim = params((0.0, 0.0), (10.0, 10.0));
    let terrain = flat_terrain(0.0);
    let frames = GeodeticTransform::terrain_pair();

    // Measure the nadir delay first
    let nadir = TrajectoryPreprocessor::prepare(&[nav_row(0.0, 0.0, h, 0.0)]).unwrap();
    let facets = ClutterSimulator::new(&terrain, sim).simulate(&nadir.points[0], &frames.build().unwrap());
    let twtt = facets[0].twtt;

    let run = |datum: f64| {
        let trajectory = TrajectoryPreprocessor::prepare(&[nav_row(0.0, 0.0, h, datum)]).unwrap();
        simulate_trajectory(&trajectory, &terrain, &frames, sim, TraceParams { dt, trace_samples: samples }, false)
            .unwrap()
            .traces
            .remove(0)
    };

    // Delay lands in bin == samples: zeroed, bin 0 stays empty
    let late = run(twtt - (samples as f64 + 0.5) * dt);
    assert!(late.trace.iter().all(|&v| v == 0.0));
    assert!(late.first_return.is_some());

    // One bin earlier is the last valid sample
    let last = run(twtt - (samples as f64 - 0.5) * dt);
    assert!(last.trace[samples - 1] > 0.0);
    assert_eq!(last.trace.iter().filter(|&&v| v > 0.0).count(), 1);
}

#[test]
fn test_nodata_pixels_are_skipped() {
    init_logging();

    let mut data = Array2::from_elem((200, 200), -9999.0f32);
    data[[100, 100]] = 50.0;
    let terrain = TerrainWindow::new(data, terrain_gt(), Some(-9999.0)).unwrap();
    let trajectory = TrajectoryPreprocessor::prepare(&[nav_row(-0.0005, 0.0005, 3000.0, 0.0)]).unwrap();

    let output = simulate_trajectory(
        &trajectory,
        &terrain,
        &GeodeticTransform::terrain_pair(),
        params((300.0, 300.0), (30.0, 30.0)),
        TraceParams { dt: 1e-8, trace_samples: 4096 },
        false,
    )
    .unwrap();

    // Only footprints falling in the single valid pixel survive
    assert!(output.facet_count >= 1);
    assert!(output.facet_count < 21 * 21);
    let fret = output.traces[0].first_return.unwrap();
    let (lat, lon, elev) = simclutter::core::frames::ecef_to_geodetic(&fret);
    assert!((-0.001..=0.0).contains(&lat));
    assert!((0.0..=0.001).contains(&lon));
    assert_relative_eq!(elev, 50.0, epsilon = 1e-3);
}
