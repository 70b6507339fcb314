//! End-to-end clutter simulation run

use crate::core::assemble::{OutputAssembler, OutputProduct};
use crate::core::binning::{BinnedTrace, TraceBinner, TraceParams};
use crate::core::bounds::BoundingBoxCalculator;
use crate::core::frames::{CrsDefinition, FramePair, GdalTransformBuilder, TransformBuilder};
use crate::core::scatter::{ClutterSimulator, SimulationParams};
use crate::core::terrain::TerrainWindow;
use crate::core::trajectory::{Trajectory, TrajectoryPreprocessor};
use crate::io::config::{ClutterConfig, NavigationConfig};
use crate::io::dem::DemReader;
use crate::io::navigation::NavReader;
use crate::io::output::OutputWriter;
use crate::types::ClutterResult;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-point binned traces plus bookkeeping for a whole trajectory
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// One entry per unique trajectory point
    pub traces: Vec<BinnedTrace>,
    /// Unique points without any surviving facet
    pub empty_points: usize,
    pub facet_count: usize,
}

/// Statistics of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub rows: usize,
    pub unique_points: usize,
    pub empty_points: usize,
    pub facet_count: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Logs completion at every 10 % step
struct Progress {
    enabled: bool,
    total: usize,
    done: AtomicUsize,
}

impl Progress {
    fn new(enabled: bool, total: usize) -> Self {
        Self { enabled, total, done: AtomicUsize::new(0) }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.enabled || self.total == 0 {
            return;
        }
        let step = (self.total / 10).max(1);
        if done % step == 0 || done == self.total {
            log::info!("Simulated {}/{} trajectory points ({:.0}%)", done, self.total, 100.0 * done as f64 / self.total as f64);
        }
    }
}

/// Simulate and bin every unique trajectory point
///
/// Points are independent; with the `parallel` feature each rayon worker builds
/// its own frame transforms and results are collected in trajectory order.
pub fn simulate_trajectory<B: TransformBuilder>(
    trajectory: &Trajectory,
    terrain: &TerrainWindow,
    frames: &FramePair<B>,
    params: SimulationParams,
    trace: TraceParams,
    show_progress: bool,
) -> ClutterResult<SimulationOutput> {
    let simulator = ClutterSimulator::new(terrain, params);
    let binner = TraceBinner::new(trace);
    let progress = Progress::new(show_progress, trajectory.points.len());

    log::info!("Simulating {} unique trajectory points", trajectory.points.len());

    let run_point = |frame: &FramePair<B::Transform>, i: usize| -> (BinnedTrace, usize) {
        let point = &trajectory.points[i];
        let facets = simulator.simulate(point, frame);
        let binned = binner.bin(&facets, point.datum);
        progress.tick();
        (binned, facets.len())
    };

    #[cfg(feature = "parallel")]
    let results: Vec<(BinnedTrace, usize)> = (0..trajectory.points.len())
        .into_par_iter()
        .map_init(
            || frames.build(),
            |frame, i| match frame {
                Ok(frame) => Ok(run_point(frame, i)),
                Err(e) => Err(crate::types::ClutterError::Transform(e.to_string())),
            },
        )
        .collect::<ClutterResult<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(BinnedTrace, usize)> = {
        let frame = frames.build()?;
        (0..trajectory.points.len()).map(|i| run_point(&frame, i)).collect()
    };

    let empty_points = results.iter().filter(|(_, n)| *n == 0).count();
    let facet_count = results.iter().map(|(_, n)| n).sum();
    if empty_points > 0 {
        log::warn!("{} trajectory points had no facets on valid terrain", empty_points);
    }

    Ok(SimulationOutput {
        traces: results.into_iter().map(|(t, _)| t).collect(),
        empty_points,
        facet_count,
    })
}

/// Transform from the trajectory CRS into the working frame
///
/// Trajectory columns follow the authority axis order of `navsys`, so a geographic
/// trajectory in EPSG:4326 stores latitude in `x` and longitude in `y`.
pub fn navigation_frame(navigation: &NavigationConfig) -> GdalTransformBuilder {
    GdalTransformBuilder::new(
        CrsDefinition::authority(navigation.navsys.as_str()),
        CrsDefinition::traditional(navigation.xyzsys.as_str()),
    )
}

/// Run the whole simulation described by a validated configuration
pub fn run(config: &ClutterConfig, show_progress: bool) -> ClutterResult<RunSummary> {
    if config.coherent {
        log::info!("Signal path configured, coherent processing flag set");
    }

    let mut nav = NavReader::read(&config.paths.navpath)?;
    let nav_to_xyz = navigation_frame(&config.navigation).build()?;
    NavReader::to_working_frame(&mut nav, &nav_to_xyz)?;

    let trajectory = TrajectoryPreprocessor::prepare(&nav)?;

    let dem = DemReader::open(&config.paths.dempath)?;
    let frames = GdalTransformBuilder::terrain_pair(&config.navigation.xyzsys, &dem.crs_wkt);
    let window = BoundingBoxCalculator::calculate(
        &trajectory.points,
        &config.simulation.facet,
        &frames.to_terrain.build()?,
        &dem.geo_transform,
        dem.raster_size,
    )?;
    let terrain = dem.read_window(&window)?;

    let output = simulate_trajectory(
        &trajectory,
        &terrain,
        &frames,
        config.simulation,
        config.trace,
        show_progress,
    )?;

    let product = OutputAssembler::scatter(&output.traces, &trajectory.index, config.trace.trace_samples)?;
    let artifacts = write_products(config, &product, &nav)?;

    Ok(RunSummary {
        rows: trajectory.index.len(),
        unique_points: trajectory.points.len(),
        empty_points: output.empty_points,
        facet_count: output.facet_count,
        artifacts,
    })
}

fn write_products(
    config: &ClutterConfig,
    product: &OutputProduct,
    nav: &[crate::core::trajectory::NavRecord],
) -> ClutterResult<Vec<PathBuf>> {
    let mut artifacts = Vec::new();

    if config.outputs.first_return() {
        let to_lle = GdalTransformBuilder::new(
            CrsDefinition::traditional(config.navigation.xyzsys.as_str()),
            CrsDefinition::authority(config.navigation.llesys.as_str()),
        )
        .build()?;
        let table = OutputAssembler::first_return_table(
            product,
            nav,
            &to_lle,
            config.simulation.speed_light,
            config.trace.dt,
        )?;
        let path = config.paths.product_path("firstReturn.csv");
        OutputWriter::write_first_returns(&path, &table)?;
        artifacts.push(path);
    }

    if config.outputs.combined() {
        let path = config.paths.product_path("combined.img");
        OutputWriter::write_combined(&path, &product.combined)?;
        artifacts.push(path);
    }

    Ok(artifacts)
}
