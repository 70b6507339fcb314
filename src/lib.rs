//! SIMCLUTTER: Facet-Based Radar Sounder Clutter Simulation
//!
//! Simulates surface clutter along a radar sounder trajectory over a DEM. Each
//! trajectory point gets a local grid of terrain facets whose backscattered power
//! is binned by two-way travel time into a delay trace, so that surface echoes can
//! be told apart from genuine subsurface returns in sounding data.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{ClutterError, ClutterResult, GeoTransform, PixelWindow, Vec3};

pub use io::{ClutterConfig, DemReader, NavReader, OutputWriter, PathOverrides};
pub use pipeline::{navigation_frame, run, simulate_trajectory, RunSummary, SimulationOutput};
