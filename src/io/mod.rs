//! I/O modules for configuration, trajectories, DEMs and output products

pub mod config;
pub mod navigation;
pub mod dem;
pub mod output;

pub use config::{ClutterConfig, OutputFlags, PathOverrides};
pub use navigation::NavReader;
pub use dem::DemReader;
pub use output::OutputWriter;
