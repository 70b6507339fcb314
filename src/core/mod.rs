//! Core clutter simulation modules

pub mod frames;
pub mod trajectory;
pub mod facet_grid;
pub mod bounds;
pub mod terrain;
pub mod scatter;
pub mod binning;
pub mod assemble;

// Re-export main types
pub use frames::{
    AxisOrder, CoordinateTransform, CrsDefinition, FramePair, GdalTransform, GdalTransformBuilder,
    GeodeticTransform, TransformBuilder, LLE_SYSTEM, XYZ_SYSTEM,
};
pub use trajectory::{DuplicateIndex, NavRecord, Trajectory, TrajectoryPoint, TrajectoryPreprocessor};
pub use facet_grid::{FacetGrid, FacetGridGenerator, FacetParams};
pub use bounds::BoundingBoxCalculator;
pub use terrain::TerrainWindow;
pub use scatter::{ClutterSimulator, Facet, ScatteringLaw, SimulationParams};
pub use binning::{BinnedTrace, TraceBinner, TraceParams};
pub use assemble::{FirstReturnRow, OutputAssembler, OutputProduct};
