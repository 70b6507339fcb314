use crate::core::facet_grid::{FacetGridGenerator, FacetParams};
use crate::core::frames::CoordinateTransform;
use crate::core::trajectory::TrajectoryPoint;
use crate::types::{ClutterError, ClutterResult, GeoTransform, PixelWindow, Vec3};

/// Computes the terrain pixel window covering every facet grid of a trajectory
pub struct BoundingBoxCalculator;

impl BoundingBoxCalculator {
    /// Pixel window of the full raster containing all facet footprint outlines
    ///
    /// `raster_size` is (width, height) of the full terrain raster. The window is
    /// clipped to the raster and may collapse onto an edge when the trajectory lies
    /// outside the terrain.
    pub fn calculate<T: CoordinateTransform>(
        points: &[TrajectoryPoint],
        params: &FacetParams,
        to_terrain: &T,
        geo_transform: &GeoTransform,
        raster_size: (usize, usize),
    ) -> ClutterResult<PixelWindow> {
        let (width, height) = raster_size;
        if width == 0 || height == 0 {
            return Err(ClutterError::Processing("Terrain raster is empty".to_string()));
        }

        let outline = params.outline();
        let mut corners: Vec<Vec3> = Vec::with_capacity(points.len() * 9);
        for point in points {
            corners.extend(FacetGridGenerator::generate(point, &outline).footprints);
        }
        to_terrain.transform(&mut corners)?;

        let mut col_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut row_range = (f64::INFINITY, f64::NEG_INFINITY);
        for corner in &corners {
            let (col, row) = geo_transform.world_to_pixel(corner.x, corner.y).ok_or_else(|| {
                ClutterError::Processing("Terrain geotransform is not invertible".to_string())
            })?;
            col_range = (col_range.0.min(col), col_range.1.max(col));
            row_range = (row_range.0.min(row), row_range.1.max(row));
        }

        if !(col_range.0.is_finite() && col_range.1.is_finite() && row_range.0.is_finite() && row_range.1.is_finite()) {
            return Err(ClutterError::Processing(
                "Facet outline could not be located on the terrain raster".to_string(),
            ));
        }

        log::debug!(
            "Unclipped pixel bounds: cols [{:.1}, {:.1}], rows [{:.1}, {:.1}]",
            col_range.0, col_range.1, row_range.0, row_range.1
        );

        let clip = |v: f64, size: usize| -> usize { v.floor().clamp(0.0, (size - 1) as f64) as usize };
        let window = PixelWindow {
            col_min: clip(col_range.0, width),
            col_max: clip(col_range.1, width),
            row_min: clip(row_range.0, height),
            row_max: clip(row_range.1, height),
        };

        if col_range.1 < 0.0 || row_range.1 < 0.0 || col_range.0 >= width as f64 || row_range.0 >= height as f64 {
            log::warn!("Trajectory footprint lies outside the terrain raster, window degenerates to {:?}", window);
        } else {
            log::info!(
                "Terrain window: cols {}..={}, rows {}..={} ({}x{} pixels)",
                window.col_min, window.col_max, window.row_min, window.row_max,
                window.width(), window.height()
            );
        }

        Ok(window)
    }
}
