use crate::types::{ClutterError, ClutterResult, GeoTransform};
use ndarray::Array2;

/// Elevation sub-raster loaded for the simulation extent
#[derive(Debug, Clone)]
pub struct TerrainWindow {
    /// Elevation samples, (rows, cols)
    pub data: Array2<f32>,
    /// Pixel-to-world transform of `data` (already shifted to the window origin)
    pub geo_transform: GeoTransform,
    /// No-data sentinel of the source raster
    pub nodata: Option<f64>,
}

impl TerrainWindow {
    pub fn new(data: Array2<f32>, geo_transform: GeoTransform, nodata: Option<f64>) -> ClutterResult<Self> {
        if geo_transform.world_to_pixel(0.0, 0.0).is_none() {
            return Err(ClutterError::Processing(format!(
                "Terrain geotransform is not invertible: {:?}",
                geo_transform.to_gdal()
            )));
        }
        Ok(Self { data, geo_transform, nodata })
    }

    /// Window pixel (col, row) containing a world coordinate, if inside the window
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.geo_transform.world_to_pixel(x, y)?;
        let (col, row) = (col.floor(), row.floor());
        let (rows, cols) = self.data.dim();

        if !(col >= 0.0 && row >= 0.0 && col < cols as f64 && row < rows as f64) {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Elevation at a world coordinate in the terrain CRS
    ///
    /// `None` outside the window, on the no-data sentinel, or on NaN samples.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let (col, row) = self.pixel_of(x, y)?;
        let value = self.data[[row, col]] as f64;

        if value.is_nan() {
            return None;
        }
        if let Some(nodata) = self.nodata {
            if value == nodata || value == nodata as f32 as f64 {
                return None;
            }
        }
        Some(value)
    }
}
