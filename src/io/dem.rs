use crate::core::terrain::TerrainWindow;
use crate::types::{ClutterError, ClutterResult, GeoTransform, PixelWindow};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// Digital Elevation Model source opened with GDAL
pub struct DemReader {
    dataset: Dataset,
    /// Full-raster geotransform
    pub geo_transform: GeoTransform,
    /// (width, height) in pixels
    pub raster_size: (usize, usize),
    pub nodata: Option<f64>,
    /// CRS of the raster as WKT
    pub crs_wkt: String,
}

impl DemReader {
    /// Open a DEM and read its spatial metadata
    pub fn open<P: AsRef<Path>>(dem_path: P) -> ClutterResult<Self> {
        log::info!("Opening DEM: {}", dem_path.as_ref().display());

        let dataset = Dataset::open(dem_path.as_ref())?;
        let geo_transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let raster_size = dataset.raster_size();
        let nodata = dataset.rasterband(1)?.no_data_value();
        let crs_wkt = dataset.spatial_ref()?.to_wkt()?;

        log::debug!("DEM size: {}x{}", raster_size.0, raster_size.1);
        log::debug!("DEM geotransform: {:?}", geo_transform);
        log::debug!("DEM no-data value: {:?}", nodata);

        Ok(Self {
            dataset,
            geo_transform,
            raster_size,
            nodata,
            crs_wkt,
        })
    }

    /// Read the elevation samples inside a pixel window
    pub fn read_window(&self, window: &PixelWindow) -> ClutterResult<TerrainWindow> {
        let (width, height) = self.raster_size;
        if window.col_max >= width || window.row_max >= height {
            return Err(ClutterError::Processing(format!(
                "Window {:?} exceeds DEM size {}x{}",
                window, width, height
            )));
        }

        let size = (window.width(), window.height());
        log::info!(
            "Reading DEM window at ({}, {}) of {}x{} pixels",
            window.col_min, window.row_min, size.0, size.1
        );

        let rasterband = self.dataset.rasterband(1)?;
        let band_data = rasterband.read_as::<f32>(
            (window.col_min as isize, window.row_min as isize),
            size,
            size,
            None,
        )?;

        let data = Array2::from_shape_vec((size.1, size.0), band_data.data)
            .map_err(|e| ClutterError::Processing(format!("Failed to reshape DEM data: {}", e)))?;

        TerrainWindow::new(
            data,
            self.geo_transform.shifted(window.col_min, window.row_min),
            self.nodata,
        )
    }
}
