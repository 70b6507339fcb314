use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Cartesian position or direction in the Earth-centered working frame (meters)
pub type Vec3 = Vector3<f64>;

/// Geospatial transformation parameters (GDAL affine ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from the six coefficients returned by `Dataset::geo_transform`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Pixel (col, row) to world (x, y)
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// World (x, y) to fractional pixel (col, row)
    ///
    /// Returns `None` when the affine part is singular.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (-self.rotation_y * dx + self.pixel_width * dy) / det;
        Some((col, row))
    }

    /// Geotransform of a sub-window whose upper-left pixel is (col_off, row_off)
    pub fn shifted(&self, col_off: usize, row_off: usize) -> Self {
        let (x, y) = self.pixel_to_world(col_off as f64, row_off as f64);
        Self {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }
}

/// Inclusive pixel window into a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_min: usize,
    pub col_max: usize,
    pub row_min: usize,
    pub row_max: usize,
}

impl PixelWindow {
    pub fn width(&self) -> usize {
        self.col_max - self.col_min + 1
    }

    pub fn height(&self) -> usize {
        self.row_max - self.row_min + 1
    }

    /// Whether a raster pixel (in full-raster coordinates) lies inside the window
    pub fn contains(&self, col: i64, row: i64) -> bool {
        col >= self.col_min as i64
            && col <= self.col_max as i64
            && row >= self.row_min as i64
            && row <= self.row_max as i64
    }
}

/// Error types for clutter simulation
#[derive(Debug, thiserror::Error)]
pub enum ClutterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Coordinate transform error: {0}")]
    Transform(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for clutter simulation
pub type ClutterResult<T> = Result<T, ClutterError>;
