//! Coordinate frame conversions between the Cartesian working frame, the terrain
//! raster CRS and geographic output coordinates.

use crate::types::{ClutterError, ClutterResult, Vec3};
use gdal::spatial_ref::{CoordTransform, SpatialRef};

/// Earth-centered, Earth-fixed Cartesian frame used for all simulation geometry
pub const XYZ_SYSTEM: &str = "EPSG:4978";

/// Geographic frame used for first-return output (latitude, longitude, height)
pub const LLE_SYSTEM: &str = "EPSG:4326";

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// In-place transformation of 3-D coordinates from one frame into another
pub trait CoordinateTransform {
    fn transform(&self, points: &mut [Vec3]) -> ClutterResult<()>;
}

/// Shareable recipe for a transform; each worker builds its own instance.
pub trait TransformBuilder: Sync {
    type Transform: CoordinateTransform;

    fn build(&self) -> ClutterResult<Self::Transform>;
}

/// Forward and inverse conversions between the working frame and the terrain CRS
#[derive(Debug, Clone)]
pub struct FramePair<T> {
    pub to_terrain: T,
    pub to_xyz: T,
}

impl<B: TransformBuilder> FramePair<B> {
    pub fn build(&self) -> ClutterResult<FramePair<B::Transform>> {
        Ok(FramePair {
            to_terrain: self.to_terrain.build()?,
            to_xyz: self.to_xyz.build()?,
        })
    }
}

/// Axis ordering applied to a CRS before transforming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Easting/longitude first regardless of the CRS authority
    Traditional,
    /// Axis order as defined by the CRS authority (latitude first for EPSG:4326)
    Authority,
}

/// A CRS definition string (WKT, `EPSG:n`, PROJ string) plus its axis handling
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    pub definition: String,
    pub axis_order: AxisOrder,
}

impl CrsDefinition {
    pub fn traditional(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            axis_order: AxisOrder::Traditional,
        }
    }

    pub fn authority(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            axis_order: AxisOrder::Authority,
        }
    }

    fn spatial_ref(&self) -> ClutterResult<SpatialRef> {
        let srs = SpatialRef::from_definition(&self.definition).map_err(|e| {
            ClutterError::Transform(format!("Unable to parse CRS '{}': {}", self.definition, e))
        })?;
        if self.axis_order == AxisOrder::Traditional {
            srs.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        }
        Ok(srs)
    }
}

/// GDAL/PROJ backed transform between two CRS definitions
#[derive(Debug, Clone, PartialEq)]
pub struct GdalTransformBuilder {
    pub source: CrsDefinition,
    pub target: CrsDefinition,
}

impl GdalTransformBuilder {
    pub fn new(source: CrsDefinition, target: CrsDefinition) -> Self {
        Self { source, target }
    }

    /// Frame pair between the working frame and a terrain CRS given as WKT
    pub fn terrain_pair(xyz_system: &str, terrain_wkt: &str) -> FramePair<Self> {
        let xyz = CrsDefinition::traditional(xyz_system);
        let terrain = CrsDefinition::traditional(terrain_wkt);
        FramePair {
            to_terrain: Self::new(xyz.clone(), terrain.clone()),
            to_xyz: Self::new(terrain, xyz),
        }
    }
}

impl TransformBuilder for GdalTransformBuilder {
    type Transform = GdalTransform;

    fn build(&self) -> ClutterResult<GdalTransform> {
        let source = self.source.spatial_ref()?;
        let target = self.target.spatial_ref()?;
        let inner = CoordTransform::new(&source, &target)?;
        Ok(GdalTransform { inner })
    }
}

/// Worker-local GDAL transform (not shareable across threads)
pub struct GdalTransform {
    inner: CoordTransform,
}

impl CoordinateTransform for GdalTransform {
    fn transform(&self, points: &mut [Vec3]) -> ClutterResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let mut ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        let mut zs: Vec<f64> = points.iter().map(|p| p.z).collect();

        self.inner.transform_coords(&mut xs, &mut ys, &mut zs)?;

        for (i, p) in points.iter_mut().enumerate() {
            *p = Vec3::new(xs[i], ys[i], zs[i]);
        }
        Ok(())
    }
}

/// Direction of a native WGS84 conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeodeticDirection {
    /// ECEF meters to (lon, lat, h) or (lat, lon, h) in degrees/meters
    ToGeodetic,
    /// Geodetic degrees/meters to ECEF meters
    ToCartesian,
}

/// Native WGS84 ECEF <-> geodetic conversion, usable without a PROJ database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeodeticTransform {
    pub direction: GeodeticDirection,
    pub axis_order: AxisOrder,
}

impl GeodeticTransform {
    pub fn to_geodetic(axis_order: AxisOrder) -> Self {
        Self { direction: GeodeticDirection::ToGeodetic, axis_order }
    }

    pub fn to_cartesian(axis_order: AxisOrder) -> Self {
        Self { direction: GeodeticDirection::ToCartesian, axis_order }
    }

    /// Frame pair for a terrain raster in geographic lon/lat degrees
    pub fn terrain_pair() -> FramePair<Self> {
        FramePair {
            to_terrain: Self::to_geodetic(AxisOrder::Traditional),
            to_xyz: Self::to_cartesian(AxisOrder::Traditional),
        }
    }

    fn ordered(&self, lon: f64, lat: f64, h: f64) -> Vec3 {
        match self.axis_order {
            AxisOrder::Traditional => Vec3::new(lon, lat, h),
            AxisOrder::Authority => Vec3::new(lat, lon, h),
        }
    }

    fn unordered(&self, p: &Vec3) -> (f64, f64, f64) {
        match self.axis_order {
            AxisOrder::Traditional => (p.x, p.y, p.z),
            AxisOrder::Authority => (p.y, p.x, p.z),
        }
    }
}

/// Convert lat/lon/elevation to ECEF coordinates
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, height: f64) -> Vec3 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let n = WGS84_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    Vec3::new(
        (n + height) * lat.cos() * lon.cos(),
        (n + height) * lat.cos() * lon.sin(),
        (n * (1.0 - e2) + height) * lat.sin(),
    )
}

/// Unit ellipsoid normal (geodetic up) through an ECEF point
pub fn geodetic_up(p: &Vec3) -> Vec3 {
    let (lat, lon, _) = ecef_to_geodetic(p);
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

/// Convert ECEF coordinates to (lat, lon, height) using Bowring's method
pub fn ecef_to_geodetic(p: &Vec3) -> (f64, f64, f64) {
    let a = WGS84_A;
    let b = a * (1.0 - WGS84_F);
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = (a * a - b * b) / (b * b);

    let rho = (p.x * p.x + p.y * p.y).sqrt();
    let lon = p.y.atan2(p.x);
    let theta = (p.z * a).atan2(rho * b);
    let lat = (p.z + ep2 * b * theta.sin().powi(3)).atan2(rho - e2 * a * theta.cos().powi(3));

    let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    let height = if lat.cos().abs() > 1e-10 {
        rho / lat.cos() - n
    } else {
        p.z.abs() - b
    };

    (lat.to_degrees(), lon.to_degrees(), height)
}

impl CoordinateTransform for GeodeticTransform {
    fn transform(&self, points: &mut [Vec3]) -> ClutterResult<()> {
        for p in points.iter_mut() {
            *p = match self.direction {
                GeodeticDirection::ToGeodetic => {
                    let (lat, lon, h) = ecef_to_geodetic(p);
                    self.ordered(lon, lat, h)
                }
                GeodeticDirection::ToCartesian => {
                    let (lon, lat, h) = self.unordered(p);
                    geodetic_to_ecef(lat, lon, h)
                }
            };
        }
        Ok(())
    }
}

impl TransformBuilder for GeodeticTransform {
    type Transform = GeodeticTransform;

    fn build(&self) -> ClutterResult<GeodeticTransform> {
        Ok(*self)
    }
}
