//! Per-facet radar return computation
//!
//! Each facet footprint of a trajectory point is dropped onto the terrain surface
//! along the local vertical, given a surface normal from its grid neighbours, and
//! assigned a backscattered power and two-way travel time.

use crate::core::facet_grid::{FacetGrid, FacetGridGenerator, FacetParams};
use crate::core::frames::{geodetic_up, CoordinateTransform, FramePair};
use crate::core::terrain::TerrainWindow;
use crate::core::trajectory::TrajectoryPoint;
use crate::types::Vec3;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Scattering law coefficients
///
/// `power = gain * cos(theta)^cos_exponent / range^range_exponent` for facets
/// facing the instrument, zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatteringLaw {
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(rename = "cosexponent", default = "default_cos_exponent")]
    pub cos_exponent: f64,
    #[serde(rename = "rangeexponent", default = "default_range_exponent")]
    pub range_exponent: f64,
}

fn default_gain() -> f64 {
    1.0
}

fn default_cos_exponent() -> f64 {
    1.0
}

fn default_range_exponent() -> f64 {
    4.0
}

impl Default for ScatteringLaw {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            cos_exponent: default_cos_exponent(),
            range_exponent: default_range_exponent(),
        }
    }
}

impl ScatteringLaw {
    /// Backscattered power for an incidence angle (radians) at a given range (meters)
    pub fn power(&self, incidence: f64, range: f64) -> f64 {
        let cos_theta = incidence.cos();
        if cos_theta <= 0.0 || range <= 0.0 {
            return 0.0;
        }
        self.gain * cos_theta.powf(self.cos_exponent) / range.powf(self.range_exponent)
    }
}

/// Simulation constants shared by all trajectory points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub facet: FacetParams,
    pub scattering: ScatteringLaw,
    /// Propagation speed (m/s)
    pub speed_light: f64,
}

/// One terrain facet with its radar return
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    /// Along-track step offset
    pub at_index: i64,
    /// Cross-track step offset
    pub ct_index: i64,
    /// Position on the terrain surface, working frame
    pub position: Vec3,
    /// Angle between the surface normal and the line of sight (radians)
    pub incidence: f64,
    pub power: f64,
    /// Two-way travel time (seconds)
    pub twtt: f64,
}

/// Computes facet returns for single trajectory points
pub struct ClutterSimulator<'a> {
    terrain: &'a TerrainWindow,
    params: SimulationParams,
}

impl<'a> ClutterSimulator<'a> {
    pub fn new(terrain: &'a TerrainWindow, params: SimulationParams) -> Self {
        Self { terrain, params }
    }

    /// Surviving facets of one trajectory point, in grid order
    ///
    /// An empty vector means every footprint fell outside the terrain window, on
    /// no-data, or could not be transformed.
    pub fn simulate<T: CoordinateTransform>(&self, point: &TrajectoryPoint, frame: &FramePair<T>) -> Vec<Facet> {
        let grid = FacetGridGenerator::generate(point, &self.params.facet);
        let surface = self.drape(&grid, frame);

        let mut facets = Vec::new();
        for ((a, c), position) in surface.indexed_iter() {
            let Some(position) = position else { continue };

            let normal = Self::surface_normal(&surface, a, c).unwrap_or_else(|| geodetic_up(position));
            let line_of_sight = point.position - position;
            let range = line_of_sight.norm();
            let incidence = if range > 0.0 {
                (normal.dot(&line_of_sight) / range).clamp(-1.0, 1.0).acos()
            } else {
                0.0
            };

            facets.push(Facet {
                at_index: a as i64 - grid.at_count,
                ct_index: c as i64 - grid.ct_count,
                position: *position,
                incidence,
                power: self.params.scattering.power(incidence, range),
                twtt: 2.0 * range / self.params.speed_light,
            });
        }

        log::debug!(
            "Point at {:?}: {} of {} facets on terrain",
            point.position.as_slice(),
            facets.len(),
            grid.footprints.len()
        );
        facets
    }

    /// Drop footprints onto the terrain surface
    ///
    /// Returns the surface position of each footprint in grid layout, `None` where
    /// the terrain has no valid elevation or the footprint cannot be transformed.
    pub fn drape<T: CoordinateTransform>(&self, grid: &FacetGrid, frame: &FramePair<T>) -> Array2<Option<Vec3>> {
        let mut valid = Vec::with_capacity(grid.footprints.len());
        let mut on_terrain = Vec::with_capacity(grid.footprints.len());
        for (flat, p) in locate(&frame.to_terrain, &grid.footprints).into_iter().enumerate() {
            let Some(p) = p else { continue };
            if let Some(elevation) = self.terrain.elevation_at(p.x, p.y) {
                valid.push(flat);
                on_terrain.push(Vec3::new(p.x, p.y, elevation));
            }
        }

        let mut surface = Array2::<Option<Vec3>>::from_elem(grid.dim(), None);
        let cols = grid.dim().1;
        for (flat, position) in valid.into_iter().zip(locate(&frame.to_xyz, &on_terrain)) {
            surface[[flat / cols, flat % cols]] = position;
        }
        surface
    }

    /// Upward unit normal from finite differences over neighbouring facets
    ///
    /// Central differences where both neighbours exist, one-sided otherwise;
    /// `None` when either tangent cannot be formed.
    pub fn surface_normal(surface: &Array2<Option<Vec3>>, a: usize, c: usize) -> Option<Vec3> {
        let center = surface[[a, c]]?;
        let (rows, cols) = surface.dim();

        let at = |i: usize| surface[[i, c]];
        let ct = |j: usize| surface[[a, j]];

        let along = Self::tangent(center, (a > 0).then(|| at(a - 1)).flatten(), (a + 1 < rows).then(|| at(a + 1)).flatten())?;
        let across = Self::tangent(center, (c > 0).then(|| ct(c - 1)).flatten(), (c + 1 < cols).then(|| ct(c + 1)).flatten())?;

        let normal = along.cross(&across);
        let magnitude = normal.norm();
        if !(magnitude > 0.0) {
            return None;
        }

        let normal = normal / magnitude;
        if normal.dot(&center) < 0.0 {
            Some(-normal)
        } else {
            Some(normal)
        }
    }

    fn tangent(center: Vec3, prev: Option<Vec3>, next: Option<Vec3>) -> Option<Vec3> {
        match (prev, next) {
            (Some(p), Some(n)) => Some((n - p) / 2.0),
            (None, Some(n)) => Some(n - center),
            (Some(p), None) => Some(center - p),
            (None, None) => None,
        }
    }
}

/// Transform a batch of points, `None` for each point that cannot be converted
///
/// A failed batch is retried point by point so one bad coordinate only drops itself.
fn locate<T: CoordinateTransform>(transform: &T, points: &[Vec3]) -> Vec<Option<Vec3>> {
    let finite = |p: Vec3| p.iter().all(|v| v.is_finite()).then_some(p);

    let mut batch = points.to_vec();
    match transform.transform(&mut batch) {
        Ok(()) => batch.into_iter().map(finite).collect(),
        Err(e) => {
            log::warn!("Transform of {} footprints failed ({}), retrying one at a time", points.len(), e);
            points
                .iter()
                .map(|p| {
                    let mut one = [*p];
                    transform.transform(&mut one).ok().and_then(|_| finite(one[0]))
                })
                .collect()
        }
    }
}
