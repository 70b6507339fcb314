use crate::core::trajectory::TrajectoryPoint;
use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// Facet grid extent and spacing (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetParams {
    /// Along-track half extent
    #[serde(rename = "atdist")]
    pub at_dist: f64,
    /// Cross-track half extent
    #[serde(rename = "ctdist")]
    pub ct_dist: f64,
    #[serde(rename = "atstep")]
    pub at_step: f64,
    #[serde(rename = "ctstep")]
    pub ct_step: f64,
}

impl FacetParams {
    /// Coarse parameters whose grid is only the 3x3 outline of the full footprint
    pub fn outline(&self) -> Self {
        Self {
            at_step: self.at_dist,
            ct_step: self.ct_dist,
            ..*self
        }
    }

    /// Number of steps on each side of the center, along-track
    pub fn at_count(&self) -> i64 {
        steps_within(self.at_dist, self.at_step)
    }

    /// Number of steps on each side of the center, cross-track
    pub fn ct_count(&self) -> i64 {
        steps_within(self.ct_dist, self.ct_step)
    }
}

/// Largest `k` with `k * step <= dist`, tolerant of rounding in exact multiples
fn steps_within(dist: f64, step: f64) -> i64 {
    (dist / step + 1e-9).floor().max(0.0) as i64
}

/// Facet footprints for one trajectory point, at instrument altitude
///
/// Footprints are stored along-track major: index `(m + M) * (2N + 1) + (n + N)`.
#[derive(Debug, Clone)]
pub struct FacetGrid {
    pub at_count: i64,
    pub ct_count: i64,
    pub footprints: Vec<Vec3>,
}

impl FacetGrid {
    /// Grid dimensions (along-track, cross-track)
    pub fn dim(&self) -> (usize, usize) {
        ((2 * self.at_count + 1) as usize, (2 * self.ct_count + 1) as usize)
    }
}

/// Generates facet footprint positions around a trajectory point
pub struct FacetGridGenerator;

impl FacetGridGenerator {
    /// `position + m*atstep*uv + n*ctstep*ul` for all `|m*atstep| <= atdist`, `|n*ctstep| <= ctdist`
    pub fn generate(point: &TrajectoryPoint, params: &FacetParams) -> FacetGrid {
        let at_count = params.at_count();
        let ct_count = params.ct_count();
        let capacity = ((2 * at_count + 1) * (2 * ct_count + 1)) as usize;

        let mut footprints = Vec::with_capacity(capacity);
        for m in -at_count..=at_count {
            let along = point.uv * (m as f64 * params.at_step);
            for n in -ct_count..=ct_count {
                footprints.push(point.position + along + point.ul * (n as f64 * params.ct_step));
            }
        }

        FacetGrid { at_count, ct_count, footprints }
    }
}
