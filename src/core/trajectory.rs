use crate::types::{ClutterError, ClutterResult, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw trajectory row in the Cartesian working frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Reference delay offset in seconds
    pub datum: f64,
}

impl NavRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Bit pattern key for exact row equality (+0.0 and -0.0 compare equal)
    fn key(&self) -> [u64; 4] {
        [
            (self.x + 0.0).to_bits(),
            (self.y + 0.0).to_bits(),
            (self.z + 0.0).to_bits(),
            (self.datum + 0.0).to_bits(),
        ]
    }
}

/// Instrument position with its local along-track/cross-track frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    pub position: Vec3,
    /// Unit along-track vector
    pub uv: Vec3,
    /// Unit cross-track vector (right of travel)
    pub ul: Vec3,
    pub datum: f64,
}

impl TrajectoryPoint {
    /// Unit vector from the position toward the frame origin
    pub fn nadir(&self) -> Vec3 {
        -self.position.normalize()
    }
}

/// Mapping from original trajectory rows to deduplicated representatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIndex {
    inverse: Vec<usize>,
    unique_count: usize,
}

impl DuplicateIndex {
    /// Number of original rows
    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    pub fn unique_count(&self) -> usize {
        self.unique_count
    }

    /// Representative index of every original row
    pub fn as_slice(&self) -> &[usize] {
        &self.inverse
    }
}

/// Deduplicated trajectory with per-point frames
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub points: Vec<TrajectoryPoint>,
    pub index: DuplicateIndex,
}

/// Builds per-point local frames from raw trajectory rows
pub struct TrajectoryPreprocessor;

impl TrajectoryPreprocessor {
    /// Deduplicate rows and derive the along-track/cross-track frame of each unique point
    pub fn prepare(rows: &[NavRecord]) -> ClutterResult<Trajectory> {
        if rows.is_empty() {
            return Err(ClutterError::Navigation(
                "Trajectory contains no rows".to_string(),
            ));
        }

        let (unique, index) = Self::deduplicate(rows);
        log::info!(
            "Trajectory: {} rows, {} unique positions",
            index.len(),
            index.unique_count()
        );

        let positions: Vec<Vec3> = unique.iter().map(NavRecord::position).collect();
        if let Some(bad) = positions.iter().position(|p| !p.iter().all(|v| v.is_finite()) || p.norm() == 0.0) {
            return Err(ClutterError::Navigation(format!(
                "Trajectory position {} is not a finite, non-origin point",
                bad
            )));
        }

        let along = Self::along_track_vectors(&positions);
        let points = unique
            .iter()
            .zip(positions.iter().zip(along))
            .map(|(rec, (pos, uv))| {
                let c = -pos.normalize();
                let ul = c.cross(&uv).normalize();
                TrajectoryPoint {
                    position: *pos,
                    uv,
                    ul,
                    datum: rec.datum,
                }
            })
            .collect();

        Ok(Trajectory { points, index })
    }

    /// Remove exact duplicate rows, keeping first-occurrence order
    pub fn deduplicate(rows: &[NavRecord]) -> (Vec<NavRecord>, DuplicateIndex) {
        let mut seen: HashMap<[u64; 4], usize> = HashMap::with_capacity(rows.len());
        let mut unique = Vec::new();
        let mut inverse = Vec::with_capacity(rows.len());

        for row in rows {
            let idx = *seen.entry(row.key()).or_insert_with(|| {
                unique.push(*row);
                unique.len() - 1
            });
            inverse.push(idx);
        }

        let unique_count = unique.len();
        (unique, DuplicateIndex { inverse, unique_count })
    }

    /// Central-difference gradient with one-sided differences at both ends
    pub fn gradient(positions: &[Vec3]) -> Vec<Vec3> {
        let n = positions.len();
        if n < 2 {
            return vec![Vec3::zeros(); n];
        }

        (0..n)
            .map(|i| {
                if i == 0 {
                    positions[1] - positions[0]
                } else if i == n - 1 {
                    positions[n - 1] - positions[n - 2]
                } else {
                    (positions[i + 1] - positions[i - 1]) / 2.0
                }
            })
            .collect()
    }

    /// Unit along-track vectors, restricted to each point's local horizontal plane
    ///
    /// Points whose horizontal velocity vanishes reuse the nearest preceding valid
    /// direction, or the nearest following one at the start of the track. A track
    /// with no usable motion at all falls back to local north.
    fn along_track_vectors(positions: &[Vec3]) -> Vec<Vec3> {
        let velocity = Self::gradient(positions);
        let horizontal: Vec<Option<Vec3>> = positions
            .iter()
            .zip(velocity.iter())
            .map(|(p, v)| Self::horizontal_unit(p, v))
            .collect();

        let first_valid = horizontal.iter().position(Option::is_some);
        let mut last: Option<Vec3> = first_valid.and_then(|i| horizontal[i]);

        positions
            .iter()
            .zip(horizontal.iter())
            .enumerate()
            .map(|(i, (p, h))| match h {
                Some(uv) => {
                    last = Some(*uv);
                    *uv
                }
                None => {
                    log::warn!("Zero along-track velocity at unique point {}, reusing neighbor frame", i);
                    last.and_then(|uv| Self::horizontal_unit(p, &uv))
                        .unwrap_or_else(|| Self::reference_direction(p))
                }
            })
            .collect()
    }

    /// Remove the vertical component of `v` at `p` and normalize
    fn horizontal_unit(p: &Vec3, v: &Vec3) -> Option<Vec3> {
        let c = -p.normalize();
        let h = v - c * c.dot(v);
        let mag = h.norm();
        if mag > f64::EPSILON * v.norm().max(1.0) && mag.is_finite() {
            Some(h / mag)
        } else {
            None
        }
    }

    /// Local north, or the x axis when standing on a pole
    fn reference_direction(p: &Vec3) -> Vec3 {
        Self::horizontal_unit(p, &Vec3::z())
            .or_else(|| Self::horizontal_unit(p, &Vec3::x()))
            .unwrap_or_else(Vec3::x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const R: f64 = 6_371_000.0;

    fn row(x: f64, y: f64, z: f64, datum: f64) -> NavRecord {
        NavRecord { x, y, z, datum }
    }

    fn assert_orthonormal(p: &TrajectoryPoint) {
        let c = p.nadir();
        assert_relative_eq!(p.uv.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.ul.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.uv.dot(&p.ul), 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.uv.dot(&c), 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.ul.dot(&c), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let rows = vec![
            row(R, 0.0, 0.0, 0.0),
            row(R, 10.0, 0.0, 0.0),
            row(R, 0.0, 0.0, 0.0),
            row(R, 10.0, 0.0, 1e-6),
            row(R, 10.0, 0.0, 0.0),
        ];
        let (unique, index) = TrajectoryPreprocessor::deduplicate(&rows);

        assert_eq!(unique.len(), 3);
        assert_eq!(index.as_slice(), &[0, 1, 0, 2, 1]);
        assert_eq!(index.unique_count(), 3);
    }

    #[test]
    fn test_signed_zero_rows_are_duplicates() {
        let rows = vec![row(R, 0.0, 0.0, 0.0), row(R, -0.0, 0.0, -0.0)];
        let (unique, _) = TrajectoryPreprocessor::deduplicate(&rows);
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn test_gradient_matches_central_difference() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(9.0, 0.0, 0.0),
        ];
        let g = TrajectoryPreprocessor::gradient(&pts);
        let gx: Vec<f64> = g.iter().map(|v| v.x).collect();
        assert_eq!(gx, vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_frame_for_eastward_track() {
        let rows: Vec<NavRecord> = (0..5).map(|i| row(R + 3000.0, i as f64 * 100.0, 0.0, 0.0)).collect();
        let traj = TrajectoryPreprocessor::prepare(&rows).unwrap();

        for p in &traj.points {
            assert_orthonormal(p);
            // Traveling +y at the equator: right-hand side is -z (south)
            assert!(p.uv.y > 0.99);
            assert!(p.ul.z < -0.99);
        }
    }

    #[test]
    fn test_climbing_track_is_flattened() {
        let rows: Vec<NavRecord> = (0..3)
            .map(|i| row(R + i as f64 * 50.0, i as f64 * 100.0, 0.0, 0.0))
            .collect();
        let traj = TrajectoryPreprocessor::prepare(&rows).unwrap();
        for p in &traj.points {
            assert_orthonormal(p);
        }
    }

    #[test]
    fn test_stationary_point_reuses_previous_frame() {
        // Repeated position with a different datum survives deduplication
        let rows = vec![
            row(R, 0.0, 0.0, 0.0),
            row(R, 100.0, 0.0, 0.0),
            row(R, 100.0, 0.0, 1e-6),
        ];
        let traj = TrajectoryPreprocessor::prepare(&rows).unwrap();
        assert_eq!(traj.points.len(), 3);
        for p in &traj.points {
            assert_orthonormal(p);
            assert!(p.uv.iter().all(|v| v.is_finite()));
        }
        assert_relative_eq!((traj.points[2].uv - traj.points[1].uv).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_gets_reference_frame() {
        let traj = TrajectoryPreprocessor::prepare(&[row(R, 0.0, 0.0, 0.0)]).unwrap();
        let p = &traj.points[0];
        assert_orthonormal(p);
        assert_relative_eq!(p.uv.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_trajectory_is_error() {
        assert!(TrajectoryPreprocessor::prepare(&[]).is_err());
    }
}
