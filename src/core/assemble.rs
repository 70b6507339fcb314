use crate::core::binning::BinnedTrace;
use crate::core::frames::CoordinateTransform;
use crate::core::trajectory::{DuplicateIndex, NavRecord};
use crate::types::{ClutterError, ClutterResult, Vec3};
use ndarray::{Array2, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Geolocated first return of one original trajectory row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstReturnRow {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
    /// Sample index derived from the straight-line range to the first return
    pub sample: i64,
}

/// Final products in original trajectory row order
#[derive(Debug, Clone)]
pub struct OutputProduct {
    /// Trace matrix, (trace_samples, rows)
    pub combined: Array2<f64>,
    /// First-return position per row in the working frame
    pub first_returns: Vec<Option<Vec3>>,
}

impl OutputProduct {
    /// Zeroed output buffers for `rows` original trajectory rows
    pub fn new(trace_samples: usize, rows: usize) -> Self {
        Self {
            combined: Array2::zeros((trace_samples, rows)),
            first_returns: vec![None; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.first_returns.len()
    }
}

/// Puts per-point results back into original row order and geolocates them
pub struct OutputAssembler;

impl OutputAssembler {
    /// Broadcast each representative's trace and first return to all of its rows
    ///
    /// Every output column is written exactly once, by the worker owning that row.
    pub fn scatter(
        results: &[BinnedTrace],
        index: &DuplicateIndex,
        trace_samples: usize,
    ) -> ClutterResult<OutputProduct> {
        if results.len() != index.unique_count() {
            return Err(ClutterError::Processing(format!(
                "{} traces for {} unique trajectory points",
                results.len(),
                index.unique_count()
            )));
        }

        let mut product = OutputProduct::new(trace_samples, index.len());
        let representatives = index.as_slice();

        #[cfg(feature = "parallel")]
        {
            product
                .combined
                .axis_iter_mut(Axis(1))
                .into_par_iter()
                .zip(representatives.par_iter())
                .try_for_each(|(column, &unique)| results[unique].write_column(column))?;
        }

        #[cfg(not(feature = "parallel"))]
        {
            product
                .combined
                .axis_iter_mut(Axis(1))
                .zip(representatives.iter())
                .try_for_each(|(column, &unique)| results[unique].write_column(column))?;
        }

        for (row, &unique) in representatives.iter().enumerate() {
            product.first_returns[row] = results[unique].first_return;
        }

        Ok(product)
    }

    /// Geographic first-return table with the range-derived sample column
    ///
    /// `to_geographic` must yield (lat, lon, elevation). The sample index uses the
    /// original (not deduplicated) trajectory row and is floored without wrapping;
    /// it intentionally does not reuse the trace bin.
    pub fn first_return_table<T: CoordinateTransform>(
        product: &OutputProduct,
        nav: &[NavRecord],
        to_geographic: &T,
        speed_light: f64,
        dt: f64,
    ) -> ClutterResult<Vec<Option<FirstReturnRow>>> {
        if nav.len() != product.rows() {
            return Err(ClutterError::Processing(format!(
                "{} trajectory rows for {} output rows",
                nav.len(),
                product.rows()
            )));
        }

        let rows: Vec<usize> = (0..product.rows()).filter(|&r| product.first_returns[r].is_some()).collect();
        let mut geographic: Vec<Vec3> = rows.iter().filter_map(|&r| product.first_returns[r]).collect();
        to_geographic.transform(&mut geographic)?;

        let mut table = vec![None; product.rows()];
        for (&row, lle) in rows.iter().zip(geographic) {
            let Some(fret) = product.first_returns[row] else { continue };
            let record = &nav[row];
            let range = (record.position() - fret).norm();
            let sample = (((2.0 * range / speed_light) - record.datum) / dt).floor() as i64;

            table[row] = Some(FirstReturnRow {
                lat: lle.x,
                lon: lle.y,
                elev: lle.z,
                sample,
            });
        }

        Ok(table)
    }
}
