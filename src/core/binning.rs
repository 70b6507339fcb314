use crate::core::scatter::Facet;
use crate::types::{ClutterError, ClutterResult, Vec3};
use ndarray::{Array1, ArrayViewMut1};

/// Delay-domain sampling of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    /// Sample interval (seconds)
    pub dt: f64,
    /// Samples per trace
    pub trace_samples: usize,
}

/// Binned trace and first return of one unique trajectory point
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedTrace {
    pub trace: Array1<f64>,
    /// Facet with the earliest unwrapped delay, if any facet survived
    pub first_return: Option<Vec3>,
}

impl BinnedTrace {
    /// All-zero trace for a point without surviving facets
    pub fn empty(trace_samples: usize) -> Self {
        Self {
            trace: Array1::zeros(trace_samples),
            first_return: None,
        }
    }

    /// Copy the trace into one column of the output matrix
    pub fn write_column(&self, mut column: ArrayViewMut1<f64>) -> ClutterResult<()> {
        if column.len() != self.trace.len() {
            return Err(ClutterError::Processing(format!(
                "Trace length {} does not match output column length {}",
                self.trace.len(),
                column.len()
            )));
        }
        column.assign(&self.trace);
        Ok(())
    }
}

/// Converts facet returns into a discretized power trace
pub struct TraceBinner {
    params: TraceParams,
}

impl TraceBinner {
    pub fn new(params: TraceParams) -> Self {
        Self { params }
    }

    /// Unwrapped sample index of a delay relative to the datum
    pub fn bin_index(&self, delay: f64) -> i64 {
        (delay / self.params.dt).floor() as i64
    }

    /// Weighted histogram of facet powers over wrapped delay bins
    ///
    /// Facets landing at or past the end of the trace lose their power before the
    /// remaining indices wrap modulo the trace length, so late returns never alias
    /// into early bins while early (negative) returns do.
    pub fn bin(&self, facets: &[Facet], datum: f64) -> BinnedTrace {
        let samples = self.params.trace_samples;
        if facets.is_empty() {
            return BinnedTrace::empty(samples);
        }

        let delays: Vec<f64> = facets.iter().map(|f| f.twtt - datum).collect();
        let mut bins: Vec<i64> = delays.iter().map(|&d| self.bin_index(d)).collect();
        let mut power: Vec<f64> = facets.iter().map(|f| f.power).collect();

        for (p, &b) in power.iter_mut().zip(bins.iter()) {
            if b >= samples as i64 {
                *p = 0.0;
            }
        }

        for b in bins.iter_mut() {
            *b = b.rem_euclid(samples as i64);
        }

        let mut trace = Array1::<f64>::zeros(samples);
        for (&b, &p) in bins.iter().zip(power.iter()) {
            trace[b as usize] += p;
        }

        let mut earliest = 0;
        for (i, &d) in delays.iter().enumerate() {
            if d < delays[earliest] {
                earliest = i;
            }
        }

        BinnedTrace {
            trace,
            first_return: Some(facets[earliest].position),
        }
    }
}
