use crate::core::assemble::FirstReturnRow;
use crate::types::ClutterResult;
use ndarray::Array2;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writers for the simulation output artifacts
pub struct OutputWriter;

impl OutputWriter {
    /// Write the trace matrix as flat little-endian f32, row-major (one sample row at a time)
    pub fn write_combined<P: AsRef<Path>>(path: P, combined: &Array2<f64>) -> ClutterResult<()> {
        log::info!(
            "Writing {}x{} trace matrix: {}",
            combined.nrows(),
            combined.ncols(),
            path.as_ref().display()
        );
        let file = std::fs::File::create(path.as_ref())?;
        Self::write_combined_to(BufWriter::new(file), combined)
    }

    pub fn write_combined_to<W: Write>(mut writer: W, combined: &Array2<f64>) -> ClutterResult<()> {
        // Logical iteration order is row-major regardless of memory layout
        for &value in combined.iter() {
            writer.write_all(&(value as f32).to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the first-return table as `lat,lon,elev,sample`
    ///
    /// Rows without a first return are written as `NaN` in every field, keeping the
    /// table numeric for loaders that expect one float row per trace.
    pub fn write_first_returns<P: AsRef<Path>>(path: P, rows: &[Option<FirstReturnRow>]) -> ClutterResult<()> {
        log::info!("Writing {} first-return rows: {}", rows.len(), path.as_ref().display());
        let file = std::fs::File::create(path.as_ref())?;
        Self::write_first_returns_to(file, rows)
    }

    pub fn write_first_returns_to<W: Write>(writer: W, rows: &[Option<FirstReturnRow>]) -> ClutterResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["lat", "lon", "elev", "sample"])?;

        for row in rows {
            match row {
                Some(r) => csv_writer.write_record([
                    format!("{:.6}", r.lat),
                    format!("{:.6}", r.lon),
                    format!("{:.3}", r.elev),
                    r.sample.to_string(),
                ])?,
                None => csv_writer.write_record(["NaN", "NaN", "NaN", "NaN"])?,
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}
