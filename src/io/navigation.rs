use crate::core::frames::CoordinateTransform;
use crate::core::trajectory::NavRecord;
use crate::types::{ClutterError, ClutterResult, Vec3};
use std::io::Read;
use std::path::Path;

/// Columns every trajectory file must provide
pub const REQUIRED_FIELDS: [&str; 4] = ["x", "y", "z", "datum"];

/// Trajectory table reader
pub struct NavReader;

impl NavReader {
    /// Read trajectory rows from a comma-delimited file with a header line
    pub fn read<P: AsRef<Path>>(path: P) -> ClutterResult<Vec<NavRecord>> {
        log::info!("Reading navigation file: {}", path.as_ref().display());
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> ClutterResult<Vec<NavRecord>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let found: Vec<&str> = headers.iter().collect();
        if REQUIRED_FIELDS.iter().any(|r| !found.contains(r)) {
            return Err(ClutterError::Navigation(format!(
                "Missing necessary field in navigation file.\n\tRequired fields: {:?}\n\tFound fields: {:?}",
                REQUIRED_FIELDS, found
            )));
        }

        let mut records = Vec::new();
        for res in csv_reader.deserialize() {
            let record: NavRecord = res?;
            records.push(record);
        }

        log::debug!("Read {} navigation rows", records.len());
        Ok(records)
    }

    /// Transform row positions from the navigation CRS into the working frame
    pub fn to_working_frame<T: CoordinateTransform>(
        records: &mut [NavRecord],
        transform: &T,
    ) -> ClutterResult<()> {
        let mut positions: Vec<Vec3> = records.iter().map(NavRecord::position).collect();
        transform.transform(&mut positions)?;

        for (record, p) in records.iter_mut().zip(positions) {
            record.x = p.x;
            record.y = p.y;
            record.z = p.z;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{geodetic_to_ecef, AxisOrder, GeodeticTransform};
    use approx::assert_relative_eq;

    #[test]
    fn test_read_with_extra_columns() {
        let text = "trace, x, y, z, datum, note\n1, 10.5, 20.0, 300.0, 0.0, a\n2, 11.0, 20.0, 300.0, 1e-6, b\n";
        let records = NavReader::from_reader(text.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1], NavRecord { x: 11.0, y: 20.0, z: 300.0, datum: 1e-6 });
    }

    #[test]
    fn test_missing_column() {
        let text = "x,y,z\n1,2,3\n";
        let err = NavReader::from_reader(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Missing necessary field"));
    }

    #[test]
    fn test_bad_value() {
        let text = "x,y,z,datum\n1,2,abc,0\n";
        assert!(matches!(NavReader::from_reader(text.as_bytes()), Err(ClutterError::Csv(_))));
    }

    #[test]
    fn test_transform_to_working_frame() {
        let mut records = vec![NavRecord { x: 12.0, y: 45.0, z: 2000.0, datum: 3e-6 }];
        NavReader::to_working_frame(&mut records, &GeodeticTransform::to_cartesian(AxisOrder::Traditional)).unwrap();

        let expected = geodetic_to_ecef(45.0, 12.0, 2000.0);
        assert_relative_eq!(records[0].x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(records[0].z, expected.z, epsilon = 1e-6);
        assert_eq!(records[0].datum, 3e-6);
    }
}
