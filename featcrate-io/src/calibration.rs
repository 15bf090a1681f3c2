//! Calibration transform files
//!
//! A calibration file is four non-blank lines of four comma-separated
//! numbers, the rows of a homogeneous 4x4 matrix.

use crate::error::{IoError, IoResult};
use featcrate_core::Transform3D;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read the calibration transform stored at `path`
pub fn read_calibration<P: AsRef<Path>>(path: P) -> IoResult<Transform3D> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(e, path))?;
    parse_calibration(BufReader::new(file))
}

/// Parse a calibration matrix from any line source.
///
/// The matrix is taken as-is; nothing checks that it is a rigid transform.
pub fn parse_calibration<R: BufRead>(reader: R) -> IoResult<Transform3D> {
    let mut values = [0.0f32; 16];
    let mut rows = 0usize;
    let mut line_number = 0usize;

    for line in reader.lines() {
        line_number += 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if rows == 4 {
            return Err(IoError::parse(line_number, "calibration has more than 4 rows"));
        }

        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(IoError::parse(
                line_number,
                format!("expected 4 comma-separated values, found {}", fields.len()),
            ));
        }
        for (col, field) in fields.iter().enumerate() {
            values[rows * 4 + col] = field
                .parse()
                .map_err(|_| IoError::parse(line_number, format!("invalid matrix value '{}'", field)))?;
        }
        rows += 1;
    }

    if rows != 4 {
        return Err(IoError::parse(
            line_number + 1,
            format!("expected 4 rows, found {}", rows),
        ));
    }

    Ok(Transform3D::from_row_major(&values))
}
