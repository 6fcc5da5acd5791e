//! Plain text report of a calibration result.

use crate::calibration::CalibrationResult;
use crate::io::IoError;
use nalgebra::storage::RawStorage;
use nalgebra::{Dim, Matrix};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

/// Rows of right-aligned values with four decimals, one row per line.
fn format_matrix<R: Dim, C: Dim, S: RawStorage<f64, R, C>>(matrix: &Matrix<f64, R, C, S>) -> String {
    (0..matrix.nrows())
        .map(|i| {
            (0..matrix.ncols())
                .map(|j| format!("{:>10.4}", matrix[(i, j)]))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_intrinsics(out: &mut String, result: &CalibrationResult) -> fmt::Result {
    let d = result.distortion_coefficients();
    writeln!(out, "Intrinsic Matrix")?;
    writeln!(out, "{}", format_matrix(&result.intrinsic_matrix()))?;
    writeln!(out, "Radial Distortion")?;
    write!(out, "  k1={:.6}, k2={:.6}", d[0], d[1])?;
    if d.len() >= 5 {
        write!(out, ", k3={:.6}", d[4])?;
    }
    if d.len() == 8 {
        write!(out, ", k4={:.6}, k5={:.6}, k6={:.6}", d[5], d[6], d[7])?;
    }
    writeln!(out)?;
    writeln!(out, "Tangential Distortion")?;
    writeln!(out, "  p1={:.6}, p2={:.6}", d[2], d[3])?;
    writeln!(out, "Reprojection Error")?;
    writeln!(out, "  rms={:.6}", result.reprojection_error)
}

fn format_extrinsics(out: &mut String, result: &CalibrationResult) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "Extrinsic Calibration")?;
    writeln!(out, "=====================")?;
    for (i, pose) in result.extrinsics.iter().enumerate() {
        writeln!(out, "View {i}")?;
        writeln!(out, "Extrinsic Matrix")?;
        writeln!(out, "{}", format_matrix(&pose.matrix()))?;
        writeln!(out, "-----------")?;
    }
    Ok(())
}

fn write_report(
    out: &mut String,
    result: &CalibrationResult,
    include_intrinsics: bool,
    include_extrinsics: bool,
) -> fmt::Result {
    if include_intrinsics {
        writeln!(out, "Intrinsic Calibration")?;
        writeln!(out, "=====================")?;
        format_intrinsics(out, result)?;
    }
    if include_extrinsics {
        format_extrinsics(out, result)?;
    }
    Ok(())
}

/// Formats `result` as a human readable report.
///
/// The intrinsic section lists the camera matrix and the distortion
/// coefficients; the extrinsic section lists the `[R | t]` matrix of each view.
///
/// # Errors
///
/// Returns [`IoError::Format`] if a section cannot be formatted.
pub fn pretty_print(
    result: &CalibrationResult,
    include_intrinsics: bool,
    include_extrinsics: bool,
) -> Result<String, IoError> {
    let mut out = String::new();
    write_report(&mut out, result, include_intrinsics, include_extrinsics)?;
    Ok(out)
}

pub fn save<P: AsRef<Path>>(
    result: &CalibrationResult,
    path: P,
    include_intrinsics: bool,
    include_extrinsics: bool,
) -> Result<(), IoError> {
    fs::write(
        path,
        pretty_print(result, include_intrinsics, include_extrinsics)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Distortion, Extrinsics, Intrinsics, PinholeCamera, Resolution};
    use nalgebra::{Matrix2x3, Vector3};

    fn sample_result(distortion: Vec<f64>) -> CalibrationResult {
        let camera = PinholeCamera::new(
            Intrinsics {
                fx: 800.0,
                fy: 790.5,
                cx: 320.0,
                cy: 240.25,
            },
            Distortion::new(distortion).unwrap(),
            Resolution::new(640, 480),
        )
        .unwrap();
        let extrinsics = vec![
            Extrinsics::new(Vector3::zeros(), Vector3::new(1.0, 2.0, 300.0)),
            Extrinsics::identity(),
        ];
        CalibrationResult::new(camera, extrinsics, 0.25)
    }

    #[test]
    fn test_format_matrix() {
        let m = Matrix2x3::new(1.0, -2.5, 100.0, 0.12345, 0.0, -1234.5);
        assert_eq!(
            format_matrix(&m),
            "    1.0000    -2.5000   100.0000\n    0.1235     0.0000 -1234.5000"
        );
    }

    #[test]
    fn test_full_report() {
        let result = sample_result(vec![0.1, -0.2, 0.001, 0.002, 0.05]);
        let report = pretty_print(&result, true, true).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Intrinsic Calibration");
        assert_eq!(lines[1], "=====================");
        assert_eq!(lines[2], "Intrinsic Matrix");
        assert_eq!(lines[3], "  800.0000     0.0000   320.0000");
        assert_eq!(lines[6], "Radial Distortion");
        assert_eq!(lines[7], "  k1=0.100000, k2=-0.200000, k3=0.050000");
        assert_eq!(lines[8], "Tangential Distortion");
        assert_eq!(lines[9], "  p1=0.001000, p2=0.002000");
        assert!(report.contains("Extrinsic Calibration"));
        assert!(report.contains("View 0\nExtrinsic Matrix\n    1.0000     0.0000     0.0000     1.0000"));
        assert!(report.contains("View 1"));
        assert_eq!(report.matches("-----------").count(), 2);
    }

    #[test]
    fn test_rational_distortion_and_sections() {
        let result = sample_result(vec![0.1, -0.2, 0.001, 0.002, 0.05, 0.3, 0.4, 0.5]);
        let intrinsics_only = pretty_print(&result, true, false).unwrap();
        assert!(intrinsics_only.contains("k4=0.300000, k5=0.400000, k6=0.500000"));
        assert!(!intrinsics_only.contains("Extrinsic"));

        let extrinsics_only = pretty_print(&result, false, true).unwrap();
        assert!(!extrinsics_only.contains("Intrinsic"));
        assert!(extrinsics_only.starts_with("\nExtrinsic Calibration"));

        let empty = pretty_print(&result, false, false).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sections_written_in_place() {
        let result = sample_result(vec![0.1, -0.2, 0.001, 0.002, 0.05]);
        let mut out = String::from("header\n");
        format_intrinsics(&mut out, &result).unwrap();
        assert!(out.starts_with("header\nIntrinsic Matrix\n"));
        assert!(out.ends_with("  rms=0.250000\n"));

        let mut out = String::new();
        format_extrinsics(&mut out, &result).unwrap();
        assert_eq!(out.matches("View ").count(), 2);
        assert_eq!(out, pretty_print(&result, false, true).unwrap());
    }
}
