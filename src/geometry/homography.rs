//! Planar homography estimation with the normalized Direct Linear Transform.

use crate::calibration::CalibrationError;
use crate::geometry::Point2;
use nalgebra::{Matrix3, SMatrix, SVector, Vector2};

/// Similarity transform that moves the centroid to the origin and scales the
/// mean distance to `sqrt(2)` (Hartley normalization).
pub(crate) fn normalization_transform(points: &[Point2]) -> Option<Matrix3<f64>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(Vector2::<f64>::zeros(), |acc, p| acc + p.coords)
        / n;
    let mean_distance = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;
    if !(mean_distance > f64::EPSILON) || !mean_distance.is_finite() {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_distance;
    Some(Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Estimates `H` such that `dst ~ H * src` from at least four correspondences.
///
/// The result is scaled so that `H[(2, 2)] = 1` whenever that entry is not
/// vanishingly small.
///
/// # Errors
///
/// * [`CalibrationError::InvalidArgument`] for fewer than four pairs or
///   mismatched lengths.
/// * [`CalibrationError::ComputationFailed`] for degenerate configurations.
pub fn estimate_homography(
    src: &[Point2],
    dst: &[Point2],
) -> Result<Matrix3<f64>, CalibrationError> {
    if src.len() != dst.len() {
        return Err(CalibrationError::InvalidArgument(format!(
            "Homography needs matching point counts, got {} and {}",
            src.len(),
            dst.len()
        )));
    }
    if src.len() < 4 {
        return Err(CalibrationError::InvalidArgument(format!(
            "Homography needs at least 4 point pairs, got {}",
            src.len()
        )));
    }

    let degenerate =
        || CalibrationError::ComputationFailed("Degenerate homography points".to_string());
    let t_src = normalization_transform(src).ok_or_else(degenerate)?;
    let t_dst = normalization_transform(dst).ok_or_else(degenerate)?;

    // Normal equations of the 2n x 9 DLT system.
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let ps = t_src * s.to_homogeneous();
        let pd = t_dst * d.to_homogeneous();
        let (x, y) = (ps.x, ps.y);
        let (u, v) = (pd.x, pd.y);

        let row_u = SVector::<f64, 9>::from_column_slice(&[
            -x,
            -y,
            -1.0,
            0.0,
            0.0,
            0.0,
            u * x,
            u * y,
            u,
        ]);
        let row_v = SVector::<f64, 9>::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            -x,
            -y,
            -1.0,
            v * x,
            v * y,
            v,
        ]);
        ata += row_u * row_u.transpose();
        ata += row_v * row_v.transpose();
    }

    let eigen = ata.symmetric_eigen();
    let smallest = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .ok_or_else(degenerate)?;
    let h = eigen.eigenvectors.column(smallest);
    let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse().ok_or_else(degenerate)?;
    let mut homography = t_dst_inv * normalized * t_src;

    let scale = homography[(2, 2)];
    if scale.abs() > 1e-12 {
        homography /= scale;
    } else {
        let norm = homography.norm();
        if norm <= f64::EPSILON {
            return Err(degenerate());
        }
        homography /= norm;
    }

    if homography.iter().any(|v| !v.is_finite()) {
        return Err(degenerate());
    }
    Ok(homography)
}

/// Maps a point through a homography. Returns `None` for points mapped to infinity.
pub fn apply_homography(homography: &Matrix3<f64>, point: &Point2) -> Option<Point2> {
    let p = homography * point.to_homogeneous();
    if p.z.abs() <= f64::EPSILON {
        return None;
    }
    Some(Point2::new(p.x / p.z, p.y / p.z))
}
