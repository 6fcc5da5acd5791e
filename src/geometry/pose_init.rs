//! Closed-form camera and pose initialisation.
//!
//! These estimates only need to land inside the basin of convergence of the
//! Levenberg-Marquardt refinement in [`crate::optimization`].

use crate::calibration::CalibrationError;
use crate::camera::pose::nearest_rotation;
use crate::camera::{Extrinsics, Intrinsics, Resolution};
use crate::geometry::{Point2, Point3};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, SMatrix, SVector, Vector3};

/// Principal point guess at the image centre, `((w - 1) / 2, (h - 1) / 2)`.
pub fn principal_point_guess(resolution: &Resolution) -> (f64, f64) {
    (
        (resolution.width as f64 - 1.0) * 0.5,
        (resolution.height as f64 - 1.0) * 0.5,
    )
}

/// Estimates focal lengths from plane-to-image homographies with the
/// principal point held fixed.
///
/// Each homography contributes two orthogonality constraints on the image of
/// the absolute conic (`h1 ⟂ h2` and `|h1| = |h2|` after removing the
/// principal point), solved for `1/fx²` and `1/fy²` in the least-squares
/// sense.
///
/// # Errors
///
/// [`CalibrationError::ComputationFailed`] when the views are degenerate, for
/// example when every view is fronto-parallel.
pub fn focal_from_homographies(
    homographies: &[Matrix3<f64>],
    principal_point: (f64, f64),
) -> Result<Intrinsics, CalibrationError> {
    if homographies.is_empty() {
        return Err(CalibrationError::InvalidArgument(
            "Focal initialisation needs at least one homography".to_string(),
        ));
    }

    let (cx, cy) = principal_point;
    let shift = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);

    let mut a = DMatrix::zeros(homographies.len() * 2, 2);
    let mut b = DVector::zeros(homographies.len() * 2);

    for (i, homography) in homographies.iter().enumerate() {
        let centered = shift * homography;
        let h: Vector3<f64> = centered.column(0).into_owned();
        let v: Vector3<f64> = centered.column(1).into_owned();
        let d1 = (h + v) * 0.5;
        let d2 = (h - v) * 0.5;

        let normalized = [h, v, d1, d2].map(|c| {
            let norm = c.norm();
            if norm > f64::EPSILON {
                c / norm
            } else {
                c
            }
        });
        let [h, v, d1, d2] = normalized;

        a[(2 * i, 0)] = h.x * v.x;
        a[(2 * i, 1)] = h.y * v.y;
        b[2 * i] = -h.z * v.z;

        a[(2 * i + 1, 0)] = d1.x * d2.x;
        a[(2 * i + 1, 1)] = d1.y * d2.y;
        b[2 * i + 1] = -d1.z * d2.z;
    }

    let svd = a.svd(true, true);
    let f = svd.solve(&b, 1e-12).map_err(|e| {
        CalibrationError::ComputationFailed(format!("Focal initialisation failed: {}", e))
    })?;

    let fx = (1.0 / f[0]).abs().sqrt();
    let fy = (1.0 / f[1]).abs().sqrt();
    if !(fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0) {
        return Err(CalibrationError::ComputationFailed(
            "Focal initialisation produced non-finite focal lengths".to_string(),
        ));
    }

    Ok(Intrinsics { fx, fy, cx, cy })
}

/// Recovers the target pose from a plane-to-image homography.
///
/// `camera_matrix_inv` maps pixels to normalized image coordinates; pass the
/// identity for homographies that already live in normalized coordinates.
/// The sign is chosen so the target lies in front of the camera.
pub fn pose_from_homography(
    camera_matrix_inv: &Matrix3<f64>,
    homography: &Matrix3<f64>,
) -> Result<Extrinsics, CalibrationError> {
    let m = camera_matrix_inv * homography;
    let c0: Vector3<f64> = m.column(0).into_owned();
    let c1: Vector3<f64> = m.column(1).into_owned();
    let c2: Vector3<f64> = m.column(2).into_owned();

    let (n0, n1) = (c0.norm(), c1.norm());
    if !(n0 > f64::EPSILON && n1 > f64::EPSILON) {
        return Err(CalibrationError::ComputationFailed(
            "Homography has a degenerate rotation part".to_string(),
        ));
    }

    let lambda = 2.0 / (n0 + n1);
    let (mut r1, mut r2, mut t) = (c0 * lambda, c1 * lambda, c2 * lambda);
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    let rotation = nearest_rotation(&Matrix3::from_columns(&[r1, r2, r3]));

    let pose = Extrinsics::from_rotation_matrix(&rotation, t);
    if !pose.is_finite() {
        return Err(CalibrationError::ComputationFailed(
            "Pose from homography is not finite".to_string(),
        ));
    }
    Ok(pose)
}

/// Estimates a pose from at least six non-coplanar model points and their
/// undistorted normalized image coordinates (DLT of the 3×4 `[R | t]`).
pub fn pose_from_dlt(
    model_points: &[Point3],
    normalized_points: &[Point2],
) -> Result<Extrinsics, CalibrationError> {
    if model_points.len() != normalized_points.len() {
        return Err(CalibrationError::InvalidArgument(
            "DLT pose needs matching point counts".to_string(),
        ));
    }
    if model_points.len() < 6 {
        return Err(CalibrationError::InvalidArgument(format!(
            "DLT pose needs at least 6 points, got {}",
            model_points.len()
        )));
    }

    // Condition the model points: centroid at the origin, mean distance sqrt(3).
    let n = model_points.len() as f64;
    let centroid = model_points
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.coords)
        / n;
    let mean_distance = model_points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;
    if !(mean_distance > f64::EPSILON) {
        return Err(CalibrationError::ComputationFailed(
            "Model points are degenerate".to_string(),
        ));
    }
    let s = 3.0_f64.sqrt() / mean_distance;
    let conditioning = Matrix4::new(
        s,
        0.0,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        0.0,
        -s * centroid.y,
        0.0,
        0.0,
        s,
        -s * centroid.z,
        0.0,
        0.0,
        0.0,
        1.0,
    );

    let mut ata = SMatrix::<f64, 12, 12>::zeros();
    for (p, q) in model_points.iter().zip(normalized_points) {
        let x = conditioning * p.to_homogeneous();
        let (u, v) = (q.x, q.y);
        let row_u = SVector::<f64, 12>::from_column_slice(&[
            x[0],
            x[1],
            x[2],
            x[3],
            0.0,
            0.0,
            0.0,
            0.0,
            -u * x[0],
            -u * x[1],
            -u * x[2],
            -u * x[3],
        ]);
        let row_v = SVector::<f64, 12>::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            0.0,
            x[0],
            x[1],
            x[2],
            x[3],
            -v * x[0],
            -v * x[1],
            -v * x[2],
            -v * x[3],
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
        .ok_or_else(|| {
            CalibrationError::ComputationFailed("DLT eigen solve failed".to_string())
        })?;
    let p: SVector<f64, 12> = eigen.eigenvectors.column(smallest).into_owned();
    let conditioned = Matrix3x4::from_row_slice(p.as_slice());
    let mut projection = conditioned * conditioning;

    let mut m: Matrix3<f64> = projection.fixed_view::<3, 3>(0, 0).into_owned();
    if m.determinant() < 0.0 {
        projection = -projection;
        m = -m;
    }

    let svd = m.svd(false, false);
    let scale = svd.singular_values.sum() / 3.0;
    if !(scale > f64::EPSILON) {
        return Err(CalibrationError::ComputationFailed(
            "DLT produced a degenerate projection".to_string(),
        ));
    }

    let rotation = nearest_rotation(&m);
    let translation: Vector3<f64> = projection.column(3).into_owned() / scale;
    let pose = Extrinsics::from_rotation_matrix(&rotation, translation);
    if !pose.is_finite() {
        return Err(CalibrationError::ComputationFailed(
            "DLT pose is not finite".to_string(),
        ));
    }
    Ok(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::estimate_homography;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn board() -> Vec<Point3> {
        (0..6)
            .flat_map(|y| (0..8).map(move |x| Point3::new(x as f64 * 20.0, y as f64 * 20.0, 0.0)))
            .collect()
    }

    fn project(intrinsics: &Intrinsics, pose: &Extrinsics, points: &[Point3]) -> Vec<Point2> {
        points
            .iter()
            .map(|p| {
                let c = pose.transform_point(p);
                Point2::new(
                    intrinsics.fx * c.x / c.z + intrinsics.cx,
                    intrinsics.fy * c.y / c.z + intrinsics.cy,
                )
            })
            .collect()
    }

    fn sample_poses() -> Vec<Extrinsics> {
        vec![
            Extrinsics::new(Vector3::new(0.3, -0.2, 0.05), Vector3::new(-70.0, -50.0, 500.0)),
            Extrinsics::new(Vector3::new(-0.25, 0.3, -0.1), Vector3::new(-60.0, -40.0, 450.0)),
            Extrinsics::new(Vector3::new(0.1, 0.4, 0.2), Vector3::new(-80.0, -45.0, 550.0)),
        ]
    }

    #[test]
    fn test_focal_from_homographies() {
        let resolution = Resolution::new(640, 480);
        let (cx, cy) = principal_point_guess(&resolution);
        let truth = Intrinsics {
            fx: 800.0,
            fy: 820.0,
            cx,
            cy,
        };
        let model = board();
        let plane: Vec<Point2> = model.iter().map(|p| Point2::new(p.x, p.y)).collect();

        let homographies: Vec<Matrix3<f64>> = sample_poses()
            .iter()
            .map(|pose| estimate_homography(&plane, &project(&truth, pose, &model)).unwrap())
            .collect();

        let estimated = focal_from_homographies(&homographies, (cx, cy)).unwrap();
        assert_relative_eq!(estimated.fx, truth.fx, max_relative = 1e-6);
        assert_relative_eq!(estimated.fy, truth.fy, max_relative = 1e-6);
        assert_eq!(estimated.cx, cx);
        assert_eq!(estimated.cy, cy);
    }

    #[test]
    fn test_pose_from_homography() {
        let intrinsics = Intrinsics {
            fx: 700.0,
            fy: 700.0,
            cx: 320.0,
            cy: 240.0,
        };
        let model = board();
        let plane: Vec<Point2> = model.iter().map(|p| Point2::new(p.x, p.y)).collect();

        for truth in sample_poses() {
            let image = project(&intrinsics, &truth, &model);
            let h = estimate_homography(&plane, &image).unwrap();
            let k_inv = intrinsics.matrix().try_inverse().unwrap();
            let pose = pose_from_homography(&k_inv, &h).unwrap();
            assert_relative_eq!(pose.rotation, truth.rotation, epsilon = 1e-8);
            assert_relative_eq!(pose.translation, truth.translation, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_pose_from_dlt_non_planar() {
        let truth = Extrinsics::new(Vector3::new(0.2, -0.1, 0.3), Vector3::new(0.1, -0.2, 5.0));
        let model = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 0.5),
            Point3::new(-1.0, 0.5, 0.2),
            Point3::new(0.5, -1.0, -0.4),
            Point3::new(-0.7, -0.6, 0.9),
        ];
        let normalized: Vec<Point2> = model
            .iter()
            .map(|p| {
                let c = truth.transform_point(p);
                Point2::new(c.x / c.z, c.y / c.z)
            })
            .collect();

        let pose = pose_from_dlt(&model, &normalized).unwrap();
        let rotation_error =
            Rotation3::new(pose.rotation).angle_to(&Rotation3::new(truth.rotation));
        assert!(rotation_error < 1e-8);
        assert_relative_eq!(pose.translation, truth.translation, epsilon = 1e-7);
    }

    #[test]
    fn test_pose_from_dlt_needs_six_points() {
        let model = vec![Point3::new(0.0, 0.0, 1.0); 5];
        let image = vec![Point2::new(0.0, 0.0); 5];
        assert!(matches!(
            pose_from_dlt(&model, &image),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }
}
