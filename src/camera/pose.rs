use nalgebra::{
    Isometry3, Matrix3, Matrix3x4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3,
};

/// Pose of a calibration target relative to the camera.
///
/// Maps model coordinates into the camera frame: `X_cam = R * X_model + t`,
/// with `R` stored as a Rodrigues vector (rotation axis scaled by the angle
/// in radians), the same convention OpenCV uses for `rvec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Extrinsics {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Extrinsics {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Extrinsics::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Builds a pose from a rotation matrix; the matrix is re-orthonormalized first.
    pub fn from_rotation_matrix(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation = Rotation3::from_matrix_unchecked(nearest_rotation(rotation));
        Extrinsics::new(rotation.scaled_axis(), translation)
    }

    /// Builds a pose from a `[R | t]` matrix.
    pub fn from_matrix(matrix: &Matrix3x4<f64>) -> Self {
        let rotation: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vector3<f64> = matrix.column(3).into_owned();
        Extrinsics::from_rotation_matrix(&rotation, translation)
    }

    pub fn from_params(params: &[f64]) -> Self {
        Extrinsics::new(
            Vector3::new(params[0], params[1], params[2]),
            Vector3::new(params[3], params[4], params[5]),
        )
    }

    /// `[rx, ry, rz, tx, ty, tz]`, the solver's pose block layout.
    pub fn to_params(&self) -> Vec<f64> {
        vec![
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        ]
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Rotation3::new(self.rotation).into_inner()
    }

    /// The 3×4 `[R | t]` matrix.
    pub fn matrix(&self) -> Matrix3x4<f64> {
        let mut matrix = Matrix3x4::zeros();
        matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        matrix.set_column(3, &self.translation);
        matrix
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_scaled_axis(self.rotation),
        )
    }

    /// Maps a model point into the camera frame.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Rotation3::new(self.rotation) * point + self.translation
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

/// Closest proper rotation to `m` in the Frobenius sense (`U * V^T` from the SVD).
pub fn nearest_rotation(m: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = m.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => {
            let mut u = u;
            if (u * v_t).determinant() < 0.0 {
                let flipped = -u.column(2);
                u.set_column(2, &flipped);
            }
            u * v_t
        }
        _ => Matrix3::identity(),
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Extrinsics::identity()
    }
}
