//! Camera parameter types shared by the detectors, the solver and persistence.
//!
//! A camera is described by its [`Intrinsics`] (focal lengths and principal
//! point), a lens [`Distortion`] in OpenCV coefficient order and the sensor
//! [`Resolution`]. The [`PinholeCamera`] bundles the three and implements the
//! [`CameraModel`] trait. Per-view poses are stored as [`Extrinsics`].
//!
//! The projection math lives in [`projection`] and is written generically over
//! `nalgebra::RealField`, so the same code path serves the nonlinear solver
//! (dual numbers) and the reprojection error metric (`f64`).

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod distortion;
pub mod pinhole;
pub mod pose;
pub mod projection;

pub use distortion::{Distortion, DistortionModel};
pub use pinhole::PinholeCamera;
pub use pose::Extrinsics;

/// Focal lengths and principal point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Returns the 3×3 camera matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Reads the focal lengths and principal point out of a camera matrix.
    ///
    /// Skew is ignored.
    pub fn from_matrix(matrix: &Matrix3<f64>) -> Self {
        Intrinsics {
            fx: matrix[(0, 0)],
            fy: matrix[(1, 1)],
            cx: matrix[(0, 2)],
            cy: matrix[(1, 2)],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.fx, self.fy, self.cx, self.cy]
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Intrinsics {
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
        }
    }
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    /// Whether a pixel position lies inside the image.
    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        point.x >= 0.0
            && point.x < self.width as f64
            && point.y >= 0.0
            && point.y < self.height as f64
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Projection is outside the image")]
    ProjectionOutSideImage,
    #[error("Input point is outside the image")]
    PointIsOutSideImage,
    #[error("z is close to zero, point is at camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Projection, unprojection and YAML persistence of a calibrated camera.
///
/// [`PinholeCamera`] is the implementation used by the calibration engine.
pub trait CameraModel {
    /// Project a 3D point given in camera coordinates to pixel coordinates.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Unproject pixel coordinates to a unit-length ray in camera coordinates.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError>
    where
        Self: Sized;

    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError>;

    /// Checks focal lengths and principal point.
    fn validate_params(&self) -> Result<(), CameraModelError>;

    fn get_resolution(&self) -> Resolution;

    fn get_intrinsics(&self) -> Intrinsics;

    fn get_distortion(&self) -> Vec<f64>;
}

pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0)
            || !intrinsics.fx.is_finite()
            || !intrinsics.fy.is_finite()
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_matrix_round_trip() {
        let intrinsics = Intrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 319.5,
            cy: 239.5,
        };
        let k = intrinsics.matrix();
        assert_eq!(k[(0, 1)], 0.0);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(Intrinsics::from_matrix(&k), intrinsics);
    }

    #[test]
    fn test_validate_intrinsics() {
        let mut intrinsics = Intrinsics::default();
        assert!(validation::validate_intrinsics(&intrinsics).is_ok());

        intrinsics.fx = 0.0;
        assert!(matches!(
            validation::validate_intrinsics(&intrinsics),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));

        intrinsics.fx = f64::NAN;
        assert!(validation::validate_intrinsics(&intrinsics).is_err());

        intrinsics.fx = 1.0;
        intrinsics.cy = f64::INFINITY;
        assert!(matches!(
            validation::validate_intrinsics(&intrinsics),
            Err(CameraModelError::PrincipalPointMustBeFinite)
        ));
    }

    #[test]
    fn test_resolution_contains() {
        let resolution = Resolution::new(640, 480);
        assert!(resolution.contains(&Vector2::new(0.0, 0.0)));
        assert!(resolution.contains(&Vector2::new(639.9, 479.9)));
        assert!(!resolution.contains(&Vector2::new(640.0, 10.0)));
        assert!(!resolution.contains(&Vector2::new(10.0, -0.1)));
    }
}
