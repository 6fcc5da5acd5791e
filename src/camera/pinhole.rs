//! Pinhole camera with OpenCV radial/tangential distortion.
//!
//! This module provides [`PinholeCamera`], the camera description produced by
//! intrinsic calibration and consumed by pose estimation. It adheres to the
//! [`CameraModel`] trait defined in the parent `camera` module
//! ([`crate::camera`]).

use crate::camera::projection;
use crate::camera::{validation, CameraModel, CameraModelError, Distortion, Intrinsics, Resolution};
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;

/// Identifier written to the `camera_model` key of camera YAML files.
const MODEL_NAME: &str = "pinhole_radtan";

/// A pinhole camera with lens distortion.
///
/// # Examples
///
/// ```rust
/// use calib3d::camera::{CameraModel, Distortion, Intrinsics, PinholeCamera, Resolution};
/// use nalgebra::Vector3;
///
/// let camera = PinholeCamera::new(
///     Intrinsics { fx: 500.0, fy: 500.0, cx: 320.0, cy: 240.0 },
///     Distortion::new(vec![0.01, 0.0, 0.0, 0.0, 0.0]).unwrap(),
///     Resolution { width: 640, height: 480 },
/// )
/// .unwrap();
///
/// let pixel = camera.project(&Vector3::new(0.1, 0.2, 1.0)).unwrap();
/// assert!(pixel.x > 320.0 && pixel.y > 240.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// Focal lengths and principal point.
    pub intrinsics: Intrinsics,
    /// Lens distortion in OpenCV order.
    pub distortion: Distortion,
    /// Sensor size the intrinsics refer to.
    pub resolution: Resolution,
}

#[derive(Serialize, Deserialize)]
struct CameraFile {
    cam0: CameraEntry,
}

#[derive(Serialize, Deserialize)]
struct CameraEntry {
    camera_model: String,
    intrinsics: [f64; 4],
    distortion: Vec<f64>,
    resolution: [u32; 2],
}

impl PinholeCamera {
    /// Creates a camera and validates its intrinsics.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    pub fn new(
        intrinsics: Intrinsics,
        distortion: Distortion,
        resolution: Resolution,
    ) -> Result<Self, CameraModelError> {
        let camera = PinholeCamera {
            intrinsics,
            distortion,
            resolution,
        };
        camera.validate_params()?;
        Ok(camera)
    }

    /// The 3×3 camera matrix.
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.matrix()
    }

    /// Projects a point on the normalized image plane (`z = 1`) to pixels, applying distortion.
    pub fn distort_normalized(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let (xd, yd) = projection::distort(point.x, point.y, self.distortion.coefficients());
        Vector2::new(
            self.intrinsics.fx * xd + self.intrinsics.cx,
            self.intrinsics.fy * yd + self.intrinsics.cy,
        )
    }

    /// Maps a pixel to undistorted normalized image coordinates.
    ///
    /// Newton iterations on the distortion function, starting from the
    /// distorted normalized point. The Jacobian is taken by central
    /// differences so every supported coefficient layout shares one code path.
    /// No image bounds check is performed.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::NumericalError`] if the Jacobian becomes singular
    /// or the iteration does not converge.
    pub fn undistort_pixel(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        const EPS: f64 = 1e-12;
        const STEP: f64 = 1e-7;
        const MAX_ITERATIONS: usize = 100;

        let target = Vector2::new(
            (pixel.x - self.intrinsics.cx) / self.intrinsics.fx,
            (pixel.y - self.intrinsics.cy) / self.intrinsics.fy,
        );
        if self.distortion.is_zero() {
            return Ok(target);
        }

        let coefficients = self.distortion.coefficients();
        let distort = |p: &Vector2<f64>| {
            let (x, y) = projection::distort(p.x, p.y, coefficients);
            Vector2::new(x, y)
        };

        let mut point = target;
        for _ in 0..MAX_ITERATIONS {
            let error = distort(&point) - target;
            if error.norm() < EPS {
                return Ok(point);
            }

            let dx = Vector2::new(STEP, 0.0);
            let dy = Vector2::new(0.0, STEP);
            let col_x = (distort(&(point + dx)) - distort(&(point - dx))) / (2.0 * STEP);
            let col_y = (distort(&(point + dy)) - distort(&(point - dy))) / (2.0 * STEP);
            let jacobian = Matrix2::from_columns(&[col_x, col_y]);

            let inverse = jacobian.try_inverse().ok_or_else(|| {
                CameraModelError::NumericalError("Jacobian is singular".to_string())
            })?;
            let delta = inverse * error;
            point -= delta;

            if !point.x.is_finite() || !point.y.is_finite() {
                break;
            }
            if delta.norm() < EPS {
                return Ok(point);
            }
        }

        let residual = (distort(&point) - target).norm();
        if residual.is_finite() && residual < 1e-9 {
            return Ok(point);
        }
        Err(CameraModelError::NumericalError(format!(
            "Undistortion did not converge after {} iterations",
            MAX_ITERATIONS
        )))
    }
}

impl CameraModel for PinholeCamera {
    /// Projects a 3D point from camera coordinates to pixel coordinates, applying distortion.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointAtCameraCenter`]: the point's Z-coordinate is too close to zero
    ///   or behind the camera.
    /// * [`CameraModelError::ProjectionOutSideImage`]: the pixel falls outside the resolution.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if point_3d.z < f64::EPSILON.sqrt() {
            return Err(CameraModelError::PointAtCameraCenter);
        }

        let normalized = Vector2::new(point_3d.x / point_3d.z, point_3d.y / point_3d.z);
        let pixel = self.distort_normalized(&normalized);

        if !self.resolution.contains(&pixel) {
            return Err(CameraModelError::ProjectionOutSideImage);
        }
        Ok(pixel)
    }

    /// Unprojects a pixel to a unit-length ray in camera coordinates.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointIsOutSideImage`]: the pixel is outside the resolution.
    /// * [`CameraModelError::NumericalError`]: undistortion failed to converge.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        if !self.resolution.contains(point_2d) {
            return Err(CameraModelError::PointIsOutSideImage);
        }
        let normalized = self.undistort_pixel(point_2d)?;
        Ok(Vector3::new(normalized.x, normalized.y, 1.0).normalize())
    }

    /// Loads camera parameters from a YAML file with a `cam0` entry holding
    /// `intrinsics` (fx, fy, cx, cy), `distortion` (4, 5 or 8 values) and
    /// `resolution` (width, height).
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let file: CameraFile = serde_yaml::from_str(&contents)?;
        let entry = file.cam0;

        let [fx, fy, cx, cy] = entry.intrinsics;
        let camera = PinholeCamera {
            intrinsics: Intrinsics { fx, fy, cx, cy },
            distortion: Distortion::new(entry.distortion)?,
            resolution: Resolution {
                width: entry.resolution[0],
                height: entry.resolution[1],
            },
        };
        camera.validate_params()?;
        Ok(camera)
    }

    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let file = CameraFile {
            cam0: CameraEntry {
                camera_model: MODEL_NAME.to_string(),
                intrinsics: [
                    self.intrinsics.fx,
                    self.intrinsics.fy,
                    self.intrinsics.cx,
                    self.intrinsics.cy,
                ],
                distortion: self.distortion.coefficients().to_vec(),
                resolution: [self.resolution.width, self.resolution.height],
            },
        };
        let yaml_string = serde_yaml::to_string(&file)?;
        fs::write(path, yaml_string)?;
        Ok(())
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn get_distortion(&self) -> Vec<f64> {
        self.distortion.coefficients().to_vec()
    }
}
