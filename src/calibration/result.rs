use crate::camera::{Extrinsics, PinholeCamera};
use crate::correspondences::MultiViewCorrespondences;
use nalgebra::Matrix3;

/// Output of the calibration engine.
///
/// A default result is uncalibrated: its reprojection error is infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    /// Intrinsics, distortion and resolution.
    pub camera: PinholeCamera,
    /// One pose per calibrated view, in view order.
    pub extrinsics: Vec<Extrinsics>,
    /// RMS reprojection error in pixels.
    pub reprojection_error: f64,
    /// Input the result was computed from. Not persisted.
    pub correspondences: Option<MultiViewCorrespondences>,
}

impl CalibrationResult {
    pub fn new(camera: PinholeCamera, extrinsics: Vec<Extrinsics>, reprojection_error: f64) -> Self {
        CalibrationResult {
            camera,
            extrinsics,
            reprojection_error,
            correspondences: None,
        }
    }

    pub fn with_correspondences(mut self, correspondences: MultiViewCorrespondences) -> Self {
        self.correspondences = Some(correspondences);
        self
    }

    /// Whether the result holds a finite reprojection error.
    pub fn is_calibrated(&self) -> bool {
        self.reprojection_error.is_finite()
    }

    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        self.camera.camera_matrix()
    }

    pub fn distortion_coefficients(&self) -> &[f64] {
        self.camera.distortion.coefficients()
    }
}

impl Default for CalibrationResult {
    fn default() -> Self {
        CalibrationResult {
            camera: PinholeCamera::default(),
            extrinsics: Vec::new(),
            reprojection_error: f64::INFINITY,
            correspondences: None,
        }
    }
}
