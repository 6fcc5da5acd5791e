//! Native JSON format of a [`CalibrationResult`].
//!
//! ```json
//! {
//!   "camera": { "intrinsics": {..}, "distortion": [..], "resolution": {..} },
//!   "views": [ { "rotation": [rx, ry, rz], "translation": [tx, ty, tz] } ],
//!   "reprojection_error": 0.21
//! }
//! ```
//!
//! Rotations are Rodrigues vectors. The correspondences are not stored.

use crate::calibration::CalibrationResult;
use crate::camera::{CameraModel, Extrinsics, PinholeCamera};
use crate::io::IoError;
use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct ResultFile {
    camera: PinholeCamera,
    views: Vec<ViewPose>,
    reprojection_error: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewPose {
    rotation: [f64; 3],
    translation: [f64; 3],
}

impl From<&Extrinsics> for ViewPose {
    fn from(pose: &Extrinsics) -> Self {
        ViewPose {
            rotation: pose.rotation.into(),
            translation: pose.translation.into(),
        }
    }
}

impl From<&ViewPose> for Extrinsics {
    fn from(pose: &ViewPose) -> Self {
        Extrinsics::new(
            Vector3::from(pose.rotation),
            Vector3::from(pose.translation),
        )
    }
}

pub fn to_string(result: &CalibrationResult) -> Result<String, IoError> {
    if !result.is_calibrated() {
        return Err(IoError::Uncalibrated);
    }
    let file = ResultFile {
        camera: result.camera.clone(),
        views: result.extrinsics.iter().map(ViewPose::from).collect(),
        reprojection_error: result.reprojection_error,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

pub fn from_str(contents: &str) -> Result<CalibrationResult, IoError> {
    let file: ResultFile = serde_json::from_str(contents)?;
    file.camera.validate_params()?;
    if !file.reprojection_error.is_finite() || file.reprojection_error < 0.0 {
        return Err(IoError::InvalidFormat(format!(
            "Reprojection error must be finite and non-negative, got {}",
            file.reprojection_error
        )));
    }
    Ok(CalibrationResult::new(
        file.camera,
        file.views.iter().map(Extrinsics::from).collect(),
        file.reprojection_error,
    ))
}

/// Writes `result` as JSON.
///
/// # Errors
///
/// [`IoError::Uncalibrated`] if the result has no finite reprojection error.
pub fn save<P: AsRef<Path>>(result: &CalibrationResult, path: P) -> Result<(), IoError> {
    let contents = to_string(result)?;
    fs::write(path.as_ref(), contents)?;
    info!("Saved calibration to {}", path.as_ref().display());
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<CalibrationResult, IoError> {
    let contents = fs::read_to_string(path.as_ref())?;
    from_str(&contents)
}
