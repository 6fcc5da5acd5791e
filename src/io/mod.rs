//! Persistence of calibration results and correspondences, and image loading.
//!
//! * [`native`]: JSON of a [`crate::calibration::CalibrationResult`].
//! * [`opencv`]: YAML map of named matrices in the OpenCV `FileStorage` layout.
//! * [`text`]: human-readable report.
//! * [`images`]: loading a single image or a directory of images.

use crate::camera::CameraModelError;
use crate::correspondences::MultiViewCorrespondences;
use log::info;
use serde::Serialize;
use std::path::Path;

pub mod images;
pub mod native;
pub mod opencv;
pub mod text;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
    #[error("Camera parameters rejected: {0}")]
    Camera(#[from] CameraModelError),
    #[error("Result is not calibrated")]
    Uncalibrated,
}

#[derive(Debug, Serialize)]
struct CorrespondenceRecord {
    view: usize,
    index: usize,
    x2d: f64,
    y2d: f64,
    x3d: f64,
    y3d: f64,
    z3d: f64,
}

/// Writes every correspondence as one CSV row
/// `view,index,x2d,y2d,x3d,y3d,z3d`.
pub fn export_correspondences_csv<P: AsRef<Path>>(
    path: P,
    correspondences: &MultiViewCorrespondences,
) -> Result<(), IoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for (view, correspondence) in correspondences.views().iter().enumerate() {
        for (index, (image, model)) in correspondence.pairs().enumerate() {
            writer.serialize(CorrespondenceRecord {
                view,
                index,
                x2d: image.x,
                y2d: image.y,
                x3d: model.x,
                y3d: model.y,
                z3d: model.z,
            })?;
        }
    }
    writer.flush()?;

    info!(
        "Exported {} correspondences from {} views to {}",
        correspondences.correspondence_count(),
        correspondences.view_count(),
        path.display()
    );
    Ok(())
}
