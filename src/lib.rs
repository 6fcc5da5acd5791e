//! Calib3D
//!
//! Geometric camera calibration from images of known planar targets.
//! The library provides:
//! - Calibration patterns (checkerboard, square marker, textured plane)
//! - Pattern detectors producing 2D/3D point correspondences
//! - Intrinsic calibration and per-view pose estimation
//! - Persistence of calibration results (JSON, OpenCV-style YAML, text)
//! - Overlay renderers and a name-based component registry
//!
//! Nonlinear refinement runs on the tiny-solver Levenberg-Marquardt optimizer.

pub mod calibration;
pub mod camera;
pub mod correspondences;
pub mod detection;
pub mod geometry;
pub mod io;
pub mod optimization;
pub mod pattern;
pub mod registry;
pub mod render;

// Re-export commonly used types
pub use calibration::{
    estimate_extrinsics, estimate_intrinsics, reprojection_error, CalibrationError,
    CalibrationOptions, CalibrationResult,
};
pub use camera::{
    CameraModel, CameraModelError, Distortion, DistortionModel, Extrinsics, Intrinsics,
    PinholeCamera, Resolution,
};
pub use correspondences::{MultiViewCorrespondences, SingleViewCorrespondence};
pub use detection::{DetectionResult, DetectorKind, MarkerDetector, PatternDetector};
pub use io::IoError;
pub use optimization::{IntrinsicCalibrationCost, Optimizer, PoseEstimationCost};
pub use pattern::{CheckerBoardPattern, MarkerPattern, Pattern, PatternKind, TexturedPlanePattern};
pub use registry::Registry;
