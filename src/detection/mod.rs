//! Pattern detection.
//!
//! A [`PatternDetector`] locates one kind of [`Pattern`] in an image and
//! reports the result as a [`DetectionResult`]. Which detector accepts which
//! pattern is fixed by [`DetectorKind::supports`].

use crate::calibration::CalibrationError;
use crate::correspondences::MultiViewCorrespondences;
use crate::geometry::{Point2, Point3};
use crate::pattern::{Pattern, PatternKind};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod checkerboard;
pub mod feature;
pub mod marker;

pub use checkerboard::{CheckerBoardDetector, CornerFinder};
pub use feature::{FeatureMatch, FeatureMatcher, TexturedPlaneDetector};
pub use marker::{MarkerDetector, MarkerDetectorConfig, MarkerMatch};

/// Identifies a detector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Marker,
    CheckerBoard,
    Feature,
}

impl DetectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::Marker => "marker",
            DetectorKind::CheckerBoard => "checkerboard",
            DetectorKind::Feature => "feature",
        }
    }

    /// Compatibility table between detectors and patterns.
    pub fn supports(&self, pattern: PatternKind) -> bool {
        matches!(
            (self, pattern),
            (DetectorKind::Marker, PatternKind::Marker)
                | (DetectorKind::CheckerBoard, PatternKind::CheckerBoard)
                | (DetectorKind::Feature, PatternKind::TexturedPlane)
        )
    }

    /// Fails with [`CalibrationError::UnsupportedPattern`] unless `pattern` is accepted.
    pub fn ensure_supports(&self, pattern: &Pattern) -> Result<(), CalibrationError> {
        if self.supports(pattern.kind()) {
            Ok(())
        } else {
            Err(CalibrationError::UnsupportedPattern {
                detector: *self,
                pattern: pattern.kind(),
            })
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one detection call.
///
/// A failed detection is a regular value with `success() == false` and no
/// image points.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    success: bool,
    image_points: Vec<Point2>,
    model_points: Vec<Point3>,
    pattern: Arc<Pattern>,
    detector: DetectorKind,
}

impl DetectionResult {
    /// Successful detection with index-aligned image and model points.
    pub fn found(
        pattern: Arc<Pattern>,
        detector: DetectorKind,
        image_points: Vec<Point2>,
        model_points: Vec<Point3>,
    ) -> Self {
        DetectionResult {
            success: true,
            image_points,
            model_points,
            pattern,
            detector,
        }
    }

    /// Failed detection. Model points are those of the pattern.
    pub fn not_found(pattern: Arc<Pattern>, detector: DetectorKind) -> Self {
        let model_points = pattern.model_points().to_vec();
        DetectionResult {
            success: false,
            image_points: Vec::new(),
            model_points,
            pattern,
            detector,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn image_points(&self) -> &[Point2] {
        &self.image_points
    }

    pub fn model_points(&self) -> &[Point3] {
        &self.model_points
    }

    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    pub fn detector(&self) -> DetectorKind {
        self.detector
    }

    /// One-view correspondences of this detection, empty when it failed.
    pub fn correspondences(&self) -> Result<MultiViewCorrespondences, CalibrationError> {
        let mut correspondences = MultiViewCorrespondences::new();
        correspondences.add_view_from_detection(self)?;
        Ok(correspondences)
    }
}

/// Locates a calibration pattern in images.
pub trait PatternDetector {
    fn kind(&self) -> DetectorKind;

    /// Currently assigned pattern, if any.
    fn pattern(&self) -> Option<&Arc<Pattern>>;

    /// Assigns a pattern and recomputes any per-pattern state.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::UnsupportedPattern`] if this detector cannot handle
    /// the pattern kind, or [`CalibrationError::InvalidArgument`] if the
    /// pattern lacks data the detector needs. The previous pattern stays
    /// assigned on error.
    fn set_pattern(&mut self, pattern: Arc<Pattern>) -> Result<(), CalibrationError>;

    /// Searches `image` for the assigned pattern.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::InvalidArgument`] if no pattern is assigned.
    fn find_pattern(&self, image: &DynamicImage) -> Result<DetectionResult, CalibrationError>;
}

pub(crate) fn missing_pattern(kind: DetectorKind) -> CalibrationError {
    CalibrationError::InvalidArgument(format!("No pattern assigned to the {} detector", kind))
}
