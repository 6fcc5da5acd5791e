use crate::calibration::CalibrationError;
use crate::detection::{missing_pattern, DetectionResult, DetectorKind, PatternDetector};
use crate::geometry::{apply_homography, Point2, Point3};
use crate::pattern::Pattern;
use image::{DynamicImage, GrayImage};
use log::debug;
use nalgebra::Matrix3;
use std::sync::Arc;

/// Squared pixel distance below which a matched pair counts as an inlier.
const INLIER_DISTANCE_SQUARED: f64 = 100.0;

/// One matched feature: its location in the searched image and in the reference image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub image_point: Point2,
    pub reference_point: Point2,
}

/// Feature extraction and matching between a reference image and a search image.
pub trait FeatureMatcher {
    /// Prepares reference features. Called whenever a new pattern is assigned.
    fn set_reference(&mut self, reference: &GrayImage);

    /// Matches features of `image` against the reference.
    ///
    /// Returns the matches together with the homography mapping reference
    /// pixels to image pixels, or `None` if no homography could be fitted.
    fn match_features(&self, image: &GrayImage) -> Option<(Vec<FeatureMatch>, Matrix3<f64>)>;
}

/// Detects [`crate::pattern::TexturedPlanePattern`] targets through a [`FeatureMatcher`].
pub struct TexturedPlaneDetector {
    matcher: Box<dyn FeatureMatcher + Send + Sync>,
    pattern: Option<Arc<Pattern>>,
    scale: (f64, f64),
}

impl TexturedPlaneDetector {
    pub fn new(matcher: Box<dyn FeatureMatcher + Send + Sync>) -> Self {
        TexturedPlaneDetector {
            matcher,
            pattern: None,
            scale: (1.0, 1.0),
        }
    }

    fn model_point(&self, reference: &Point2) -> Point3 {
        Point3::new(reference.x * self.scale.0, reference.y * self.scale.1, 0.0)
    }
}

impl PatternDetector for TexturedPlaneDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Feature
    }

    fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.pattern.as_ref()
    }

    fn set_pattern(&mut self, pattern: Arc<Pattern>) -> Result<(), CalibrationError> {
        self.kind().ensure_supports(&pattern)?;
        let textured = pattern.as_textured_plane().ok_or_else(|| {
            CalibrationError::InvalidArgument("Expected a textured plane pattern".to_string())
        })?;
        let (image, scale) = textured.image().zip(textured.pixel_scale()).ok_or_else(|| {
            CalibrationError::InvalidArgument(
                "Textured plane pattern needs a non-empty image".to_string(),
            )
        })?;
        self.matcher.set_reference(image);
        self.scale = scale;
        self.pattern = Some(pattern);
        Ok(())
    }

    fn find_pattern(&self, image: &DynamicImage) -> Result<DetectionResult, CalibrationError> {
        let pattern = self
            .pattern
            .clone()
            .ok_or_else(|| missing_pattern(self.kind()))?;

        let Some((matches, homography)) = self.matcher.match_features(&image.to_luma8()) else {
            return Ok(DetectionResult::not_found(pattern, self.kind()));
        };

        let (image_points, model_points): (Vec<Point2>, Vec<Point3>) = matches
            .iter()
            .filter(|m| {
                apply_homography(&homography, &m.reference_point)
                    .map(|p| (p - m.image_point).norm_squared() < INLIER_DISTANCE_SQUARED)
                    .unwrap_or(false)
            })
            .map(|m| (m.image_point, self.model_point(&m.reference_point)))
            .unzip();
        debug!("{} of {} feature matches are inliers", image_points.len(), matches.len());

        if image_points.len() >= 4 {
            Ok(DetectionResult::found(pattern, self.kind(), image_points, model_points))
        } else {
            Ok(DetectionResult::not_found(pattern, self.kind()))
        }
    }
}
