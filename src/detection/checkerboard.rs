use crate::calibration::CalibrationError;
use crate::detection::{missing_pattern, DetectionResult, DetectorKind, PatternDetector};
use crate::geometry::Point2;
use crate::pattern::Pattern;
use image::{DynamicImage, GrayImage};
use imageproc::contrast::equalize_histogram;
use log::debug;
use std::sync::Arc;

/// Chessboard inner corner extraction.
pub trait CornerFinder {
    /// Returns the inner corners of a `corners_x` by `corners_y` board in
    /// row-major order, or `None` if the board was not found.
    fn find_corners(
        &self,
        image: &GrayImage,
        corners_x: usize,
        corners_y: usize,
    ) -> Option<Vec<Point2>>;
}

/// Detects [`crate::pattern::CheckerBoardPattern`] targets through a [`CornerFinder`].
pub struct CheckerBoardDetector {
    finder: Box<dyn CornerFinder + Send + Sync>,
    pattern: Option<Arc<Pattern>>,
}

impl CheckerBoardDetector {
    pub fn new(finder: Box<dyn CornerFinder + Send + Sync>) -> Self {
        CheckerBoardDetector {
            finder,
            pattern: None,
        }
    }
}

impl PatternDetector for CheckerBoardDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::CheckerBoard
    }

    fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.pattern.as_ref()
    }

    fn set_pattern(&mut self, pattern: Arc<Pattern>) -> Result<(), CalibrationError> {
        self.kind().ensure_supports(&pattern)?;
        self.pattern = Some(pattern);
        Ok(())
    }

    fn find_pattern(&self, image: &DynamicImage) -> Result<DetectionResult, CalibrationError> {
        let pattern = self
            .pattern
            .clone()
            .ok_or_else(|| missing_pattern(self.kind()))?;
        let Some(board) = pattern.as_checkerboard() else {
            return Err(missing_pattern(self.kind()));
        };
        let (corners_x, corners_y) = (board.corners_x(), board.corners_y());

        let gray = equalize_histogram(&image.to_luma8());
        match self.finder.find_corners(&gray, corners_x, corners_y) {
            Some(corners) if corners.len() == board.corner_count() => {
                let model_points = board.model_points().to_vec();
                Ok(DetectionResult::found(pattern, self.kind(), corners, model_points))
            }
            Some(corners) => {
                debug!(
                    "Corner finder returned {} corners, expected {}",
                    corners.len(),
                    board.corner_count()
                );
                Ok(DetectionResult::not_found(pattern, self.kind()))
            }
            None => Ok(DetectionResult::not_found(pattern, self.kind())),
        }
    }
}
