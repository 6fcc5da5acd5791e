//! Model-to-image point correspondences, grouped by view.
//!
//! A [`SingleViewCorrespondence`] pairs the image points observed in one
//! picture with the model points they correspond to, index by index. A
//! [`MultiViewCorrespondences`] is the ordered list of views fed to the
//! calibration engine.

use crate::calibration::CalibrationError;
use crate::detection::DetectionResult;
use crate::geometry::{Point2, Point3};

/// Index-aligned image and model points of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleViewCorrespondence {
    image_points: Vec<Point2>,
    model_points: Vec<Point3>,
}

impl SingleViewCorrespondence {
    /// # Errors
    ///
    /// [`CalibrationError::InvalidArgument`] if the two sequences differ in length.
    pub fn new(
        image_points: Vec<Point2>,
        model_points: Vec<Point3>,
    ) -> Result<Self, CalibrationError> {
        if image_points.len() != model_points.len() {
            return Err(CalibrationError::InvalidArgument(format!(
                "Image and model point counts differ: {} vs {}",
                image_points.len(),
                model_points.len()
            )));
        }
        Ok(SingleViewCorrespondence {
            image_points,
            model_points,
        })
    }

    pub fn image_points(&self) -> &[Point2] {
        &self.image_points
    }

    pub fn model_points(&self) -> &[Point3] {
        &self.model_points
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }

    /// Iterates over `(image_point, model_point)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&Point2, &Point3)> {
        self.image_points.iter().zip(self.model_points.iter())
    }
}

impl From<SingleViewCorrespondence> for MultiViewCorrespondences {
    fn from(view: SingleViewCorrespondence) -> Self {
        MultiViewCorrespondences { views: vec![view] }
    }
}

/// Ordered collection of single-view correspondences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiViewCorrespondences {
    views: Vec<SingleViewCorrespondence>,
}

impl MultiViewCorrespondences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one view.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::InvalidArgument`] if the point counts differ; the
    /// collection is left unchanged.
    pub fn add_view(
        &mut self,
        image_points: Vec<Point2>,
        model_points: Vec<Point3>,
    ) -> Result<(), CalibrationError> {
        let view = SingleViewCorrespondence::new(image_points, model_points)?;
        self.views.push(view);
        Ok(())
    }

    /// Appends the points of a successful detection; failed detections are ignored.
    pub fn add_view_from_detection(
        &mut self,
        detection: &DetectionResult,
    ) -> Result<(), CalibrationError> {
        if !detection.success() {
            return Ok(());
        }
        self.add_view(
            detection.image_points().to_vec(),
            detection.model_points().to_vec(),
        )
    }

    pub fn push_view(&mut self, view: SingleViewCorrespondence) {
        self.views.push(view);
    }

    /// Appends every view of `other`.
    pub fn extend(&mut self, other: MultiViewCorrespondences) {
        self.views.extend(other.views);
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }

    /// Total number of point pairs over all views.
    pub fn correspondence_count(&self) -> usize {
        self.views.iter().map(SingleViewCorrespondence::len).sum()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn views(&self) -> &[SingleViewCorrespondence] {
        &self.views
    }

    pub fn view(&self, index: usize) -> Option<&SingleViewCorrespondence> {
        self.views.get(index)
    }

    /// Image points of every view, aligned with [`Self::model_points`].
    pub fn image_points(&self) -> Vec<Vec<Point2>> {
        self.views.iter().map(|v| v.image_points.clone()).collect()
    }

    /// Model points of every view, aligned with [`Self::image_points`].
    pub fn model_points(&self) -> Vec<Vec<Point3>> {
        self.views.iter().map(|v| v.model_points.clone()).collect()
    }
}
