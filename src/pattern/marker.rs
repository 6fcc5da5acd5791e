use crate::geometry::Point3;
use image::GrayImage;

/// Square fiducial marker of side `length`, optionally carrying its reference image.
///
/// Model points are the four corners in order top-left, top-right,
/// bottom-right, bottom-left: `(0,0,0), (L,0,0), (L,L,0), (0,L,0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPattern {
    length: f64,
    image: Option<GrayImage>,
    model_points: Vec<Point3>,
}

impl MarkerPattern {
    pub fn new(length: f64) -> Self {
        let mut pattern = MarkerPattern {
            length,
            image: None,
            model_points: Vec::new(),
        };
        pattern.update_model_points();
        pattern
    }

    pub fn with_image(length: f64, image: GrayImage) -> Self {
        let mut pattern = MarkerPattern::new(length);
        pattern.image = Some(image);
        pattern
    }

    pub fn marker_length(&self) -> f64 {
        self.length
    }

    pub fn set_marker_length(&mut self, length: f64) {
        self.length = length;
        self.update_model_points();
    }

    /// Reference image matched against candidate quadrilaterals.
    pub fn marker_image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    pub fn set_marker_image(&mut self, image: GrayImage) {
        self.image = Some(image);
    }

    pub fn model_points(&self) -> &[Point3] {
        &self.model_points
    }

    fn update_model_points(&mut self) {
        let l = self.length;
        self.model_points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(l, 0.0, 0.0),
            Point3::new(l, l, 0.0),
            Point3::new(0.0, l, 0.0),
        ];
    }
}

impl Default for MarkerPattern {
    fn default() -> Self {
        MarkerPattern::new(10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_model_points() {
        let pattern = MarkerPattern::default();
        assert_eq!(pattern.marker_length(), 10.0);
        assert_eq!(
            pattern.model_points(),
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(10.0, 10.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
            ]
        );
        assert!(pattern.marker_image().is_none());
    }

    #[test]
    fn test_marker_setters() {
        let mut pattern = MarkerPattern::new(4.0);
        pattern.set_marker_length(2.5);
        assert_eq!(pattern.model_points()[2], Point3::new(2.5, 2.5, 0.0));

        pattern.set_marker_image(GrayImage::new(8, 8));
        assert_eq!(pattern.marker_image().map(|i| i.dimensions()), Some((8, 8)));
    }
}
