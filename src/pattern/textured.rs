use image::GrayImage;

/// Planar textured target: a reference image printed at a known physical size.
///
/// It has no fixed model points. A feature detector maps matched reference
/// pixels to model coordinates through [`TexturedPlanePattern::pixel_scale`].
#[derive(Debug, Clone, PartialEq)]
pub struct TexturedPlanePattern {
    image: Option<GrayImage>,
    size: (f64, f64),
}

impl TexturedPlanePattern {
    /// `size` is the physical `(width, height)` of the printed image.
    pub fn new(image: GrayImage, size: (f64, f64)) -> Self {
        TexturedPlanePattern {
            image: Some(image),
            size,
        }
    }

    pub fn image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: GrayImage) {
        self.image = Some(image);
    }

    pub fn size(&self) -> (f64, f64) {
        self.size
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = (width, height);
    }

    /// Model units per reference pixel along x and y.
    ///
    /// `None` without an image or when the image has a zero dimension.
    pub fn pixel_scale(&self) -> Option<(f64, f64)> {
        let image = self.image.as_ref()?;
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        Some((self.size.0 / w as f64, self.size.1 / h as f64))
    }
}

impl Default for TexturedPlanePattern {
    fn default() -> Self {
        TexturedPlanePattern {
            image: None,
            size: (1.0, 1.0),
        }
    }
}
