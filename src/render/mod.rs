//! Overlays for detection and calibration results.
//!
//! Renderers are strategies handed to the caller's drawing code; results
//! never own one. All drawing goes through `imageproc::drawing` and clips at
//! the image border.

use crate::calibration::{self, CalibrationError, CalibrationResult};
use crate::detection::DetectionResult;
use crate::geometry::{Point2, Point3};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

pub const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
pub const RED: Rgb<u8> = Rgb([220, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

pub trait DetectionRenderer {
    fn render(&self, canvas: &mut RgbImage, detection: &DetectionResult);
}

pub trait CalibrationRenderer {
    /// Draws view `view` of `result` onto `canvas`.
    fn render(
        &self,
        canvas: &mut RgbImage,
        result: &CalibrationResult,
        view: usize,
    ) -> Result<(), CalibrationError>;
}

fn status_color(detection: &DetectionResult) -> Rgb<u8> {
    if detection.success() {
        GREEN
    } else {
        RED
    }
}

/// Draws a segment `thickness` pixels wide by stacking offset lines.
fn draw_thick_line(canvas: &mut RgbImage, from: &Point2, to: &Point2, thickness: u32, color: Rgb<u8>) {
    let half = thickness as f32 / 2.0;
    let (dx, dy) = ((to.x - from.x) as f32, (to.y - from.y) as f32);
    let along_x = dx.abs() >= dy.abs();
    for k in 0..thickness.max(1) {
        let offset = k as f32 - half + 0.5;
        let (ox, oy) = if along_x { (0.0, offset) } else { (offset, 0.0) };
        draw_line_segment_mut(
            canvas,
            (from.x as f32 + ox, from.y as f32 + oy),
            (to.x as f32 + ox, to.y as f32 + oy),
            color,
        );
    }
}

/// Circles every image point, green on success and red otherwise.
#[derive(Debug, Clone, Copy)]
pub struct PointRenderer {
    pub radius: i32,
}

impl Default for PointRenderer {
    fn default() -> Self {
        PointRenderer { radius: 4 }
    }
}

impl DetectionRenderer for PointRenderer {
    fn render(&self, canvas: &mut RgbImage, detection: &DetectionResult) {
        let color = status_color(detection);
        for point in detection.image_points() {
            if !(point.x.is_finite() && point.y.is_finite()) {
                continue;
            }
            let center = (point.x.round() as i32, point.y.round() as i32);
            draw_hollow_circle_mut(canvas, center, self.radius, color);
            draw_hollow_circle_mut(canvas, center, self.radius + 1, color);
        }
    }
}

/// Frames the whole image, green on success and red otherwise.
#[derive(Debug, Clone, Copy)]
pub struct BorderRenderer {
    pub width: u32,
}

impl Default for BorderRenderer {
    fn default() -> Self {
        BorderRenderer { width: 5 }
    }
}

impl DetectionRenderer for BorderRenderer {
    fn render(&self, canvas: &mut RgbImage, detection: &DetectionResult) {
        let color = status_color(detection);
        let (w, h) = canvas.dimensions();
        for inset in 0..self.width.min(w / 2).min(h / 2) {
            let rect = Rect::at(inset as i32, inset as i32).of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

/// Projects the model coordinate axes of one view: x red, y green, z blue.
///
/// Each axis is `0.4 * min(width, height)` model units long.
#[derive(Debug, Clone, Copy)]
pub struct AxisRenderer {
    pub thickness: u32,
}

impl Default for AxisRenderer {
    fn default() -> Self {
        AxisRenderer { thickness: 2 }
    }
}

impl AxisRenderer {
    /// Pixel positions of the origin and the three axis tips.
    pub fn axis_points(
        canvas_size: (u32, u32),
        result: &CalibrationResult,
        view: usize,
    ) -> Result<[Point2; 4], CalibrationError> {
        let pose = result.extrinsics.get(view).ok_or_else(|| {
            CalibrationError::InvalidArgument(format!(
                "View {} out of range, result has {} views",
                view,
                result.extrinsics.len()
            ))
        })?;
        let extension = canvas_size.0.min(canvas_size.1) as f64 * 0.4;
        let axes = [
            Point3::origin(),
            Point3::new(extension, 0.0, 0.0),
            Point3::new(0.0, extension, 0.0),
            Point3::new(0.0, 0.0, extension),
        ];
        let projected = calibration::project(&axes, pose, &result.camera);
        Ok([projected[0], projected[1], projected[2], projected[3]])
    }
}

impl CalibrationRenderer for AxisRenderer {
    fn render(
        &self,
        canvas: &mut RgbImage,
        result: &CalibrationResult,
        view: usize,
    ) -> Result<(), CalibrationError> {
        let [origin, x, y, z] = AxisRenderer::axis_points(canvas.dimensions(), result, view)?;
        for (tip, color) in [(x, RED), (y, GREEN), (z, BLUE)] {
            let finite = [origin.x, origin.y, tip.x, tip.y].iter().all(|v| v.is_finite());
            if finite {
                draw_thick_line(canvas, &origin, &tip, self.thickness, color);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Distortion, Extrinsics, Intrinsics, PinholeCamera, Resolution};
    use crate::detection::DetectorKind;
    use crate::pattern::{CheckerBoardPattern, Pattern};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn checkerboard() -> Arc<Pattern> {
        Arc::new(Pattern::CheckerBoard(CheckerBoardPattern::new(2, 2, 10.0)))
    }

    #[test]
    fn test_point_renderer_colors() {
        let pattern = checkerboard();
        let model = pattern.model_points();
        let found = DetectionResult::found(
            pattern.clone(),
            DetectorKind::CheckerBoard,
            vec![Point2::new(10.0, 10.0), Point2::new(30.0, 10.0)],
            model[..2].to_vec(),
        );
        let mut canvas = RgbImage::new(40, 40);
        PointRenderer::default().render(&mut canvas, &found);
        assert_eq!(*canvas.get_pixel(14, 10), GREEN);
        assert_eq!(*canvas.get_pixel(10, 10), Rgb([0, 0, 0]));

        let missed = DetectionResult::not_found(pattern, DetectorKind::CheckerBoard);
        let mut canvas = RgbImage::new(40, 40);
        PointRenderer::default().render(&mut canvas, &missed);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_border_renderer() {
        let missed = DetectionResult::not_found(checkerboard(), DetectorKind::CheckerBoard);
        let mut canvas = RgbImage::new(20, 20);
        BorderRenderer::default().render(&mut canvas, &missed);
        assert_eq!(*canvas.get_pixel(0, 0), RED);
        assert_eq!(*canvas.get_pixel(4, 10), RED);
        assert_eq!(*canvas.get_pixel(5, 10), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(19, 19), RED);
    }

    #[test]
    fn test_axis_renderer() {
        let camera = PinholeCamera::new(
            Intrinsics {
                fx: 100.0,
                fy: 100.0,
                cx: 50.0,
                cy: 50.0,
            },
            Distortion::default(),
            Resolution::new(100, 100),
        )
        .unwrap();
        let pose = Extrinsics::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 400.0));
        let result = CalibrationResult::new(camera, vec![pose], 0.1);

        let [origin, x, y, _] = AxisRenderer::axis_points((100, 100), &result, 0).unwrap();
        assert_relative_eq!(origin, Point2::new(50.0, 50.0), epsilon = 1e-9);
        assert_relative_eq!(x, Point2::new(60.0, 50.0), epsilon = 1e-9);
        assert_relative_eq!(y, Point2::new(50.0, 60.0), epsilon = 1e-9);

        let mut canvas = RgbImage::new(100, 100);
        AxisRenderer::default().render(&mut canvas, &result, 0).unwrap();
        assert_eq!(*canvas.get_pixel(55, 50), RED);
        assert_eq!(*canvas.get_pixel(50, 55), GREEN);

        assert!(matches!(
            AxisRenderer::default().render(&mut canvas, &result, 1),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }
}
