//! Square fiducial marker detection.
//!
//! The image is binarized so that dark marker borders become foreground and
//! its contours are extracted. Every contour that simplifies to a large
//! quadrilateral is a marker candidate. A candidate is unwarped to the size
//! of the reference marker and compared against it in all four orientations
//! with a normalized sum of squared differences. The candidate with the
//! smallest error below `max_error_normed` wins, and the winning orientation
//! fixes the order of the reported corners.

use crate::calibration::CalibrationError;
use crate::detection::{missing_pattern, DetectionResult, DetectorKind, PatternDetector};
use crate::geometry::Point2;
use crate::io::IoError;
use crate::pattern::Pattern;
use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tuning parameters of [`MarkerDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorConfig {
    /// Gray level at or below which a pixel counts as black when Otsu is off.
    pub binary_threshold: u8,
    /// Largest accepted normalized template matching error.
    pub max_error_normed: f32,
    /// Pick the threshold per image with Otsu's method.
    pub use_otsu: bool,
    /// Smallest accepted quadrilateral perimeter in pixels.
    pub min_perimeter: f64,
    /// Polygon approximation tolerance relative to the contour perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for MarkerDetectorConfig {
    fn default() -> Self {
        MarkerDetectorConfig {
            binary_threshold: 60,
            max_error_normed: 0.4,
            use_otsu: true,
            min_perimeter: 200.0,
            approx_epsilon_ratio: 0.05,
        }
    }
}

impl MarkerDetectorConfig {
    pub fn load_from_yaml(path: &str) -> Result<Self, IoError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    fn binarize(&self, image: &GrayImage, threshold_type: ThresholdType) -> GrayImage {
        let level = if self.use_otsu {
            otsu_level(image)
        } else {
            self.binary_threshold
        };
        threshold(image, level, threshold_type)
    }
}

/// Best marker candidate of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerMatch {
    /// Corners in image pixels: top-left, top-right, bottom-right, bottom-left of the marker.
    pub corners: [Point2; 4],
    /// Normalized template matching error.
    pub error: f32,
    /// Number of clockwise quarter turns applied to the unwarped patch to match the reference.
    pub orientation: usize,
}

#[derive(Debug, Clone)]
struct MarkerReference {
    binary: GrayImage,
    size: u32,
}

/// Detects [`crate::pattern::MarkerPattern`] targets.
#[derive(Debug, Clone, Default)]
pub struct MarkerDetector {
    config: MarkerDetectorConfig,
    pattern: Option<Arc<Pattern>>,
    reference: Option<MarkerReference>,
}

impl MarkerDetector {
    pub fn new(config: MarkerDetectorConfig) -> Self {
        MarkerDetector {
            config,
            pattern: None,
            reference: None,
        }
    }

    pub fn with_pattern(
        config: MarkerDetectorConfig,
        pattern: Arc<Pattern>,
    ) -> Result<Self, CalibrationError> {
        let mut detector = MarkerDetector::new(config);
        detector.set_pattern(pattern)?;
        Ok(detector)
    }

    pub fn config(&self) -> &MarkerDetectorConfig {
        &self.config
    }

    /// Replaces the configuration and re-binarizes the reference marker.
    pub fn set_config(&mut self, config: MarkerDetectorConfig) -> Result<(), CalibrationError> {
        let reference = match &self.pattern {
            Some(pattern) => Some(build_reference(&config, pattern)?),
            None => None,
        };
        self.config = config;
        self.reference = reference;
        Ok(())
    }

    /// Finds the best matching marker quadrilateral in `image`.
    ///
    /// Returns `Ok(None)` when no candidate matches well enough.
    pub fn find_marker(&self, image: &GrayImage) -> Result<Option<MarkerMatch>, CalibrationError> {
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| missing_pattern(self.kind()))?;

        let binary = self.config.binarize(image, ThresholdType::BinaryInverted);
        let contours = find_contours::<i32>(&binary);
        debug!("Marker search over {} contours", contours.len());

        let n = reference.size as f32;
        let destination = [(0.0, 0.0), (0.0, n), (n, n), (n, 0.0)];
        let mut warped = GrayImage::new(reference.size, reference.size);
        let mut best: Option<MarkerMatch> = None;
        let mut best_error = self.config.max_error_normed;

        for contour in &contours {
            let Some(quad) = approximate_quad(&contour.points, &self.config) else {
                continue;
            };
            let source = quad.map(|p| (p.x as f32, p.y as f32));
            let Some(projection) = Projection::from_control_points(source, destination) else {
                continue;
            };
            warp_into(image, &projection, Interpolation::Bicubic, Luma([0]), &mut warped);
            let patch = self.config.binarize(&warped, ThresholdType::Binary);

            let Some((error, orientation)) = match_orientations(&patch, &reference.binary) else {
                continue;
            };
            debug!("Marker candidate error {:.4} orientation {}", error, orientation);

            if error < best_error {
                best_error = error;
                let k = orientation;
                best = Some(MarkerMatch {
                    corners: [quad[k], quad[(k + 3) % 4], quad[(k + 2) % 4], quad[(k + 1) % 4]],
                    error,
                    orientation,
                });
            }
        }
        Ok(best)
    }
}

impl PatternDetector for MarkerDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Marker
    }

    fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.pattern.as_ref()
    }

    fn set_pattern(&mut self, pattern: Arc<Pattern>) -> Result<(), CalibrationError> {
        self.kind().ensure_supports(&pattern)?;
        let reference = build_reference(&self.config, &pattern)?;
        self.pattern = Some(pattern);
        self.reference = Some(reference);
        Ok(())
    }

    fn find_pattern(&self, image: &DynamicImage) -> Result<DetectionResult, CalibrationError> {
        let pattern = self
            .pattern
            .clone()
            .ok_or_else(|| missing_pattern(self.kind()))?;
        let gray = image.to_luma8();
        Ok(match self.find_marker(&gray)? {
            Some(found) => {
                let model_points = pattern.model_points().to_vec();
                DetectionResult::found(pattern, self.kind(), found.corners.to_vec(), model_points)
            }
            None => DetectionResult::not_found(pattern, self.kind()),
        })
    }
}

fn build_reference(
    config: &MarkerDetectorConfig,
    pattern: &Pattern,
) -> Result<MarkerReference, CalibrationError> {
    let image = pattern
        .as_marker()
        .and_then(|marker| marker.marker_image())
        .ok_or_else(|| {
            CalibrationError::InvalidArgument("Marker pattern has no marker image".to_string())
        })?;
    let (width, height) = image.dimensions();
    if width != height || width == 0 {
        return Err(CalibrationError::InvalidArgument(format!(
            "Marker image must be square and non-empty, got {}x{}",
            width, height
        )));
    }
    Ok(MarkerReference {
        binary: config.binarize(image, ThresholdType::Binary),
        size: width,
    })
}

/// Simplifies a contour to a quadrilateral in screen order top-left,
/// bottom-left, bottom-right, top-right starting at the top-left-most vertex.
fn approximate_quad(points: &[Point<i32>], config: &MarkerDetectorConfig) -> Option<[Point2; 4]> {
    if points.len() < 4 {
        return None;
    }
    let perimeter = arc_length(points, true);
    let epsilon = config.approx_epsilon_ratio * perimeter;
    if !(epsilon > 0.0) {
        return None;
    }

    // Start on the vertex farthest from the centroid so the closing point
    // dropped by the simplification is never a corner.
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x as f64, y + p.y as f64));
    let (mx, my) = (sx / n, sy / n);
    let start = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (a.x as f64 - mx).powi(2) + (a.y as f64 - my).powi(2);
            let db = (b.x as f64 - mx).powi(2) + (b.y as f64 - my).powi(2);
            da.total_cmp(&db)
        })
        .map(|(i, _)| i)?;
    let mut curve = points[start..].to_vec();
    curve.extend_from_slice(&points[..start]);

    let mut polygon: Vec<Point2> = approximate_polygon_dp(&curve, epsilon, true)
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    polygon.dedup();
    remove_collinear(&mut polygon, epsilon);

    if polygon.len() != 4 {
        return None;
    }
    let polygon_perimeter: f64 = (0..4)
        .map(|i| (polygon[(i + 1) % 4] - polygon[i]).norm())
        .sum();
    if polygon_perimeter < config.min_perimeter {
        return None;
    }

    let shoelace: f64 = (0..4)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % 4]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    if shoelace > 0.0 {
        polygon.reverse();
    }
    let first = (0..4)
        .min_by(|&a, &b| {
            (polygon[a].x + polygon[a].y).total_cmp(&(polygon[b].x + polygon[b].y))
        })
        .unwrap_or(0);
    polygon.rotate_left(first);

    Some([polygon[0], polygon[1], polygon[2], polygon[3]])
}

fn remove_collinear(polygon: &mut Vec<Point2>, epsilon: f64) {
    while polygon.len() > 3 {
        let len = polygon.len();
        let collinear = (0..len).find(|&i| {
            let prev = polygon[(i + len - 1) % len];
            let next = polygon[(i + 1) % len];
            distance_to_line(&polygon[i], &prev, &next) <= epsilon
        });
        match collinear {
            Some(i) => {
                polygon.remove(i);
            }
            None => break,
        }
    }
}

fn distance_to_line(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let length = ab.norm();
    if length <= f64::EPSILON {
        return (p - a).norm();
    }
    (ab.x * (p.y - a.y) - ab.y * (p.x - a.x)).abs() / length
}

/// Matches the patch rotated by 0, 1, 2 and 3 clockwise quarter turns against
/// the reference and returns the smallest error with its turn count.
fn match_orientations(patch: &GrayImage, reference: &GrayImage) -> Option<(f32, usize)> {
    let rotations = [
        patch.clone(),
        imageops::rotate90(patch),
        imageops::rotate180(patch),
        imageops::rotate270(patch),
    ];
    rotations
        .iter()
        .enumerate()
        .filter_map(|(orientation, rotated)| {
            let scores =
                match_template(rotated, reference, MatchTemplateMethod::SumOfSquaredErrorsNormalized);
            let error = scores.get_pixel(0, 0)[0];
            error.is_finite().then_some((error, orientation))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
}
