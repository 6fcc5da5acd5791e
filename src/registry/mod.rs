//! Name-based lookup of patterns, detectors and result formats.
//!
//! A [`Registry`] maps string identifiers to factory functions. Front ends
//! that let a user choose components by name build one with
//! [`Registry::with_defaults`] and add their own with the `register_*` calls.

use crate::calibration::{CalibrationError, CalibrationResult};
use crate::detection::{DetectorKind, MarkerDetector, PatternDetector};
use crate::io::{native, opencv, text, IoError};
use crate::pattern::{CheckerBoardPattern, MarkerPattern, Pattern, TexturedPlanePattern};
use log::debug;
use std::collections::BTreeMap;

pub type PatternFactory = Box<dyn Fn() -> Pattern + Send + Sync>;
pub type DetectorFactory = Box<dyn Fn() -> Box<dyn PatternDetector + Send + Sync> + Send + Sync>;
pub type ExportFn = fn(&CalibrationResult) -> Result<String, IoError>;
pub type ImportFn = fn(&str) -> Result<CalibrationResult, IoError>;

struct DetectorEntry {
    kind: DetectorKind,
    factory: DetectorFactory,
}

/// Result format with an optional reader; text reports cannot be read back.
#[derive(Clone, Copy)]
pub struct ResultFormat {
    pub export: ExportFn,
    pub import: Option<ImportFn>,
}

#[derive(Default)]
pub struct Registry {
    patterns: BTreeMap<String, PatternFactory>,
    detectors: BTreeMap<String, DetectorEntry>,
    formats: BTreeMap<String, ResultFormat>,
}

fn full_text_report(result: &CalibrationResult) -> Result<String, IoError> {
    text::pretty_print(result, true, true)
}

fn unknown(category: &str, name: &str) -> CalibrationError {
    CalibrationError::InvalidArgument(format!("No {category} registered under '{name}'"))
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in patterns, the marker detector and the
    /// `json`, `opencv` and `text` result formats.
    ///
    /// Checkerboard and textured plane detectors depend on an external
    /// corner finder or feature matcher and are registered by the caller.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        registry.register_pattern("checkerboard", || Pattern::from(CheckerBoardPattern::default()));
        registry.register_pattern("marker", || Pattern::from(MarkerPattern::default()));
        registry.register_pattern("textured_plane", || {
            Pattern::from(TexturedPlanePattern::default())
        });
        registry.register_detector("marker", DetectorKind::Marker, || {
            Box::new(MarkerDetector::default())
        });
        registry.register_format(
            "json",
            ResultFormat {
                export: native::to_string,
                import: Some(native::from_str),
            },
        );
        registry.register_format(
            "opencv",
            ResultFormat {
                export: opencv::to_string,
                import: Some(opencv::from_str),
            },
        );
        registry.register_format(
            "text",
            ResultFormat {
                export: full_text_report,
                import: None,
            },
        );
        registry
    }

    pub fn register_pattern<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Pattern + Send + Sync + 'static,
    {
        debug!("Registering pattern '{name}'");
        self.patterns.insert(name.to_string(), Box::new(factory));
    }

    /// Registers a detector factory; `kind` must match what the factory builds.
    pub fn register_detector<F>(&mut self, name: &str, kind: DetectorKind, factory: F)
    where
        F: Fn() -> Box<dyn PatternDetector + Send + Sync> + Send + Sync + 'static,
    {
        debug!("Registering {kind} detector '{name}'");
        self.detectors.insert(
            name.to_string(),
            DetectorEntry {
                kind,
                factory: Box::new(factory),
            },
        );
    }

    pub fn register_format(&mut self, name: &str, format: ResultFormat) {
        debug!("Registering result format '{name}'");
        self.formats.insert(name.to_string(), format);
    }

    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn detector_names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    pub fn format_names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }

    pub fn create_pattern(&self, name: &str) -> Result<Pattern, CalibrationError> {
        self.patterns
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| unknown("pattern", name))
    }

    pub fn create_detector(
        &self,
        name: &str,
    ) -> Result<Box<dyn PatternDetector + Send + Sync>, CalibrationError> {
        self.detectors
            .get(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| unknown("detector", name))
    }

    pub fn format(&self, name: &str) -> Result<ResultFormat, CalibrationError> {
        self.formats
            .get(name)
            .copied()
            .ok_or_else(|| unknown("result format", name))
    }

    /// Names of the registered detectors able to locate `pattern`.
    pub fn detectors_supporting(&self, pattern: &Pattern) -> Vec<&str> {
        self.detectors
            .iter()
            .filter(|(_, entry)| entry.kind.supports(pattern.kind()))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Distortion, Extrinsics, Intrinsics, PinholeCamera, Resolution};
    use crate::detection::{CheckerBoardDetector, CornerFinder};
    use crate::geometry::Point2;
    use crate::pattern::PatternKind;
    use image::GrayImage;
    use std::sync::Arc;

    struct NoCorners;

    impl CornerFinder for NoCorners {
        fn find_corners(&self, _: &GrayImage, _: usize, _: usize) -> Option<Vec<Point2>> {
            None
        }
    }

    #[test]
    fn test_defaults_create_every_pattern() {
        let registry = Registry::with_defaults();
        let names: Vec<&str> = registry.pattern_names().collect();
        assert_eq!(names, ["checkerboard", "marker", "textured_plane"]);
        for name in names {
            let pattern = registry.create_pattern(name).unwrap();
            assert_eq!(pattern.kind().name(), name);
        }
    }

    #[test]
    fn test_defaults_create_marker_detector() {
        let registry = Registry::with_defaults();
        let mut detector = registry.create_detector("marker").unwrap();
        assert_eq!(detector.kind(), DetectorKind::Marker);

        // The default marker pattern has no image to match against yet.
        let bare = Arc::new(registry.create_pattern("marker").unwrap());
        assert!(matches!(
            detector.set_pattern(bare),
            Err(CalibrationError::InvalidArgument(_))
        ));

        let image = GrayImage::from_pixel(20, 20, image::Luma([255]));
        let pattern = Arc::new(Pattern::from(MarkerPattern::with_image(10.0, image)));
        assert!(detector.set_pattern(pattern).is_ok());
    }

    #[test]
    fn test_unknown_names_rejected() {
        let registry = Registry::with_defaults();
        assert!(matches!(
            registry.create_pattern("circles"),
            Err(CalibrationError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.create_detector("sift"),
            Err(CalibrationError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.format("xml"),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_registered_detector_and_support_lookup() {
        let mut registry = Registry::with_defaults();
        registry.register_detector("checkerboard", DetectorKind::CheckerBoard, || {
            Box::new(CheckerBoardDetector::new(Box::new(NoCorners)))
        });
        let checkerboard = registry.create_pattern("checkerboard").unwrap();
        assert_eq!(checkerboard.kind(), PatternKind::CheckerBoard);
        assert_eq!(registry.detectors_supporting(&checkerboard), ["checkerboard"]);

        let marker = registry.create_pattern("marker").unwrap();
        assert_eq!(registry.detectors_supporting(&marker), ["marker"]);

        let textured = registry.create_pattern("textured_plane").unwrap();
        assert!(registry.detectors_supporting(&textured).is_empty());
    }

    #[test]
    fn test_formats_round_trip() {
        let registry = Registry::with_defaults();
        let camera = PinholeCamera::new(
            Intrinsics::default(),
            Distortion::default(),
            Resolution::new(640, 480),
        )
        .unwrap();
        let result = CalibrationResult::new(camera, vec![Extrinsics::identity()], 0.5);

        for name in ["json", "opencv"] {
            let format = registry.format(name).unwrap();
            let contents = (format.export)(&result).unwrap();
            let import = format.import.unwrap();
            assert_eq!(import(&contents).unwrap().camera, result.camera);
        }

        let text = registry.format("text").unwrap();
        assert!(text.import.is_none());
        assert!((text.export)(&result).unwrap().starts_with("Intrinsic Calibration"));
    }
}
