//! Calibration targets and their model points.
//!
//! [`Pattern`] is a closed set of target descriptions. Each variant owns its
//! shape parameters and regenerates its model points as soon as a parameter
//! changes. Detectors keep an `Arc<Pattern>` snapshot; after changing a
//! pattern hand the new value to the detector with
//! [`crate::detection::PatternDetector::set_pattern`].

use crate::geometry::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod checkerboard;
pub mod marker;
pub mod textured;

pub use checkerboard::CheckerBoardPattern;
pub use marker::MarkerPattern;
pub use textured::TexturedPlanePattern;

/// Discriminant of [`Pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    CheckerBoard,
    Marker,
    TexturedPlane,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::CheckerBoard => "checkerboard",
            PatternKind::Marker => "marker",
            PatternKind::TexturedPlane => "textured_plane",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A calibration target.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    CheckerBoard(CheckerBoardPattern),
    Marker(MarkerPattern),
    TexturedPlane(TexturedPlanePattern),
}

impl Pattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::CheckerBoard(_) => PatternKind::CheckerBoard,
            Pattern::Marker(_) => PatternKind::Marker,
            Pattern::TexturedPlane(_) => PatternKind::TexturedPlane,
        }
    }

    /// Model points of the target.
    ///
    /// Empty for textured planes, whose model points are produced per
    /// detection from the matched features.
    pub fn model_points(&self) -> &[Point3] {
        match self {
            Pattern::CheckerBoard(p) => p.model_points(),
            Pattern::Marker(p) => p.model_points(),
            Pattern::TexturedPlane(_) => &[],
        }
    }

    pub fn as_checkerboard(&self) -> Option<&CheckerBoardPattern> {
        match self {
            Pattern::CheckerBoard(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_marker(&self) -> Option<&MarkerPattern> {
        match self {
            Pattern::Marker(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_textured_plane(&self) -> Option<&TexturedPlanePattern> {
        match self {
            Pattern::TexturedPlane(p) => Some(p),
            _ => None,
        }
    }
}

impl From<CheckerBoardPattern> for Pattern {
    fn from(pattern: CheckerBoardPattern) -> Self {
        Pattern::CheckerBoard(pattern)
    }
}

impl From<MarkerPattern> for Pattern {
    fn from(pattern: MarkerPattern) -> Self {
        Pattern::Marker(pattern)
    }
}

impl From<TexturedPlanePattern> for Pattern {
    fn from(pattern: TexturedPlanePattern) -> Self {
        Pattern::TexturedPlane(pattern)
    }
}
