//! Point types and the closed-form estimators used to seed the nonlinear solver.
//!
//! * [`homography`]: normalized DLT homography between two point sets.
//! * [`pose_init`]: focal length initialisation from plane homographies,
//!   plane pose from a homography and DLT pose for non-planar targets.

pub mod homography;
pub mod pose_init;

pub use homography::{apply_homography, estimate_homography};

/// An image position in pixels (or on the normalized image plane).
pub type Point2 = nalgebra::Point2<f64>;

/// A model position in target units.
pub type Point3 = nalgebra::Point3<f64>;

/// Relative tolerance for treating model points as lying on `Z = 0`.
const PLANAR_TOLERANCE: f64 = 1e-9;

/// Whether every model point lies on the `Z = 0` plane.
pub fn is_planar(points: &[Point3]) -> bool {
    let extent = points
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(1.0_f64, f64::max);
    points
        .iter()
        .all(|p| p.z.abs() <= PLANAR_TOLERANCE * extent)
}

/// Drops the `Z` coordinate of planar model points.
pub fn planar_coordinates(points: &[Point3]) -> Vec<Point2> {
    points.iter().map(|p| Point2::new(p.x, p.y)).collect()
}
