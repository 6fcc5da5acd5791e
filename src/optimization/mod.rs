//! The `optimization` module refines calibration parameters with
//! Levenberg-Marquardt.
//!
//! This module defines the [`Optimizer`] trait, the common interface of the
//! two calibration problems solved by the crate:
//!
//! * [`IntrinsicCalibrationCost`]: camera intrinsics, distortion and one pose
//!   per view, jointly.
//! * [`PoseEstimationCost`]: the pose of a single view for a known camera.
//!
//! Both follow the same two steps: a closed-form [`Optimizer::linear_estimation`]
//! that seeds the parameters, then [`Optimizer::optimize`], which minimizes the
//! pixel reprojection error with `tiny_solver`.

use serde::{Deserialize, Serialize};
use tiny_solver::OptimizerOptions;

mod factors;
pub mod intrinsic;
pub mod pose;

pub use intrinsic::IntrinsicCalibrationCost;
pub use pose::PoseEstimationCost;

use crate::calibration::CalibrationError;
use crate::camera::{Intrinsics, Resolution};

/// Statistics of per-point reprojection distances in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl ProjectionError {
    /// Summarizes a set of point distances. `None` for an empty set.
    pub fn from_distances(distances: &[f64]) -> Option<Self> {
        if distances.is_empty() {
            return None;
        }
        let n = distances.len() as f64;
        let mut sorted = distances.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = sorted.iter().sum::<f64>() / n;
        let rmse = (sorted.iter().map(|d| d * d).sum::<f64>() / n).sqrt();
        let variance = sorted.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) * 0.5
        } else {
            sorted[mid]
        };

        Some(ProjectionError {
            rmse,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            stddev: variance.sqrt(),
            median,
        })
    }
}

/// Levenberg-Marquardt settings shared by both calibration problems.
///
/// The solver's defaults stop once the squared error drops by less than
/// `1e-5` per iteration, which leaves noise-free data at a few micro pixels.
/// These thresholds let it run down to numerical precision instead.
pub(crate) fn solver_options() -> OptimizerOptions {
    OptimizerOptions {
        max_iteration: 500,
        min_abs_error_decrease_threshold: 1e-20,
        min_rel_error_decrease_threshold: 1e-14,
        min_error_threshold: 1e-20,
        ..OptimizerOptions::default()
    }
}

/// A trait for calibration optimization tasks.
///
/// Types implementing `Optimizer` own a set of correspondences and the
/// parameters being estimated from them.
pub trait Optimizer {
    /// Performs non-linear optimization to refine the parameters.
    ///
    /// # Arguments
    ///
    /// * `verbose` - If `true`, logs progress at `info` level.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the solver converged and the refined parameters are valid.
    /// * `Err(CalibrationError)` - If the solver failed or produced invalid
    ///   parameters.
    fn optimize(&mut self, verbose: bool) -> Result<(), CalibrationError>;

    /// Computes a closed-form initial guess of the parameters.
    fn linear_estimation(&mut self) -> Result<(), CalibrationError>
    where
        Self: Sized;

    /// Current camera intrinsics.
    fn get_intrinsics(&self) -> Intrinsics;

    /// Image resolution the intrinsics refer to.
    fn get_resolution(&self) -> Resolution;

    /// Current distortion coefficients in OpenCV order.
    fn get_distortion(&self) -> Vec<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_error_statistics() {
        let stats = ProjectionError::from_distances(&[3.0, 1.0, 4.0, 2.0]).unwrap();
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.rmse, (30.0_f64 / 4.0).sqrt());
        assert_relative_eq!(stats.stddev, 1.25_f64.sqrt());

        assert!(ProjectionError::from_distances(&[]).is_none());
    }

    #[test]
    fn test_solver_options_tighter_than_defaults() {
        let defaults = OptimizerOptions::default();
        let options = solver_options();
        assert!(options.max_iteration > defaults.max_iteration);
        assert!(options.min_abs_error_decrease_threshold < defaults.min_abs_error_decrease_threshold);
        assert!(options.min_rel_error_decrease_threshold < defaults.min_rel_error_decrease_threshold);
        assert!(options.min_error_threshold < defaults.min_error_threshold);
    }
}
