//! Single-view pose estimation for a calibrated camera (PnP).

use crate::calibration::CalibrationError;
use crate::camera::{Extrinsics, Intrinsics, PinholeCamera, Resolution};
use crate::correspondences::SingleViewCorrespondence;
use crate::geometry::pose_init::{pose_from_dlt, pose_from_homography};
use crate::geometry::{estimate_homography, is_planar, planar_coordinates, Point2};
use crate::optimization::factors::PoseReprojectionFactor;
use crate::optimization::{solver_options, Optimizer};

use log::{debug, info};
use nalgebra::{DVector, Matrix3, Vector2};
use std::collections::HashMap;
use tiny_solver::{LevenbergMarquardtOptimizer, Optimizer as TinySolverOptimizer};

const POSE_KEY: &str = "pose";

/// Cost for the pose of one view with intrinsics and distortion held fixed.
#[derive(Debug, Clone)]
pub struct PoseEstimationCost {
    camera: PinholeCamera,
    view: SingleViewCorrespondence,
    pose: Extrinsics,
}

impl PoseEstimationCost {
    pub fn new(camera: PinholeCamera, view: SingleViewCorrespondence) -> Self {
        PoseEstimationCost {
            camera,
            view,
            pose: Extrinsics::identity(),
        }
    }

    pub fn pose(&self) -> Extrinsics {
        self.pose
    }
}

impl Optimizer for PoseEstimationCost {
    fn optimize(&mut self, verbose: bool) -> Result<(), CalibrationError> {
        if self.view.is_empty() {
            return Err(CalibrationError::InvalidArgument(
                "Pose estimation needs at least one point".to_string(),
            ));
        }

        let factor = PoseReprojectionFactor::new(
            [
                self.camera.intrinsics.fx,
                self.camera.intrinsics.fy,
                self.camera.intrinsics.cx,
                self.camera.intrinsics.cy,
            ],
            self.camera.distortion.coefficients().to_vec(),
            &self.view,
        );
        let mut problem = tiny_solver::Problem::new();
        problem.add_residual_block(factor.residual_count(), &[POSE_KEY], Box::new(factor), None);

        let mut initial_values = HashMap::new();
        initial_values.insert(POSE_KEY.to_string(), DVector::from_vec(self.pose.to_params()));

        if verbose {
            info!("Starting pose refinement over {} points...", self.view.len());
        }

        let optimizer = LevenbergMarquardtOptimizer::default();
        let result = optimizer
            .optimize(&problem, &initial_values, Some(solver_options()))
            .ok_or_else(|| {
                CalibrationError::ComputationFailed("Pose refinement did not converge".to_string())
            })?;

        let params = result.get(POSE_KEY).ok_or_else(|| {
            CalibrationError::ComputationFailed("Solver result lacks the pose".to_string())
        })?;
        let pose = Extrinsics::from_params(params.as_slice());
        if !pose.is_finite() {
            return Err(CalibrationError::ComputationFailed(
                "Refined pose is not finite".to_string(),
            ));
        }

        if verbose {
            info!(
                "Pose refined: r=({:.4}, {:.4}, {:.4}) t=({:.4}, {:.4}, {:.4})",
                pose.rotation.x,
                pose.rotation.y,
                pose.rotation.z,
                pose.translation.x,
                pose.translation.y,
                pose.translation.z
            );
        }
        self.pose = pose;
        Ok(())
    }

    /// Initial pose from undistorted normalized image points.
    ///
    /// Planar views use the homography decomposition, others the DLT which
    /// needs at least six points.
    fn linear_estimation(&mut self) -> Result<(), CalibrationError>
    where
        Self: Sized,
    {
        if self.view.len() < 4 {
            return Err(CalibrationError::InvalidArgument(format!(
                "Pose estimation needs at least 4 points, got {}",
                self.view.len()
            )));
        }

        let normalized = self
            .view
            .image_points()
            .iter()
            .map(|p| {
                self.camera
                    .undistort_pixel(&Vector2::new(p.x, p.y))
                    .map(|n| Point2::new(n.x, n.y))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let model_points = self.view.model_points();
        self.pose = if is_planar(model_points) {
            debug!("Planar view, initialising pose from homography");
            let homography = estimate_homography(&planar_coordinates(model_points), &normalized)?;
            pose_from_homography(&Matrix3::identity(), &homography)?
        } else {
            debug!("Non-planar view, initialising pose from DLT");
            pose_from_dlt(model_points, &normalized)?
        };
        Ok(())
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.camera.intrinsics
    }

    fn get_resolution(&self) -> Resolution {
        self.camera.resolution
    }

    fn get_distortion(&self) -> Vec<f64> {
        self.camera.distortion.coefficients().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraModel, Distortion};
    use crate::geometry::Point3;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn sample_camera() -> PinholeCamera {
        PinholeCamera::new(
            Intrinsics {
                fx: 600.0,
                fy: 610.0,
                cx: 318.0,
                cy: 242.0,
            },
            Distortion::new(vec![-0.2, 0.08, 0.0005, 0.0002, -0.01]).unwrap(),
            Resolution::new(640, 480),
        )
        .unwrap()
    }

    fn observe(camera: &PinholeCamera, pose: &Extrinsics, model: Vec<Point3>) -> SingleViewCorrespondence {
        let image = model
            .iter()
            .map(|p| {
                let pixel = camera.project(&pose.transform_point(p).coords).unwrap();
                Point2::new(pixel.x, pixel.y)
            })
            .collect();
        SingleViewCorrespondence::new(image, model).unwrap()
    }

    fn assert_pose(actual: &Extrinsics, expected: &Extrinsics) {
        assert_relative_eq!(actual.rotation, expected.rotation, epsilon = 1e-6);
        assert_relative_eq!(actual.translation, expected.translation, epsilon = 1e-6);
    }

    #[test]
    fn test_planar_pose() {
        let camera = sample_camera();
        let truth = Extrinsics::new(Vector3::new(0.2, -0.3, 0.1), Vector3::new(-0.05, -0.04, 0.5));
        let model = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(0.0, 0.1, 0.0),
        ];
        let mut cost = PoseEstimationCost::new(camera.clone(), observe(&camera, &truth, model));
        cost.linear_estimation().unwrap();
        assert_pose(&cost.pose(), &truth);

        cost.optimize(false).unwrap();
        assert_pose(&cost.pose(), &truth);
    }

    #[test]
    fn test_non_planar_pose() {
        let camera = sample_camera();
        let truth = Extrinsics::new(Vector3::new(-0.1, 0.25, 0.05), Vector3::new(0.02, -0.03, 0.8));
        let model = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(0.0, 0.1, 0.0),
            Point3::new(0.0, 0.0, 0.1),
            Point3::new(0.1, 0.0, 0.1),
            Point3::new(0.05, 0.1, 0.05),
        ];
        let mut cost = PoseEstimationCost::new(camera.clone(), observe(&camera, &truth, model));
        cost.linear_estimation().unwrap();
        cost.optimize(false).unwrap();
        assert_pose(&cost.pose(), &truth);
    }

    #[test]
    fn test_non_planar_needs_six_points() {
        let camera = sample_camera();
        let truth = Extrinsics::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let model = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(0.0, 0.1, 0.0),
            Point3::new(0.0, 0.0, 0.1),
        ];
        let mut cost = PoseEstimationCost::new(camera.clone(), observe(&camera, &truth, model));
        assert!(matches!(
            cost.linear_estimation(),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }
}
