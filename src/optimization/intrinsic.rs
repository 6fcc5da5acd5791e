//! Joint estimation of intrinsics, distortion and per-view poses from planar targets.

use crate::calibration::CalibrationError;
use crate::camera::{
    CameraModel, Distortion, DistortionModel, Extrinsics, Intrinsics, PinholeCamera, Resolution,
};
use crate::correspondences::{MultiViewCorrespondences, SingleViewCorrespondence};
use crate::geometry::pose_init::{focal_from_homographies, pose_from_homography, principal_point_guess};
use crate::geometry::{estimate_homography, planar_coordinates};
use crate::optimization::factors::ViewReprojectionFactor;
use crate::optimization::{solver_options, Optimizer};

use log::info;
use nalgebra::{DVector, Matrix3};
use std::collections::HashMap;
use tiny_solver::{LevenbergMarquardtOptimizer, Optimizer as TinySolverOptimizer};

const INTRINSICS_KEY: &str = "intrinsics";
const DISTORTION_KEY: &str = "distortion";

fn pose_key(view: usize) -> String {
    format!("pose_{}", view)
}

/// Cost for calibrating a [`PinholeCamera`] from several views of planar targets.
///
/// Variables are `intrinsics [fx, fy, cx, cy]`, `distortion` (length set by
/// the [`DistortionModel`]) and `pose_i [rx, ry, rz, tx, ty, tz]` for every
/// view, with one residual block per view.
#[derive(Debug, Clone)]
pub struct IntrinsicCalibrationCost {
    views: Vec<SingleViewCorrespondence>,
    resolution: Resolution,
    intrinsics: Intrinsics,
    distortion: Distortion,
    poses: Vec<Extrinsics>,
}

impl IntrinsicCalibrationCost {
    /// Creates a cost with the principal point at the image centre, unit focal
    /// lengths and zero distortion. Call [`Optimizer::linear_estimation`] before
    /// [`Optimizer::optimize`].
    pub fn new(
        correspondences: &MultiViewCorrespondences,
        resolution: Resolution,
        distortion_model: DistortionModel,
    ) -> Self {
        let (cx, cy) = principal_point_guess(&resolution);
        IntrinsicCalibrationCost {
            views: correspondences.views().to_vec(),
            resolution,
            intrinsics: Intrinsics {
                fx: 1.0,
                fy: 1.0,
                cx,
                cy,
            },
            distortion: Distortion::zeros(distortion_model),
            poses: vec![Extrinsics::identity(); correspondences.view_count()],
        }
    }

    /// Current per-view poses, aligned with the input views.
    pub fn poses(&self) -> &[Extrinsics] {
        &self.poses
    }

    /// Camera built from the current parameters.
    pub fn camera(&self) -> Result<PinholeCamera, CalibrationError> {
        Ok(PinholeCamera::new(
            self.intrinsics,
            self.distortion.clone(),
            self.resolution,
        )?)
    }
}

impl Optimizer for IntrinsicCalibrationCost {
    /// Refines every variable with Levenberg-Marquardt.
    ///
    /// Fails with [`CalibrationError::ComputationFailed`] if the solver does
    /// not return a solution or the solution is not a valid camera.
    fn optimize(&mut self, verbose: bool) -> Result<(), CalibrationError> {
        if self.views.is_empty() {
            return Err(CalibrationError::InvalidArgument(
                "No views to optimize".to_string(),
            ));
        }

        let mut problem = tiny_solver::Problem::new();
        let mut initial_values = HashMap::new();
        initial_values.insert(
            INTRINSICS_KEY.to_string(),
            DVector::from_vec(self.intrinsics.to_vec()),
        );
        initial_values.insert(
            DISTORTION_KEY.to_string(),
            DVector::from_column_slice(self.distortion.coefficients()),
        );

        for (i, (view, pose)) in self.views.iter().zip(&self.poses).enumerate() {
            let key = pose_key(i);
            let factor = ViewReprojectionFactor::new(view);
            problem.add_residual_block(
                factor.residual_count(),
                &[INTRINSICS_KEY, DISTORTION_KEY, key.as_str()],
                Box::new(factor),
                None,
            );
            initial_values.insert(key, DVector::from_vec(pose.to_params()));
        }

        if verbose {
            info!(
                "Starting intrinsic calibration over {} views with tiny-solver Levenberg-Marquardt...",
                self.views.len()
            );
        }

        let optimizer = LevenbergMarquardtOptimizer::default();
        let result = optimizer
            .optimize(&problem, &initial_values, Some(solver_options()))
            .ok_or_else(|| {
                CalibrationError::ComputationFailed("Levenberg-Marquardt did not converge".to_string())
            })?;

        if verbose {
            info!("Optimization finished");
        }

        let missing = |key: &str| {
            CalibrationError::ComputationFailed(format!("Solver result lacks variable {}", key))
        };
        let intrinsics = result
            .get(INTRINSICS_KEY)
            .ok_or_else(|| missing(INTRINSICS_KEY))?;
        let distortion = result
            .get(DISTORTION_KEY)
            .ok_or_else(|| missing(DISTORTION_KEY))?;

        let mut poses = Vec::with_capacity(self.views.len());
        for i in 0..self.views.len() {
            let key = pose_key(i);
            let params = result.get(&key).ok_or_else(|| missing(key.as_str()))?;
            let pose = Extrinsics::from_params(params.as_slice());
            if !pose.is_finite() {
                return Err(CalibrationError::ComputationFailed(format!(
                    "Pose of view {} is not finite",
                    i
                )));
            }
            poses.push(pose);
        }

        let camera = PinholeCamera {
            intrinsics: Intrinsics {
                fx: intrinsics[0],
                fy: intrinsics[1],
                cx: intrinsics[2],
                cy: intrinsics[3],
            },
            distortion: Distortion::new(distortion.iter().copied().collect()).map_err(|e| {
                CalibrationError::ComputationFailed(format!("Invalid distortion: {}", e))
            })?,
            resolution: self.resolution,
        };
        camera.validate_params().map_err(|e| {
            CalibrationError::ComputationFailed(format!("Invalid refined intrinsics: {}", e))
        })?;

        if verbose {
            info!(
                "Refined intrinsics: fx={:.3} fy={:.3} cx={:.3} cy={:.3}",
                camera.intrinsics.fx, camera.intrinsics.fy, camera.intrinsics.cx, camera.intrinsics.cy
            );
        }

        self.intrinsics = camera.intrinsics;
        self.distortion = camera.distortion;
        self.poses = poses;
        Ok(())
    }

    /// Seeds focal lengths and poses from per-view homographies.
    ///
    /// The principal point stays at the image centre and distortion at zero.
    fn linear_estimation(&mut self) -> Result<(), CalibrationError>
    where
        Self: Sized,
    {
        let homographies = self
            .views
            .iter()
            .map(|view| {
                estimate_homography(&planar_coordinates(view.model_points()), view.image_points())
            })
            .collect::<Result<Vec<Matrix3<f64>>, _>>()?;

        let principal_point = principal_point_guess(&self.resolution);
        let intrinsics = focal_from_homographies(&homographies, principal_point)?;
        let camera_matrix_inv = intrinsics.matrix().try_inverse().ok_or_else(|| {
            CalibrationError::ComputationFailed("Initial camera matrix is singular".to_string())
        })?;

        self.poses = homographies
            .iter()
            .map(|h| pose_from_homography(&camera_matrix_inv, h))
            .collect::<Result<Vec<_>, _>>()?;
        self.intrinsics = intrinsics;
        self.distortion = Distortion::zeros(self.distortion.model());
        Ok(())
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_distortion(&self) -> Vec<f64> {
        self.distortion.coefficients().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2, Point3};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn sample_camera() -> PinholeCamera {
        PinholeCamera::new(
            Intrinsics {
                fx: 800.0,
                fy: 780.0,
                cx: 322.0,
                cy: 236.0,
            },
            Distortion::new(vec![-0.12, 0.05, 0.001, -0.0005]).unwrap(),
            Resolution::new(640, 480),
        )
        .unwrap()
    }

    fn sample_poses() -> Vec<Extrinsics> {
        vec![
            Extrinsics::new(Vector3::new(0.3, -0.2, 0.05), Vector3::new(-0.1, -0.08, 0.7)),
            Extrinsics::new(Vector3::new(-0.25, 0.3, -0.1), Vector3::new(-0.12, -0.05, 0.8)),
            Extrinsics::new(Vector3::new(0.1, 0.35, 0.2), Vector3::new(-0.08, -0.1, 0.75)),
            Extrinsics::new(Vector3::new(-0.35, -0.15, 0.0), Vector3::new(-0.1, -0.06, 0.65)),
        ]
    }

    fn board() -> Vec<Point3> {
        (0..6)
            .flat_map(|y| (0..8).map(move |x| Point3::new(x as f64 * 0.03, y as f64 * 0.03, 0.0)))
            .collect()
    }

    fn synthetic_views(camera: &PinholeCamera, poses: &[Extrinsics]) -> MultiViewCorrespondences {
        let mut correspondences = MultiViewCorrespondences::new();
        for pose in poses {
            let model = board();
            let image: Vec<Point2> = model
                .iter()
                .map(|p| {
                    let pixel = camera.project(&pose.transform_point(p).coords).unwrap();
                    Point2::new(pixel.x, pixel.y)
                })
                .collect();
            correspondences.add_view(image, model).unwrap();
        }
        correspondences
    }

    #[test]
    fn test_linear_estimation_without_distortion() {
        let mut camera = sample_camera();
        camera.distortion = Distortion::zeros(DistortionModel::RadialTangential5);
        camera.intrinsics.cx = 319.5;
        camera.intrinsics.cy = 239.5;
        let poses = sample_poses();
        let correspondences = synthetic_views(&camera, &poses);

        let mut cost = IntrinsicCalibrationCost::new(
            &correspondences,
            camera.resolution,
            DistortionModel::RadialTangential5,
        );
        cost.linear_estimation().unwrap();

        let intrinsics = cost.get_intrinsics();
        assert_relative_eq!(intrinsics.fx, 800.0, max_relative = 1e-6);
        assert_relative_eq!(intrinsics.fy, 780.0, max_relative = 1e-6);
        for (estimated, expected) in cost.poses().iter().zip(&poses) {
            assert_relative_eq!(estimated.translation, expected.translation, epsilon = 1e-6);
            assert_relative_eq!(estimated.rotation, expected.rotation, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_optimize_recovers_camera() {
        let camera = sample_camera();
        let poses = sample_poses();
        let correspondences = synthetic_views(&camera, &poses);

        let mut cost = IntrinsicCalibrationCost::new(
            &correspondences,
            camera.resolution,
            DistortionModel::RadialTangential4,
        );
        cost.linear_estimation().unwrap();
        cost.optimize(false).unwrap();

        let intrinsics = cost.get_intrinsics();
        assert_relative_eq!(intrinsics.fx, 800.0, max_relative = 1e-3);
        assert_relative_eq!(intrinsics.fy, 780.0, max_relative = 1e-3);
        assert_relative_eq!(intrinsics.cx, 322.0, epsilon = 0.5);
        assert_relative_eq!(intrinsics.cy, 236.0, epsilon = 0.5);

        let distortion = cost.get_distortion();
        assert_eq!(distortion.len(), 4);
        assert_relative_eq!(distortion[0], -0.12, epsilon = 1e-2);

        let refined = cost.camera().unwrap();
        for (view, pose) in correspondences.views().iter().zip(cost.poses()) {
            for (image, model) in view.pairs() {
                let pixel = refined.project(&pose.transform_point(model).coords).unwrap();
                assert_relative_eq!(pixel.x, image.x, epsilon = 1e-2);
                assert_relative_eq!(pixel.y, image.y, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn test_linear_estimation_rejects_tiny_views() {
        let mut correspondences = MultiViewCorrespondences::new();
        correspondences
            .add_view(
                vec![Point2::new(1.0, 1.0); 3],
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            )
            .unwrap();
        let mut cost = IntrinsicCalibrationCost::new(
            &correspondences,
            Resolution::new(640, 480),
            DistortionModel::RadialTangential4,
        );
        assert!(matches!(
            cost.linear_estimation(),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }
}
