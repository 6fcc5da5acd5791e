//! Calibration engine.
//!
//! [`estimate_intrinsics`] calibrates a camera from several views of planar
//! targets; [`estimate_extrinsics`] recovers the target poses for an already
//! calibrated camera. Both report their quality with [`reprojection_error`],
//! computed independently of the solver.

use crate::camera::projection;
use crate::camera::{CameraModelError, DistortionModel, Extrinsics, PinholeCamera, Resolution};
use crate::correspondences::MultiViewCorrespondences;
use crate::detection::DetectorKind;
use crate::geometry::{is_planar, Point2, Point3};
use crate::io::IoError;
use crate::optimization::{IntrinsicCalibrationCost, Optimizer, PoseEstimationCost, ProjectionError};
use crate::pattern::PatternKind;
use log::info;
use serde::{Deserialize, Serialize};

pub mod result;

pub use result::CalibrationResult;

/// Smallest number of points accepted per view and overall.
const MIN_POINTS: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("The {detector} detector does not support {pattern} patterns")]
    UnsupportedPattern {
        detector: DetectorKind,
        pattern: PatternKind,
    },
    #[error("Computation failed: {0}")]
    ComputationFailed(String),
    #[error(transparent)]
    Camera(#[from] CameraModelError),
}

/// Options of [`estimate_intrinsics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Number and meaning of the estimated distortion coefficients.
    pub distortion_model: DistortionModel,
    /// Log solver progress at `info` level.
    pub verbose: bool,
}

impl CalibrationOptions {
    pub fn load_from_yaml(path: &str) -> Result<Self, IoError> {
        let contents = std::fs::read_to_string(path)?;
        let options = serde_yaml::from_str(&contents)?;
        Ok(options)
    }
}

fn validate_views(correspondences: &MultiViewCorrespondences) -> Result<(), CalibrationError> {
    let count = correspondences.correspondence_count();
    if count < MIN_POINTS {
        return Err(CalibrationError::InvalidArgument(format!(
            "At least {} correspondences are required, got {}",
            MIN_POINTS, count
        )));
    }
    if let Some((i, view)) = correspondences
        .views()
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() < MIN_POINTS)
    {
        return Err(CalibrationError::InvalidArgument(format!(
            "View {} has {} correspondences, at least {} are required",
            i,
            view.len(),
            MIN_POINTS
        )));
    }
    Ok(())
}

/// Calibrates intrinsics, distortion and one pose per view.
///
/// Every view must observe a planar target lying on `Z = 0` of its model
/// coordinate frame.
///
/// # Errors
///
/// * [`CalibrationError::InvalidArgument`] for fewer than four
///   correspondences in total or in any view, non-planar model points, or an
///   empty resolution.
/// * [`CalibrationError::ComputationFailed`] if initialisation or refinement
///   fails.
pub fn estimate_intrinsics(
    correspondences: &MultiViewCorrespondences,
    resolution: Resolution,
    options: &CalibrationOptions,
) -> Result<CalibrationResult, CalibrationError> {
    validate_views(correspondences)?;
    if resolution.width == 0 || resolution.height == 0 {
        return Err(CalibrationError::InvalidArgument(
            "Image resolution must be non-empty".to_string(),
        ));
    }
    if let Some(i) = correspondences
        .views()
        .iter()
        .position(|v| !is_planar(v.model_points()))
    {
        return Err(CalibrationError::InvalidArgument(format!(
            "Model points of view {} do not lie on the Z = 0 plane",
            i
        )));
    }

    let mut cost =
        IntrinsicCalibrationCost::new(correspondences, resolution, options.distortion_model);
    cost.linear_estimation()?;
    if options.verbose {
        let initial = cost.get_intrinsics();
        info!(
            "Initial focal lengths fx={:.3} fy={:.3}",
            initial.fx, initial.fy
        );
    }
    cost.optimize(options.verbose)?;

    let camera = cost.camera()?;
    let extrinsics = cost.poses().to_vec();
    let error = reprojection_error(&camera, &extrinsics, correspondences)?;
    if !error.is_finite() {
        return Err(CalibrationError::ComputationFailed(
            "Reprojection error is not finite".to_string(),
        ));
    }
    info!(
        "Calibrated {} views with {} correspondences, reprojection error {:.4} px",
        correspondences.view_count(),
        correspondences.correspondence_count(),
        error
    );

    Ok(CalibrationResult::new(camera, extrinsics, error).with_correspondences(correspondences.clone()))
}

/// Estimates one pose per view for a calibrated camera.
///
/// The result carries `camera` unchanged.
///
/// # Errors
///
/// * [`CalibrationError::InvalidArgument`] for fewer than four
///   correspondences in total or in any view, or a non-planar view with
///   fewer than six points.
/// * [`CalibrationError::ComputationFailed`] if a pose cannot be found.
pub fn estimate_extrinsics(
    correspondences: &MultiViewCorrespondences,
    camera: &PinholeCamera,
) -> Result<CalibrationResult, CalibrationError> {
    validate_views(correspondences)?;

    let extrinsics = correspondences
        .views()
        .iter()
        .map(|view| {
            let mut cost = PoseEstimationCost::new(camera.clone(), view.clone());
            cost.linear_estimation()?;
            cost.optimize(false)?;
            Ok(cost.pose())
        })
        .collect::<Result<Vec<_>, CalibrationError>>()?;

    let error = reprojection_error(camera, &extrinsics, correspondences)?;
    Ok(CalibrationResult::new(camera.clone(), extrinsics, error)
        .with_correspondences(correspondences.clone()))
}

fn reprojection_distances(
    camera: &PinholeCamera,
    extrinsics: &[Extrinsics],
    correspondences: &MultiViewCorrespondences,
) -> Result<Vec<f64>, CalibrationError> {
    if extrinsics.len() != correspondences.view_count() {
        return Err(CalibrationError::InvalidArgument(format!(
            "Got {} extrinsics for {} views",
            extrinsics.len(),
            correspondences.view_count()
        )));
    }
    if correspondences.correspondence_count() == 0 {
        return Err(CalibrationError::InvalidArgument(
            "No correspondences to measure".to_string(),
        ));
    }

    Ok(correspondences
        .views()
        .iter()
        .zip(extrinsics)
        .flat_map(|(view, pose)| {
            let projected = project(view.model_points(), pose, camera);
            view.image_points()
                .iter()
                .zip(projected)
                .map(|(observed, predicted)| nalgebra::distance(observed, &predicted))
                .collect::<Vec<_>>()
        })
        .collect())
}

/// Root mean square pixel distance between observed and reprojected points.
///
/// `sqrt(sum of squared distances / correspondence_count)` over all views.
///
/// # Errors
///
/// [`CalibrationError::InvalidArgument`] if `extrinsics` does not hold one
/// pose per view or there are no correspondences.
pub fn reprojection_error(
    camera: &PinholeCamera,
    extrinsics: &[Extrinsics],
    correspondences: &MultiViewCorrespondences,
) -> Result<f64, CalibrationError> {
    let distances = reprojection_distances(camera, extrinsics, correspondences)?;
    let squared: f64 = distances.iter().map(|d| d * d).sum();
    Ok((squared / distances.len() as f64).sqrt())
}

/// Distribution of the per-point reprojection distances.
pub fn reprojection_statistics(
    camera: &PinholeCamera,
    extrinsics: &[Extrinsics],
    correspondences: &MultiViewCorrespondences,
) -> Result<ProjectionError, CalibrationError> {
    let distances = reprojection_distances(camera, extrinsics, correspondences)?;
    ProjectionError::from_distances(&distances).ok_or_else(|| {
        CalibrationError::InvalidArgument("No correspondences to measure".to_string())
    })
}

/// Projects model points to pixels through a pose and the camera.
pub fn project(points: &[Point3], extrinsics: &Extrinsics, camera: &PinholeCamera) -> Vec<Point2> {
    let intrinsics = camera.intrinsics.to_vec();
    let distortion = camera.distortion.coefficients();
    let pose = extrinsics.to_params();
    points
        .iter()
        .map(|p| {
            let [u, v] = projection::project(&intrinsics, distortion, &pose, &[p.x, p.y, p.z]);
            Point2::new(u, v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Distortion, Intrinsics};
    use crate::pattern::CheckerBoardPattern;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn sample_camera() -> PinholeCamera {
        PinholeCamera::new(
            Intrinsics {
                fx: 700.0,
                fy: 700.0,
                cx: 319.5,
                cy: 239.5,
            },
            Distortion::new(vec![-0.1, 0.02, 0.0, 0.0, 0.0]).unwrap(),
            Resolution::new(640, 480),
        )
        .unwrap()
    }

    fn square() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(0.0, 0.1, 0.0),
        ]
    }

    #[test]
    fn test_project_center_point() {
        let camera = sample_camera();
        let pose = Extrinsics::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0));
        let pixels = project(&[Point3::new(0.0, 0.0, 0.0)], &pose, &camera);
        assert_relative_eq!(pixels[0], Point2::new(319.5, 239.5));
    }

    #[test]
    fn test_reprojection_error_known_offsets() {
        let camera = sample_camera();
        let pose = Extrinsics::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(-0.05, -0.05, 0.6));
        let model = square();
        let exact = project(&model, &pose, &camera);

        // Offsets of 3, 4, 0 and 0 pixels give sqrt((9 + 16) / 4).
        let observed = vec![
            exact[0] + nalgebra::Vector2::new(3.0, 0.0),
            exact[1] + nalgebra::Vector2::new(0.0, 4.0),
            exact[2],
            exact[3],
        ];
        let mut correspondences = MultiViewCorrespondences::new();
        correspondences.add_view(observed, model).unwrap();

        let error = reprojection_error(&camera, &[pose], &correspondences).unwrap();
        assert_relative_eq!(error, 2.5, epsilon = 1e-9);

        let stats = reprojection_statistics(&camera, &[pose], &correspondences).unwrap();
        assert_relative_eq!(stats.rmse, 2.5, epsilon = 1e-9);
        assert_relative_eq!(stats.max, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reprojection_error_argument_checks() {
        let camera = sample_camera();
        let empty = MultiViewCorrespondences::new();
        assert!(matches!(
            reprojection_error(&camera, &[], &empty),
            Err(CalibrationError::InvalidArgument(_))
        ));

        let mut correspondences = MultiViewCorrespondences::new();
        correspondences
            .add_view(vec![Point2::new(0.0, 0.0); 4], square())
            .unwrap();
        assert!(matches!(
            reprojection_error(&camera, &[], &correspondences),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_estimate_intrinsics_argument_checks() {
        let options = CalibrationOptions::default();
        let resolution = Resolution::new(640, 480);

        for count in 0..MIN_POINTS {
            let mut views = MultiViewCorrespondences::new();
            if count > 0 {
                views
                    .add_view(vec![Point2::new(1.0, 2.0); count], square()[..count].to_vec())
                    .unwrap();
            }
            assert!(
                matches!(
                    estimate_intrinsics(&views, resolution, &options),
                    Err(CalibrationError::InvalidArgument(_))
                ),
                "{} correspondences accepted",
                count
            );
        }

        let mut short_view = MultiViewCorrespondences::new();
        short_view
            .add_view(vec![Point2::new(1.0, 2.0); 4], square())
            .unwrap();
        short_view
            .add_view(vec![Point2::new(1.0, 2.0); 3], square()[..3].to_vec())
            .unwrap();
        assert!(matches!(
            estimate_intrinsics(&short_view, resolution, &options),
            Err(CalibrationError::InvalidArgument(_))
        ));

        let mut non_planar = MultiViewCorrespondences::new();
        let mut model = square();
        model[2].z = 0.05;
        non_planar
            .add_view(vec![Point2::new(1.0, 2.0); 4], model)
            .unwrap();
        assert!(matches!(
            estimate_intrinsics(&non_planar, resolution, &options),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_estimate_extrinsics_argument_checks() {
        let camera = sample_camera();
        for count in 0..MIN_POINTS {
            let mut views = MultiViewCorrespondences::new();
            views
                .add_view(vec![Point2::new(1.0, 2.0); count], square()[..count].to_vec())
                .unwrap();
            assert!(
                matches!(
                    estimate_extrinsics(&views, &camera),
                    Err(CalibrationError::InvalidArgument(_))
                ),
                "{} correspondences accepted",
                count
            );
        }
    }

    #[test]
    fn test_estimate_extrinsics_recovers_pose() {
        let camera = sample_camera();
        let pose = Extrinsics::new(Vector3::new(-0.2, 0.15, 0.3), Vector3::new(-0.04, -0.06, 0.55));
        let model: Vec<Point3> = (0..4)
            .flat_map(|y| (0..5).map(move |x| Point3::new(x as f64 * 0.02, y as f64 * 0.02, 0.0)))
            .collect();
        let image = project(&model, &pose, &camera);
        let mut correspondences = MultiViewCorrespondences::new();
        correspondences.add_view(image, model).unwrap();

        let result = estimate_extrinsics(&correspondences, &camera).unwrap();
        assert_eq!(result.camera, camera);
        assert_eq!(result.extrinsics.len(), 1);
        assert_relative_eq!(result.extrinsics[0].rotation, pose.rotation, epsilon = 1e-6);
        assert_relative_eq!(result.extrinsics[0].translation, pose.translation, epsilon = 1e-6);
        assert!(result.reprojection_error < 1e-6);
        assert!(result.is_calibrated());
    }

    #[test]
    fn test_estimate_intrinsics_exact_data_without_distortion() {
        let truth = PinholeCamera::new(
            Intrinsics {
                fx: 760.0,
                fy: 752.0,
                cx: 322.0,
                cy: 241.0,
            },
            Distortion::zeros(DistortionModel::RadialTangential5),
            Resolution::new(640, 480),
        )
        .unwrap();
        let board = CheckerBoardPattern::new(9, 6, 25.0);
        let center = Vector3::new(100.0, 62.5, 0.0);
        let mut views = MultiViewCorrespondences::new();
        for (i, rotation) in [
            Vector3::new(0.3, -0.1, 0.0),
            Vector3::new(-0.2, 0.3, 0.1),
            Vector3::new(0.1, 0.25, -0.2),
        ]
        .iter()
        .enumerate()
        {
            let pose = Extrinsics::new(*rotation, Vector3::zeros());
            let translation =
                -(pose.rotation_matrix() * center) + Vector3::new(0.0, 0.0, 550.0 + 40.0 * i as f64);
            let pose = Extrinsics::new(*rotation, translation);
            views
                .add_view(project(board.model_points(), &pose, &truth), board.model_points().to_vec())
                .unwrap();
        }

        let result =
            estimate_intrinsics(&views, truth.resolution, &CalibrationOptions::default()).unwrap();
        assert!(
            result.reprojection_error < 1e-6,
            "rms {} px",
            result.reprojection_error
        );
        assert_relative_eq!(result.camera.intrinsics.fx, truth.intrinsics.fx, epsilon = 1e-3);
        assert_relative_eq!(result.camera.intrinsics.cy, truth.intrinsics.cy, epsilon = 1e-3);
    }

    #[test]
    fn test_options_from_yaml() {
        let options: CalibrationOptions =
            serde_yaml::from_str("distortion_model: rational8\n").unwrap();
        assert_eq!(options.distortion_model, DistortionModel::Rational8);
        assert!(!options.verbose);
    }
}
