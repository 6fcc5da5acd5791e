//! Reprojection residuals for `tiny_solver`.
//!
//! Both factors evaluate [`crate::camera::projection::project`], the same
//! function used to report the final reprojection error.

use crate::camera::projection::project;
use crate::correspondences::SingleViewCorrespondence;
use nalgebra::DVector;
use tiny_solver::factors::Factor;

/// Residuals of one view with variables `[intrinsics, distortion, pose]`.
#[derive(Debug, Clone)]
pub(crate) struct ViewReprojectionFactor {
    model_points: Vec<[f64; 3]>,
    image_points: Vec<[f64; 2]>,
}

impl ViewReprojectionFactor {
    pub(crate) fn new(view: &SingleViewCorrespondence) -> Self {
        let (model_points, image_points) = split_view(view);
        ViewReprojectionFactor {
            model_points,
            image_points,
        }
    }

    pub(crate) fn residual_count(&self) -> usize {
        self.image_points.len() * 2
    }
}

impl<T: nalgebra::RealField> Factor<T> for ViewReprojectionFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let intrinsics = params[0].as_slice();
        let distortion = params[1].as_slice();
        let pose = params[2].as_slice();
        reprojection_residuals(
            intrinsics,
            distortion,
            pose,
            &self.model_points,
            &self.image_points,
        )
    }
}

/// Residuals of one view with the single variable `pose`; the camera is fixed.
#[derive(Debug, Clone)]
pub(crate) struct PoseReprojectionFactor {
    intrinsics: [f64; 4],
    distortion: Vec<f64>,
    model_points: Vec<[f64; 3]>,
    image_points: Vec<[f64; 2]>,
}

impl PoseReprojectionFactor {
    pub(crate) fn new(
        intrinsics: [f64; 4],
        distortion: Vec<f64>,
        view: &SingleViewCorrespondence,
    ) -> Self {
        let (model_points, image_points) = split_view(view);
        PoseReprojectionFactor {
            intrinsics,
            distortion,
            model_points,
            image_points,
        }
    }

    pub(crate) fn residual_count(&self) -> usize {
        self.image_points.len() * 2
    }
}

impl<T: nalgebra::RealField> Factor<T> for PoseReprojectionFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let intrinsics: Vec<T> = self.intrinsics.iter().map(|&v| nalgebra::convert(v)).collect();
        let distortion: Vec<T> = self.distortion.iter().map(|&v| nalgebra::convert(v)).collect();
        reprojection_residuals(
            &intrinsics,
            &distortion,
            params[0].as_slice(),
            &self.model_points,
            &self.image_points,
        )
    }
}

fn split_view(view: &SingleViewCorrespondence) -> (Vec<[f64; 3]>, Vec<[f64; 2]>) {
    view.pairs()
        .map(|(image, model)| ([model.x, model.y, model.z], [image.x, image.y]))
        .unzip()
}

fn reprojection_residuals<T: nalgebra::RealField>(
    intrinsics: &[T],
    distortion: &[T],
    pose: &[T],
    model_points: &[[f64; 3]],
    image_points: &[[f64; 2]],
) -> DVector<T> {
    let mut residuals = DVector::zeros(image_points.len() * 2);
    for (i, (model, image)) in model_points.iter().zip(image_points).enumerate() {
        let point = model.map(|v| nalgebra::convert::<f64, T>(v));
        let [u, v] = project(intrinsics, distortion, pose, &point);
        residuals[i * 2] = u - nalgebra::convert::<f64, T>(image[0]);
        residuals[i * 2 + 1] = v - nalgebra::convert::<f64, T>(image[1]);
    }
    residuals
}
