//! Lens distortion coefficients in OpenCV order.

use crate::camera::CameraModelError;
use serde::{Deserialize, Serialize};

/// Which subset of the OpenCV distortion coefficients is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// `[k1, k2, p1, p2]`
    RadialTangential4,
    /// `[k1, k2, p1, p2, k3]`
    #[default]
    RadialTangential5,
    /// `[k1, k2, p1, p2, k3, k4, k5, k6]`, with `k4..k6` in the denominator.
    Rational8,
}

impl DistortionModel {
    pub fn coefficient_count(&self) -> usize {
        match self {
            DistortionModel::RadialTangential4 => 4,
            DistortionModel::RadialTangential5 => 5,
            DistortionModel::Rational8 => 8,
        }
    }

    pub fn from_coefficient_count(count: usize) -> Option<Self> {
        match count {
            4 => Some(DistortionModel::RadialTangential4),
            5 => Some(DistortionModel::RadialTangential5),
            8 => Some(DistortionModel::Rational8),
            _ => None,
        }
    }
}

/// Radial and tangential distortion coefficients.
///
/// The coefficient vector always has 4, 5 or 8 finite entries; the length
/// decides the [`DistortionModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Distortion {
    coefficients: Vec<f64>,
}

impl Distortion {
    /// Wraps a coefficient vector, rejecting unsupported lengths and non-finite values.
    pub fn new(coefficients: Vec<f64>) -> Result<Self, CameraModelError> {
        if DistortionModel::from_coefficient_count(coefficients.len()).is_none() {
            return Err(CameraModelError::InvalidParams(format!(
                "Expected 4, 5 or 8 distortion coefficients, got {}",
                coefficients.len()
            )));
        }
        if let Some(i) = coefficients.iter().position(|c| !c.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "Distortion coefficient {} is not finite",
                i
            )));
        }
        Ok(Distortion { coefficients })
    }

    /// All-zero coefficients for the given model.
    pub fn zeros(model: DistortionModel) -> Self {
        Distortion {
            coefficients: vec![0.0; model.coefficient_count()],
        }
    }

    pub fn model(&self) -> DistortionModel {
        DistortionModel::from_coefficient_count(self.coefficients.len())
            .unwrap_or(DistortionModel::RadialTangential5)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|c| *c == 0.0)
    }

    /// Converts to another model, padding with zeros or dropping trailing terms.
    pub fn with_model(&self, model: DistortionModel) -> Self {
        let mut coefficients = self.coefficients.clone();
        coefficients.resize(model.coefficient_count(), 0.0);
        Distortion { coefficients }
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Distortion::zeros(DistortionModel::default())
    }
}

impl TryFrom<Vec<f64>> for Distortion {
    type Error = CameraModelError;

    fn try_from(coefficients: Vec<f64>) -> Result<Self, Self::Error> {
        Distortion::new(coefficients)
    }
}

impl From<Distortion> for Vec<f64> {
    fn from(distortion: Distortion) -> Self {
        distortion.coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distortion_lengths() {
        assert!(Distortion::new(vec![0.0; 4]).is_ok());
        assert!(Distortion::new(vec![0.0; 5]).is_ok());
        assert!(Distortion::new(vec![0.0; 8]).is_ok());
        assert!(Distortion::new(vec![0.0; 3]).is_err());
        assert!(Distortion::new(vec![0.0; 6]).is_err());
        assert!(Distortion::new(vec![0.1, f64::NAN, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_distortion_with_model() {
        let d = Distortion::new(vec![0.1, -0.2, 0.001, 0.002, 0.05]).unwrap();
        assert_eq!(d.model(), DistortionModel::RadialTangential5);

        let rational = d.with_model(DistortionModel::Rational8);
        assert_eq!(
            rational.coefficients(),
            &[0.1, -0.2, 0.001, 0.002, 0.05, 0.0, 0.0, 0.0]
        );

        let short = d.with_model(DistortionModel::RadialTangential4);
        assert_eq!(short.coefficients(), &[0.1, -0.2, 0.001, 0.002]);
        assert!(!short.is_zero());
        assert!(Distortion::default().is_zero());
    }

    #[test]
    fn test_distortion_serde_rejects_bad_length() {
        let ok: Distortion = serde_json::from_str("[0.1, 0.0, 0.0, 0.0]").unwrap();
        assert_eq!(ok.model(), DistortionModel::RadialTangential4);
        assert!(serde_json::from_str::<Distortion>("[0.1, 0.0]").is_err());
    }
}
