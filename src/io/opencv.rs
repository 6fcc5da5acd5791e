//! Matrix interchange in the layout of OpenCV's `FileStorage` YAML.
//!
//! Every matrix is written as `{rows, cols, dt: d, data: [...]}` with row-major
//! data under the keys `intrinsic` (3×3), `distortion` (n×1), `extrinsic_0`,
//! `extrinsic_1`, ... (3×4 `[R | t]`), next to the scalars `error`,
//! `image_width` and `image_height`.

use crate::calibration::CalibrationResult;
use crate::camera::{Distortion, Extrinsics, Intrinsics, PinholeCamera, Resolution};
use crate::io::IoError;
use log::{debug, info};
use nalgebra::{Matrix3, Matrix3x4};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

const INTRINSIC_KEY: &str = "intrinsic";
const DISTORTION_KEY: &str = "distortion";
const ERROR_KEY: &str = "error";
const WIDTH_KEY: &str = "image_width";
const HEIGHT_KEY: &str = "image_height";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MatrixEntry {
    rows: usize,
    cols: usize,
    dt: String,
    data: Vec<f64>,
}

impl MatrixEntry {
    fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        MatrixEntry {
            rows,
            cols,
            dt: "d".to_string(),
            data,
        }
    }

    fn check_shape(&self, key: &str, rows: usize, cols: usize) -> Result<(), IoError> {
        if self.rows != rows || self.cols != cols || self.data.len() != rows * cols {
            return Err(IoError::InvalidFormat(format!(
                "'{}' must be a {}x{} matrix, got {}x{} with {} values",
                key,
                rows,
                cols,
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        Ok(())
    }
}

fn extrinsic_key(index: usize) -> String {
    format!("extrinsic_{index}")
}

fn insert_matrix(map: &mut Mapping, key: &str, entry: MatrixEntry) -> Result<(), IoError> {
    map.insert(Value::from(key), serde_yaml::to_value(entry)?);
    Ok(())
}

fn read_matrix(map: &Mapping, key: &str) -> Result<Option<MatrixEntry>, IoError> {
    match map.get(key) {
        Some(value) => Ok(Some(serde_yaml::from_value(value.clone())?)),
        None => Ok(None),
    }
}

fn require_matrix(map: &Mapping, key: &str) -> Result<MatrixEntry, IoError> {
    read_matrix(map, key)?
        .ok_or_else(|| IoError::InvalidFormat(format!("Missing matrix '{key}'")))
}

pub fn to_string(result: &CalibrationResult) -> Result<String, IoError> {
    if !result.is_calibrated() {
        return Err(IoError::Uncalibrated);
    }

    let camera = &result.camera;
    let mut map = Mapping::new();
    let k = camera.camera_matrix();
    insert_matrix(
        &mut map,
        INTRINSIC_KEY,
        MatrixEntry::new(3, 3, k.transpose().as_slice().to_vec()),
    )?;
    let coefficients = camera.distortion.coefficients().to_vec();
    insert_matrix(
        &mut map,
        DISTORTION_KEY,
        MatrixEntry::new(coefficients.len(), 1, coefficients),
    )?;
    map.insert(Value::from(ERROR_KEY), Value::from(result.reprojection_error));
    map.insert(Value::from(WIDTH_KEY), Value::from(camera.resolution.width));
    map.insert(Value::from(HEIGHT_KEY), Value::from(camera.resolution.height));

    for (i, pose) in result.extrinsics.iter().enumerate() {
        let rt = pose.matrix();
        insert_matrix(
            &mut map,
            &extrinsic_key(i),
            MatrixEntry::new(3, 4, rt.transpose().as_slice().to_vec()),
        )?;
    }

    Ok(serde_yaml::to_string(&map)?)
}

pub fn from_str(contents: &str) -> Result<CalibrationResult, IoError> {
    let map: Mapping = serde_yaml::from_str(contents)?;

    let intrinsic = require_matrix(&map, INTRINSIC_KEY)?;
    intrinsic.check_shape(INTRINSIC_KEY, 3, 3)?;
    let intrinsics = Intrinsics::from_matrix(&Matrix3::from_row_slice(&intrinsic.data));

    let distortion = require_matrix(&map, DISTORTION_KEY)?;
    if distortion.rows.min(distortion.cols) != 1
        || distortion.data.len() != distortion.rows * distortion.cols
    {
        return Err(IoError::InvalidFormat(format!(
            "'{}' must be a column vector, got {}x{}",
            DISTORTION_KEY, distortion.rows, distortion.cols
        )));
    }
    let distortion = Distortion::new(distortion.data)?;

    let error = map
        .get(ERROR_KEY)
        .and_then(Value::as_f64)
        .ok_or_else(|| IoError::InvalidFormat(format!("Missing scalar '{ERROR_KEY}'")))?;

    let dimension = |key: &str| -> Result<u32, IoError> {
        match map.get(key) {
            None => Ok(0),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| IoError::InvalidFormat(format!("'{key}' must be an unsigned integer"))),
        }
    };
    let resolution = Resolution::new(dimension(WIDTH_KEY)?, dimension(HEIGHT_KEY)?);

    let mut extrinsics = Vec::new();
    while let Some(entry) = read_matrix(&map, &extrinsic_key(extrinsics.len()))? {
        let key = extrinsic_key(extrinsics.len());
        entry.check_shape(&key, 3, 4)?;
        extrinsics.push(Extrinsics::from_matrix(&Matrix3x4::from_row_slice(&entry.data)));
    }
    debug!("Read {} extrinsic matrices", extrinsics.len());

    let camera = PinholeCamera::new(intrinsics, distortion, resolution)?;
    Ok(CalibrationResult::new(camera, extrinsics, error))
}

/// Writes `result` as OpenCV-style YAML.
///
/// # Errors
///
/// [`IoError::Uncalibrated`] if the result has no finite reprojection error.
pub fn save<P: AsRef<Path>>(result: &CalibrationResult, path: P) -> Result<(), IoError> {
    fs::write(path.as_ref(), to_string(result)?)?;
    info!("Saved OpenCV matrices to {}", path.as_ref().display());
    Ok(())
}

/// Reads a result; extrinsics are read as `extrinsic_0`, `extrinsic_1`, ...
/// up to the first missing index.
pub fn load<P: AsRef<Path>>(path: P) -> Result<CalibrationResult, IoError> {
    let contents = fs::read_to_string(path.as_ref())?;
    from_str(&contents)
}
