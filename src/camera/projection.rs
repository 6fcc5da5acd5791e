//! Pinhole projection with OpenCV radial/tangential distortion.
//!
//! Everything here is generic over `nalgebra::RealField` so the solver factors
//! can evaluate it with dual numbers while [`crate::calibration`] evaluates
//! the very same expressions in `f64` to compute the reprojection error.
//!
//! Parameter layouts:
//! * intrinsics: `[fx, fy, cx, cy]`
//! * distortion: `[k1, k2, p1, p2]`, `[k1, k2, p1, p2, k3]` or
//!   `[k1, k2, p1, p2, k3, k4, k5, k6]`
//! * pose: `[rx, ry, rz, tx, ty, tz]`, rotation as a Rodrigues vector

use nalgebra::RealField;

#[inline]
fn constant<T: RealField>(value: f64) -> T {
    nalgebra::convert(value)
}

/// Applies lens distortion to a point on the normalized image plane.
///
/// Missing trailing coefficients count as zero, so 4-, 5- and 8-element
/// slices all work.
pub fn distort<T: RealField>(x: T, y: T, coefficients: &[T]) -> (T, T) {
    let k = |i: usize| coefficients.get(i).cloned().unwrap_or_else(T::zero);
    let (k1, k2, p1, p2) = (k(0), k(1), k(2), k(3));
    let (k3, k4, k5, k6) = (k(4), k(5), k(6), k(7));

    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();

    let numerator = T::one() + k1 * r2.clone() + k2 * r4.clone() + k3 * r6.clone();
    let denominator = T::one() + k4 * r2.clone() + k5 * r4 + k6 * r6;
    let radial = numerator / denominator;

    let two = constant::<T>(2.0);
    let xy = x.clone() * y.clone();

    let x_distorted = x.clone() * radial.clone()
        + two.clone() * p1.clone() * xy.clone()
        + p2.clone() * (r2.clone() + two.clone() * x.clone() * x);
    let y_distorted =
        y.clone() * radial + p1 * (r2 + two.clone() * y.clone() * y) + two * p2 * xy;

    (x_distorted, y_distorted)
}

/// Rotates `point` by the Rodrigues vector `rvec` (axis times angle).
///
/// Near zero the first-order expansion `p + r × p` is used so that
/// derivatives stay finite at the identity rotation.
pub fn rotate<T: RealField>(rvec: &[T], point: &[T; 3]) -> [T; 3] {
    let (rx, ry, rz) = (rvec[0].clone(), rvec[1].clone(), rvec[2].clone());
    let [px, py, pz] = point.clone();

    let theta2 = rx.clone() * rx.clone() + ry.clone() * ry.clone() + rz.clone() * rz.clone();

    // r × p
    let cx = ry.clone() * pz.clone() - rz.clone() * py.clone();
    let cy = rz.clone() * px.clone() - rx.clone() * pz.clone();
    let cz = rx.clone() * py.clone() - ry.clone() * px.clone();

    if theta2 <= constant::<T>(1e-14) {
        return [px + cx, py + cy, pz + cz];
    }

    let theta = theta2.sqrt();
    let cos = theta.clone().cos();
    let sin = theta.clone().sin();
    let one_minus_cos = T::one() - cos.clone();

    // k · p with k = r / theta
    let dot = (rx.clone() * px.clone() + ry.clone() * py.clone() + rz.clone() * pz.clone())
        / theta.clone();
    let scale = sin / theta.clone();
    let axial = one_minus_cos * dot / theta;

    [
        px * cos.clone() + cx * scale.clone() + rx * axial.clone(),
        py * cos.clone() + cy * scale.clone() + ry * axial.clone(),
        pz * cos + cz * scale + rz * axial,
    ]
}

/// Projects a model point through a pose, the distortion model and the camera matrix.
///
/// No cheirality check is done; points behind the camera produce mirrored
/// pixels the same way OpenCV's `projectPoints` does.
pub fn project<T: RealField>(
    intrinsics: &[T],
    distortion: &[T],
    pose: &[T],
    point: &[T; 3],
) -> [T; 2] {
    let rotated = rotate(&pose[0..3], point);
    let [rx, ry, rz] = rotated;
    let xc = rx + pose[3].clone();
    let yc = ry + pose[4].clone();
    let zc = rz + pose[5].clone();

    let x = xc / zc.clone();
    let y = yc / zc;
    let (xd, yd) = distort(x, y, distortion);

    [
        intrinsics[0].clone() * xd + intrinsics[2].clone(),
        intrinsics[1].clone() * yd + intrinsics[3].clone(),
    ]
}
