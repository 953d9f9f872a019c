//! Geometric validity checks shared by projection, back-projection and sampling

use super::{ImageSize, ProjectionResult};
use nalgebra::{Vector2, Vector3};

/// Minimal distance from the projection center for a valid projection.
pub const MIN_DEPTH: f64 = 1e-10;

/// Half-angle parameter of the projectable cone for mirror parameter `xi`.
pub fn fov_parameter(xi: f64) -> f64 {
    if xi <= 1.0 { xi } else { 1.0 / xi }
}

/// Whether a point with depth `z` and norm `d` lies inside the projectable domain.
///
/// Points with `z <= -fov_parameter(xi) * d` lie behind the mirror.
pub fn is_in_projection_domain(z: f64, d: f64, xi: f64) -> bool {
    z > -(fov_parameter(xi) * d)
}

/// Whether an undistorted normalized keypoint with squared norm `rho2` can be
/// lifted onto the unit sphere.
pub fn is_undistorted_keypoint_valid(rho2: f64, xi: f64) -> bool {
    xi <= 1.0 || rho2 <= 1.0 / (xi * xi - 1.0)
}

/// Classify a projected keypoint given the original 3D point.
pub fn evaluate_projection_result(
    keypoint: &Vector2<f64>,
    point_3d: &Vector3<f64>,
    image_size: ImageSize,
) -> ProjectionResult {
    if point_3d.norm_squared() <= MIN_DEPTH * MIN_DEPTH {
        ProjectionResult::Invalid
    } else if image_size.contains(keypoint) {
        ProjectionResult::Visible
    } else {
        ProjectionResult::OutsideImageBounds
    }
}
