//! Camera matrix for an undistorted view of a unified projection camera.
//!
//! A 9x9 grid over the input image is lifted onto the sphere and expressed on
//! the normalized plane of the target model. Two rectangles are derived from
//! it: the inner one only contains valid input pixels, the outer one contains
//! every input pixel. `alpha` blends between them.

use crate::error::{Result, UndistortError};
use nalgebra::{Matrix3, Vector2, Vector3};
use ucm_core::{CameraModel, ImageSize, UnifiedProjectionCamera};

const GRID_SIZE: usize = 9;

/// Target model of an undistorted view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetModel {
    /// Unified projection with the input mirror parameter and no distortion
    Unified,
    Pinhole,
}

/// Axis-aligned rectangle on a normalized plane
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rect {
    fn from_bounds(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// Image size after scaling: `floor(scale * width) x floor(scale * height)`
pub fn scaled_image_size(size: ImageSize, scale: f64) -> ImageSize {
    ImageSize::new(
        (scale * f64::from(size.width)).floor() as u32,
        (scale * f64::from(size.height)).floor() as u32,
    )
}

/// Camera matrix of the undistorted output view.
///
/// `alpha = 0` keeps only valid input pixels, `alpha = 1` keeps all of them.
/// The output image is `scale` times the input size.
pub fn optimal_new_camera_matrix(
    camera: &UnifiedProjectionCamera,
    alpha: f64,
    scale: f64,
    target: TargetModel,
) -> Result<Matrix3<f64>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(UndistortError::InvalidAlpha(alpha));
    }
    if !(scale > 0.0) {
        return Err(UndistortError::InvalidScale(scale));
    }

    let (inner, outer) = undistorted_rectangles(camera, target)?;
    let new_size = scaled_image_size(camera.image_size(), scale);
    let new_w = f64::from(new_size.width) - 1.0;
    let new_h = f64::from(new_size.height) - 1.0;

    let fx0 = new_w / inner.width;
    let fy0 = new_h / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;

    let fx1 = new_w / outer.width;
    let fy1 = new_h / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let blend = |a: f64, b: f64| a * (1.0 - alpha) + b * alpha;
    Ok(Matrix3::new(
        blend(fx0, fx1),
        0.0,
        blend(cx0, cx1),
        0.0,
        blend(fy0, fy1),
        blend(cy0, cy1),
        0.0,
        0.0,
        1.0,
    ))
}

/// Express a bearing on the normalized plane of the target model
fn to_target_plane(bearing: &Vector3<f64>, xi: f64, target: TargetModel) -> Option<Vector2<f64>> {
    let denom = match target {
        TargetModel::Unified => bearing.z + xi * bearing.norm(),
        TargetModel::Pinhole => bearing.z,
    };
    (denom > 0.0).then(|| Vector2::new(bearing.x / denom, bearing.y / denom))
}

fn undistorted_rectangles(
    camera: &UnifiedProjectionCamera,
    target: TargetModel,
) -> Result<(Rect, Rect)> {
    let size = camera.image_size();
    let step_x = (f64::from(size.width) - 1.0) / (GRID_SIZE - 1) as f64;
    let step_y = (f64::from(size.height) - 1.0) / (GRID_SIZE - 1) as f64;

    let mut outer_min = Vector2::repeat(f64::INFINITY);
    let mut outer_max = Vector2::repeat(f64::NEG_INFINITY);
    // Inner bounds come from the border samples only.
    let mut left = f64::NEG_INFINITY;
    let mut right = f64::INFINITY;
    let mut top = f64::NEG_INFINITY;
    let mut bottom = f64::INFINITY;

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let keypoint = Vector2::new(col as f64 * step_x, row as f64 * step_y);
            let (bearing, liftable) = camera.back_project3(&keypoint);
            if !liftable {
                continue;
            }
            let Some(p) = to_target_plane(&bearing, camera.xi(), target) else {
                continue;
            };

            outer_min = outer_min.inf(&p);
            outer_max = outer_max.sup(&p);

            if col == 0 {
                left = left.max(p.x);
            }
            if col == GRID_SIZE - 1 {
                right = right.min(p.x);
            }
            if row == 0 {
                top = top.max(p.y);
            }
            if row == GRID_SIZE - 1 {
                bottom = bottom.min(p.y);
            }
        }
    }

    for (bound, side) in [
        (left, "left"),
        (right, "right"),
        (top, "top"),
        (bottom, "bottom"),
    ] {
        if !bound.is_finite() {
            return Err(UndistortError::NotEnoughBorderSamples(side));
        }
    }

    let inner = Rect::from_bounds(left, top, right, bottom);
    let outer = Rect::from_bounds(outer_min.x, outer_min.y, outer_max.x, outer_max.y);
    if !(inner.width > 0.0 && inner.height > 0.0) {
        return Err(UndistortError::DegenerateView(format!(
            "inner rectangle {:?} is empty",
            inner
        )));
    }
    Ok((inner, outer))
}
