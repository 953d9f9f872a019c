//! Camera models and projections

pub mod distortion;
mod pinhole;
mod sampling;
mod unified;
pub mod validity;

pub use distortion::{Distortion, EquidistantDistortion, LensDistortion, RadTanDistortion};
pub use pinhole::PinholeCamera;
pub use unified::{JacobianRequest, Projection, UnifiedIntrinsics, UnifiedProjectionCamera};

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of projecting a 3D point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionResult {
    /// Keypoint lies inside the image
    Visible,
    /// Projection is valid but the keypoint falls outside the image
    OutsideImageBounds,
    /// Point is behind the mirror or too close to the projection center
    Invalid,
}

impl ProjectionResult {
    pub fn is_keypoint_visible(self) -> bool {
        self == ProjectionResult::Visible
    }

    /// Valid projections carry a meaningful keypoint, even outside the image.
    pub fn is_valid(self) -> bool {
        self != ProjectionResult::Invalid
    }
}

impl fmt::Display for ProjectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectionResult::Visible => "KEYPOINT_VISIBLE",
            ProjectionResult::OutsideImageBounds => "KEYPOINT_OUTSIDE_IMAGE_BOX",
            ProjectionResult::Invalid => "PROJECTION_INVALID",
        };
        f.write_str(s)
    }
}

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether `keypoint` lies in `[0, width) x [0, height)`
    pub fn contains(&self, keypoint: &Vector2<f64>) -> bool {
        keypoint.x >= 0.0
            && keypoint.y >= 0.0
            && keypoint.x < f64::from(self.width)
            && keypoint.y < f64::from(self.height)
    }
}

/// Generic CameraModel
pub trait CameraModel: fmt::Debug + Send + Sync {
    /// Project a 3D point in the camera frame to image coordinates.
    ///
    /// The keypoint is always written; it is meaningless when the result is
    /// [`ProjectionResult::Invalid`].
    fn project3(&self, point_3d: &Vector3<f64>) -> (Vector2<f64>, ProjectionResult);

    /// Back-project image coordinates to a bearing vector (not normalized).
    ///
    /// The flag reports whether the keypoint could be lifted; the bearing is
    /// written either way.
    fn back_project3(&self, keypoint: &Vector2<f64>) -> (Vector3<f64>, bool);

    /// Get image dimensions this camera is calibrated for
    fn image_size(&self) -> ImageSize;

    /// Linear camera matrix K built from focal lengths and principal point
    fn camera_matrix(&self) -> Matrix3<f64>;

    /// Attached lens distortion
    fn distortion(&self) -> &LensDistortion;

    fn is_keypoint_visible(&self, keypoint: &Vector2<f64>) -> bool {
        self.image_size().contains(keypoint)
    }
}
