use super::{CameraModel, ImageSize, LensDistortion, ProjectionResult, validity};
use crate::error::{CameraError, Result};
use nalgebra::{Matrix3, Vector2, Vector3};
use std::fmt;

/// Pinhole camera model with optional distortion
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    image_size: ImageSize,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    distortion: LensDistortion,
}

impl PinholeCamera {
    /// Create a new pinhole camera with the given distortion
    pub fn new(
        image_size: ImageSize,
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        distortion: LensDistortion,
    ) -> Result<Self> {
        if !(fx > 0.0 && fy > 0.0) {
            return Err(CameraError::InvalidIntrinsics(format!(
                "focal lengths must be positive, got ({}, {})",
                fx, fy
            ))
            .into());
        }
        if !(cx.is_finite() && cy.is_finite()) {
            return Err(CameraError::InvalidIntrinsics(format!(
                "principal point must be finite, got ({}, {})",
                cx, cy
            ))
            .into());
        }
        if image_size.width == 0 || image_size.height == 0 {
            return Err(CameraError::InvalidImageSize {
                width: image_size.width,
                height: image_size.height,
            }
            .into());
        }
        Ok(Self {
            image_size,
            fx,
            fy,
            cx,
            cy,
            distortion,
        })
    }

    /// Create a new pinhole camera with no distortion
    pub fn new_ideal(image_size: ImageSize, fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self> {
        Self::new(image_size, fx, fy, cx, cy, LensDistortion::none())
    }

    /// Create a pinhole camera from `[fx, fy, cx, cy]`
    pub fn from_parameters(params: &[f64], image_size: ImageSize) -> Result<Self> {
        match *params {
            [fx, fy, cx, cy] => Self::new_ideal(image_size, fx, fy, cx, cy),
            _ => Err(CameraError::WrongParameterCount {
                expected: 4,
                got: params.len(),
            }
            .into()),
        }
    }

    /// Get focal lengths
    pub fn focal_length(&self) -> (f64, f64) {
        (self.fx, self.fy)
    }

    /// Get principal point
    pub fn principal_point(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }
}

impl CameraModel for PinholeCamera {
    fn project3(&self, point_camera: &Vector3<f64>) -> (Vector2<f64>, ProjectionResult) {
        if point_camera.z <= 0.0 {
            return (Vector2::zeros(), ProjectionResult::Invalid);
        }

        // Normalized coordinates
        let normalized = Vector2::new(
            point_camera.x / point_camera.z,
            point_camera.y / point_camera.z,
        );

        let distorted = self.distortion.distort(None, &normalized, None);

        // To pixel coordinates
        let keypoint = Vector2::new(
            self.fx * distorted.x + self.cx,
            self.fy * distorted.y + self.cy,
        );

        let result = validity::evaluate_projection_result(&keypoint, point_camera, self.image_size);
        (keypoint, result)
    }

    fn back_project3(&self, keypoint: &Vector2<f64>) -> (Vector3<f64>, bool) {
        // Pixel to distorted normalized coordinates
        let distorted = Vector2::new(
            (keypoint.x - self.cx) / self.fx,
            (keypoint.y - self.cy) / self.fy,
        );

        match self.distortion.undistort(&distorted) {
            Ok(normalized) => (Vector3::new(normalized.x, normalized.y, 1.0), true),
            Err(_) => (Vector3::zeros(), false),
        }
    }

    fn image_size(&self) -> ImageSize {
        self.image_size
    }

    fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    fn distortion(&self) -> &LensDistortion {
        &self.distortion
    }
}

impl fmt::Display for PinholeCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pinhole camera")?;
        writeln!(
            f,
            "  image size (cols,rows): {}, {}",
            self.image_size.width, self.image_size.height
        )?;
        writeln!(f, "  focal length (cols,rows): {}, {}", self.fx, self.fy)?;
        writeln!(f, "  optical center (cols,rows): {}, {}", self.cx, self.cy)?;
        write!(f, "  distortion: {}", self.distortion)
    }
}
