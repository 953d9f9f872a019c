//! Unified projection model for catadioptric and wide-angle cameras.
//!
//! A point is projected onto the unit sphere, then perspectively from a
//! center shifted by the mirror parameter `xi` along the optical axis:
//!
//! ```text
//! d  = |(x, y, z)|
//! m  = (x, y) / (z + xi * d)
//! m' = distort(m)
//! uv = (fu * m'.x + cu, fv * m'.y + cv)
//! ```
//!
//! Intrinsic parameter order: `xi, fu, fv, cu, cv`.
//!
//! References: Geyer & Daniilidis, "A unifying theory for central panoramic
//! systems and practical implications", ECCV 2000. Barreto & Araujo, "Issues
//! on the geometry of central catadioptric image formation", CVPR 2001.

use super::{CameraModel, ImageSize, LensDistortion, ProjectionResult, validity};
use crate::error::{CameraError, DistortionError, Result};
use nalgebra::{DVector, Matrix2, Matrix2x3, Matrix2xX, Matrix3, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

const NUM_PARAMS: usize = 5;

/// Intrinsic parameters of the unified projection model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnifiedIntrinsics {
    /// Mirror parameter
    pub xi: f64,
    /// Focal length along columns (pixels)
    pub fu: f64,
    /// Focal length along rows (pixels)
    pub fv: f64,
    /// Principal point column (pixels)
    pub cu: f64,
    /// Principal point row (pixels)
    pub cv: f64,
}

impl UnifiedIntrinsics {
    pub const PARAMETER_COUNT: usize = NUM_PARAMS;

    pub fn new(xi: f64, fu: f64, fv: f64, cu: f64, cv: f64) -> Self {
        Self { xi, fu, fv, cu, cv }
    }

    /// Read `[xi, fu, fv, cu, cv]` from a parameter vector.
    ///
    /// Only the length is checked here; values are validated when a camera is built.
    pub fn from_slice(params: &[f64]) -> Result<Self> {
        match *params {
            [xi, fu, fv, cu, cv] => Ok(Self { xi, fu, fv, cu, cv }),
            _ => Err(CameraError::WrongParameterCount {
                expected: NUM_PARAMS,
                got: params.len(),
            }
            .into()),
        }
    }

    pub fn to_vector(&self) -> SVector<f64, NUM_PARAMS> {
        SVector::<f64, NUM_PARAMS>::new(self.xi, self.fu, self.fv, self.cu, self.cv)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.xi >= 0.0) || !self.xi.is_finite() {
            return Err(invalid(format!("xi must be non-negative, got {}", self.xi)));
        }
        if !(self.fu > 0.0 && self.fv > 0.0) {
            return Err(invalid(format!(
                "focal lengths must be positive, got ({}, {})",
                self.fu, self.fv
            )));
        }
        if !(self.cu > 0.0 && self.cv > 0.0) {
            return Err(invalid(format!(
                "principal point must be positive, got ({}, {})",
                self.cu, self.cv
            )));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> crate::error::UcmError {
    CameraError::InvalidIntrinsics(msg).into()
}

/// Which Jacobians [`UnifiedProjectionCamera::project3_functional`] computes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JacobianRequest {
    pub point: bool,
    pub intrinsics: bool,
    pub distortion: bool,
}

impl JacobianRequest {
    pub const NONE: Self = Self {
        point: false,
        intrinsics: false,
        distortion: false,
    };

    pub const ALL: Self = Self {
        point: true,
        intrinsics: true,
        distortion: true,
    };
}

/// Keypoint, outcome and the requested Jacobians of one projection.
///
/// A Jacobian is `Some` exactly when it was requested. On an invalid
/// projection the keypoint and all requested Jacobians are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub keypoint: Vector2<f64>,
    pub result: ProjectionResult,
    /// d(keypoint)/d(point), 2x3
    pub jacobian_point: Option<Matrix2x3<f64>>,
    /// d(keypoint)/d(xi, fu, fv, cu, cv), 2x5
    pub jacobian_intrinsics: Option<SMatrix<f64, 2, NUM_PARAMS>>,
    /// d(keypoint)/d(distortion parameters), 2xN; zero columns without distortion
    pub jacobian_distortion: Option<Matrix2xX<f64>>,
}

impl Projection {
    fn invalid(request: JacobianRequest, distortion_params: usize) -> Self {
        Self {
            keypoint: Vector2::zeros(),
            result: ProjectionResult::Invalid,
            jacobian_point: request.point.then(|| Matrix2x3::zeros()),
            jacobian_intrinsics: request
                .intrinsics
                .then(|| SMatrix::<f64, 2, NUM_PARAMS>::zeros()),
            jacobian_distortion: request
                .distortion
                .then(|| Matrix2xX::zeros(distortion_params)),
        }
    }
}

/// Unified projection camera with optional lens distortion
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedProjectionCamera {
    intrinsics: UnifiedIntrinsics,
    image_size: ImageSize,
    distortion: LensDistortion,
}

impl UnifiedProjectionCamera {
    /// Create a camera, validating intrinsics and image size
    pub fn new(
        intrinsics: UnifiedIntrinsics,
        image_size: ImageSize,
        distortion: LensDistortion,
    ) -> Result<Self> {
        intrinsics.validate()?;
        if image_size.width == 0 || image_size.height == 0 {
            return Err(CameraError::InvalidImageSize {
                width: image_size.width,
                height: image_size.height,
            }
            .into());
        }
        Ok(Self {
            intrinsics,
            image_size,
            distortion,
        })
    }

    /// Create a camera with no distortion
    pub fn new_ideal(intrinsics: UnifiedIntrinsics, image_size: ImageSize) -> Result<Self> {
        Self::new(intrinsics, image_size, LensDistortion::none())
    }

    /// Create a camera from the parameter vector `[xi, fu, fv, cu, cv]`
    pub fn from_parameters(
        params: &[f64],
        image_size: ImageSize,
        distortion: LensDistortion,
    ) -> Result<Self> {
        Self::new(UnifiedIntrinsics::from_slice(params)?, image_size, distortion)
    }

    /// `xi = 0.9, fu = fv = 400, cu = 320, cv = 240` on a 640x480 image, no distortion
    pub fn test_camera() -> Self {
        Self::test_camera_with_distortion(LensDistortion::none())
    }

    pub fn test_camera_with_distortion(distortion: LensDistortion) -> Self {
        Self {
            intrinsics: UnifiedIntrinsics::new(0.9, 400.0, 400.0, 320.0, 240.0),
            image_size: ImageSize::new(640, 480),
            distortion,
        }
    }

    pub const fn parameter_count() -> usize {
        NUM_PARAMS
    }

    pub fn intrinsics(&self) -> &UnifiedIntrinsics {
        &self.intrinsics
    }

    /// Mirror parameter
    pub fn xi(&self) -> f64 {
        self.intrinsics.xi
    }

    pub fn fu(&self) -> f64 {
        self.intrinsics.fu
    }

    pub fn fv(&self) -> f64 {
        self.intrinsics.fv
    }

    pub fn cu(&self) -> f64 {
        self.intrinsics.cu
    }

    pub fn cv(&self) -> f64 {
        self.intrinsics.cv
    }

    pub fn fov_parameter(&self) -> f64 {
        validity::fov_parameter(self.intrinsics.xi)
    }

    /// Project a point, computing the requested Jacobians.
    ///
    /// `intrinsics_external` and `distortion_external` replace the camera's own
    /// parameters when given; the latter is ignored without a distortion model.
    pub fn project3_functional(
        &self,
        point_3d: &Vector3<f64>,
        intrinsics_external: Option<&UnifiedIntrinsics>,
        distortion_external: Option<&DVector<f64>>,
        request: JacobianRequest,
    ) -> Projection {
        let UnifiedIntrinsics { xi, fu, fv, cu, cv } =
            *intrinsics_external.unwrap_or(&self.intrinsics);
        let (x, y, z) = (point_3d.x, point_3d.y, point_3d.z);

        let d = point_3d.norm();
        if !validity::is_in_projection_domain(z, d, xi) {
            return Projection::invalid(request, self.distortion.parameter_count());
        }

        let rz = 1.0 / (z + xi * d);
        let normalized = Vector2::new(x * rz, y * rz);

        // The xi column chains through the distortion Jacobian as well.
        let mut j_distortion = Matrix2::identity();
        let distorted = self.distortion.distort(
            distortion_external,
            &normalized,
            (request.point || request.intrinsics).then_some(&mut j_distortion),
        );
        let j_pixel = Matrix2::new(fu, 0.0, 0.0, fv) * j_distortion;

        let jacobian_point = request.point.then(|| {
            let rz2 = rz * rz / d;
            let dz = rz2 * (-xi * z - d);
            let j_normalized = Matrix2x3::new(
                rz2 * (d * z + xi * (y * y + z * z)),
                -rz2 * xi * x * y,
                x * dz,
                -rz2 * xi * x * y,
                rz2 * (d * z + xi * (x * x + z * z)),
                y * dz,
            );
            j_pixel * j_normalized
        });

        let jacobian_intrinsics = request.intrinsics.then(|| {
            let d_normalized_d_xi = -normalized * (d * rz);
            let mut jac = SMatrix::<f64, 2, NUM_PARAMS>::zeros();
            jac.set_column(0, &(j_pixel * d_normalized_d_xi));
            jac[(0, 1)] = distorted.x;
            jac[(1, 2)] = distorted.y;
            jac[(0, 3)] = 1.0;
            jac[(1, 4)] = 1.0;
            jac
        });

        let jacobian_distortion = request.distortion.then(|| {
            match self.distortion.parameter_jacobian(distortion_external, &normalized) {
                Some(mut jac) => {
                    jac.row_mut(0).scale_mut(fu);
                    jac.row_mut(1).scale_mut(fv);
                    jac
                }
                None => Matrix2xX::zeros(0),
            }
        });

        let keypoint = Vector2::new(fu * distorted.x + cu, fv * distorted.y + cv);

        Projection {
            keypoint,
            result: validity::evaluate_projection_result(&keypoint, point_3d, self.image_size),
            jacobian_point,
            jacobian_intrinsics,
            jacobian_distortion,
        }
    }

    /// Project a point and return the Jacobian w.r.t. the point
    pub fn project3_with_jacobian(
        &self,
        point_3d: &Vector3<f64>,
    ) -> (Vector2<f64>, Matrix2x3<f64>, ProjectionResult) {
        let projection = self.project3_functional(
            point_3d,
            None,
            None,
            JacobianRequest {
                point: true,
                ..JacobianRequest::NONE
            },
        );
        (
            projection.keypoint,
            projection.jacobian_point.unwrap_or_else(|| Matrix2x3::zeros()),
            projection.result,
        )
    }

    /// Whether `keypoint` can be lifted onto the unit sphere
    pub fn is_liftable(&self, keypoint: &Vector2<f64>) -> bool {
        self.undistorted_normalized(keypoint).is_ok_and(|normalized| {
            validity::is_undistorted_keypoint_valid(normalized.norm_squared(), self.intrinsics.xi)
        })
    }

    fn undistorted_normalized(
        &self,
        keypoint: &Vector2<f64>,
    ) -> std::result::Result<Vector2<f64>, DistortionError> {
        let normalized = Vector2::new(
            (keypoint.x - self.intrinsics.cu) / self.intrinsics.fu,
            (keypoint.y - self.intrinsics.cv) / self.intrinsics.fv,
        );
        self.distortion.undistort(&normalized)
    }
}

impl CameraModel for UnifiedProjectionCamera {
    fn project3(&self, point_3d: &Vector3<f64>) -> (Vector2<f64>, ProjectionResult) {
        let projection = self.project3_functional(point_3d, None, None, JacobianRequest::NONE);
        (projection.keypoint, projection.result)
    }

    fn back_project3(&self, keypoint: &Vector2<f64>) -> (Vector3<f64>, bool) {
        let xi = self.intrinsics.xi;
        let Ok(normalized) = self.undistorted_normalized(keypoint) else {
            return (Vector3::zeros(), false);
        };

        let rho2 = normalized.norm_squared();
        let t = (1.0 + (1.0 - xi * xi) * rho2).max(0.0);

        let bearing = Vector3::new(
            normalized.x,
            normalized.y,
            1.0 - xi * (rho2 + 1.0) / (xi + t.sqrt()),
        );
        (bearing, validity::is_undistorted_keypoint_valid(rho2, xi))
    }

    fn image_size(&self) -> ImageSize {
        self.image_size
    }

    fn camera_matrix(&self) -> Matrix3<f64> {
        let UnifiedIntrinsics { fu, fv, cu, cv, .. } = self.intrinsics;
        Matrix3::new(fu, 0.0, cu, 0.0, fv, cv, 0.0, 0.0, 1.0)
    }

    fn distortion(&self) -> &LensDistortion {
        &self.distortion
    }
}

impl fmt::Display for UnifiedProjectionCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unified projection camera")?;
        writeln!(
            f,
            "  image size (cols,rows): {}, {}",
            self.image_size.width, self.image_size.height
        )?;
        writeln!(f, "  mirror parameter (xi): {}", self.intrinsics.xi)?;
        writeln!(
            f,
            "  focal length (cols,rows): {}, {}",
            self.intrinsics.fu, self.intrinsics.fv
        )?;
        writeln!(
            f,
            "  optical center (cols,rows): {}, {}",
            self.intrinsics.cu, self.intrinsics.cv
        )?;
        write!(f, "  distortion: {}", self.distortion)
    }
}
