//! Serializable camera descriptions

use crate::camera::{
    EquidistantDistortion, ImageSize, LensDistortion, RadTanDistortion, UnifiedIntrinsics,
    UnifiedProjectionCamera,
};
use crate::error::Result;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Distortion model and its coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coefficients", rename_all = "lowercase")]
pub enum DistortionConfig {
    /// k1, k2, p1, p2
    Radtan(Vec<f64>),
    /// k1, k2, k3, k4
    Equidistant(Vec<f64>),
}

impl DistortionConfig {
    pub fn build(&self) -> Result<LensDistortion> {
        let distortion = match self {
            DistortionConfig::Radtan(coeffs) => LensDistortion::new(
                RadTanDistortion::from_parameters(DVector::from_column_slice(coeffs))?,
            ),
            DistortionConfig::Equidistant(coeffs) => LensDistortion::new(
                EquidistantDistortion::from_parameters(DVector::from_column_slice(coeffs))?,
            ),
        };
        Ok(distortion)
    }
}

/// Description of a unified projection camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// xi, fu, fv, cu, cv
    pub intrinsics: Vec<f64>,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distortion: Option<DistortionConfig>,
}

impl CameraConfig {
    /// Validate and build the camera
    pub fn build(&self) -> Result<UnifiedProjectionCamera> {
        let intrinsics = UnifiedIntrinsics::from_slice(&self.intrinsics)?;
        let distortion = match &self.distortion {
            Some(config) => config.build()?,
            None => LensDistortion::none(),
        };
        UnifiedProjectionCamera::new(
            intrinsics,
            ImageSize::new(self.width, self.height),
            distortion,
        )
    }
}
