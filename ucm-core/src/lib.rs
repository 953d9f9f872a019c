pub mod camera;
pub mod config;
pub mod error;

pub use camera::{
    CameraModel, Distortion, EquidistantDistortion, ImageSize, JacobianRequest, LensDistortion,
    PinholeCamera, Projection, ProjectionResult, RadTanDistortion, UnifiedIntrinsics,
    UnifiedProjectionCamera,
};
pub use config::{CameraConfig, DistortionConfig};
pub use error::{CameraError, DistortionError, Result, UcmError};
