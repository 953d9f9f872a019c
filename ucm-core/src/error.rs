use thiserror::Error;

/// Common errors across the camera model crates
#[derive(Error, Debug)]
pub enum UcmError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Distortion error: {0}")]
    Distortion(#[from] DistortionError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Invalid intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("Expected {expected} intrinsic parameters, got {got}")]
    WrongParameterCount { expected: usize, got: usize },

    #[error("Invalid image size: {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Depth must be positive, got {0}")]
    NonPositiveDepth(f64),

    #[error("Back-projection of keypoint ({0}, {1}) failed")]
    BackProjectionFailed(f64, f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistortionError {
    #[error("Expected {expected} distortion parameters, got {got}")]
    WrongParameterCount { expected: usize, got: usize },

    #[error("Singular distortion Jacobian")]
    SingularJacobian,

    #[error("Undistortion did not converge")]
    NonConvergent,
}

pub type Result<T> = std::result::Result<T, UcmError>;
