use thiserror::Error;
use ucm_core::UcmError;

#[derive(Error, Debug)]
pub enum UndistortError {
    #[error("Camera error: {0}")]
    Camera(#[from] UcmError),

    #[error("alpha must lie in [0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("scale must be positive, got {0}")]
    InvalidScale(f64),

    #[error("Image size {width}x{height} does not match camera {expected_width}x{expected_height}")]
    ImageSizeMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("No liftable sample on the {0} border of the image")]
    NotEnoughBorderSamples(&'static str),

    #[error("Degenerate undistorted view: {0}")]
    DegenerateView(String),

    #[error("Invalid array shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, UndistortError>;
