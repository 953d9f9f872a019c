//! Map-based undistortion for unified projection cameras

pub mod camera_matrix;
pub mod error;
pub mod map;
pub mod undistorter;

pub use camera_matrix::{TargetModel, optimal_new_camera_matrix};
pub use error::{Result, UndistortError};
pub use map::{NO_SAMPLE, UndistortMap};
pub use undistorter::{InterpolationMethod, MappedUndistorter, UndistorterConfig, UndistorterExt};
