use crate::error::Result;
use nalgebra::Vector2;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;
use ucm_core::{CameraModel, ProjectionResult};

/// Map entry of an output pixel with no source in the input image
pub const NO_SAMPLE: f32 = -1.0;

/// Source coordinates this close below zero are snapped onto the border, in pixels
const BORDER_TOLERANCE: f64 = 1e-6;

/// Per-pixel lookup from an output image into an input image.
///
/// Both maps have shape `(height, width)` of the output image. Every entry is
/// either [`NO_SAMPLE`] or a coordinate inside the input image.
#[derive(Debug, Clone, PartialEq)]
pub struct UndistortMap {
    map_u: Array2<f32>,
    map_v: Array2<f32>,
}

impl UndistortMap {
    /// Build the map by lifting each output pixel through `output` and
    /// projecting the bearing through `input`.
    pub fn build<I, O>(input: &I, output: &O) -> Result<Self>
    where
        I: CameraModel + ?Sized,
        O: CameraModel + ?Sized,
    {
        let out_size = output.image_size();
        let in_size = input.image_size();
        let width = out_size.width as usize;
        let height = out_size.height as usize;
        let (max_u, max_v) = (in_size.width as f32, in_size.height as f32);

        let samples: Vec<(f32, f32)> = (0..width * height)
            .into_par_iter()
            .map(|idx| {
                let keypoint = Vector2::new((idx % width) as f64, (idx / width) as f64);
                let (bearing, liftable) = output.back_project3(&keypoint);
                if !liftable {
                    return (NO_SAMPLE, NO_SAMPLE);
                }
                let (source, result) = input.project3(&bearing);
                if result == ProjectionResult::Invalid {
                    return (NO_SAMPLE, NO_SAMPLE);
                }
                let source = source.map(snap_to_border);
                if !in_size.contains(&source) {
                    return (NO_SAMPLE, NO_SAMPLE);
                }
                // Narrowing may round onto the far border.
                let (u, v) = (source.x as f32, source.y as f32);
                if u < max_u && v < max_v {
                    (u, v)
                } else {
                    (NO_SAMPLE, NO_SAMPLE)
                }
            })
            .collect();

        let (us, vs): (Vec<f32>, Vec<f32>) = samples.into_iter().unzip();
        let map = Self {
            map_u: Array2::from_shape_vec((height, width), us)?,
            map_v: Array2::from_shape_vec((height, width), vs)?,
        };
        debug!(
            width,
            height,
            no_sample = map.no_sample_count(),
            "built undistort map"
        );
        Ok(map)
    }

    pub fn width(&self) -> usize {
        self.map_u.ncols()
    }

    pub fn height(&self) -> usize {
        self.map_u.nrows()
    }

    pub fn map_u(&self) -> &Array2<f32> {
        &self.map_u
    }

    pub fn map_v(&self) -> &Array2<f32> {
        &self.map_v
    }

    /// Source coordinate of output pixel `(col, row)`, `None` without a sample
    pub fn get(&self, col: usize, row: usize) -> Option<(f32, f32)> {
        let u = *self.map_u.get((row, col))?;
        let v = *self.map_v.get((row, col))?;
        (u != NO_SAMPLE && v != NO_SAMPLE).then_some((u, v))
    }

    pub fn no_sample_count(&self) -> usize {
        self.map_u.iter().filter(|&&u| u == NO_SAMPLE).count()
    }
}

fn snap_to_border(coord: f64) -> f64 {
    if (-BORDER_TOLERANCE..0.0).contains(&coord) {
        0.0
    } else {
        coord
    }
}
