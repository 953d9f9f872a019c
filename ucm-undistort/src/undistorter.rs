use crate::camera_matrix::{TargetModel, optimal_new_camera_matrix, scaled_image_size};
use crate::error::{Result, UndistortError};
use crate::map::UndistortMap;
use image::{ImageBuffer, Pixel};
use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use ucm_core::{
    CameraError, CameraModel, ImageSize, PinholeCamera, UcmError, UnifiedIntrinsics,
    UnifiedProjectionCamera,
};

/// Pixel interpolation used when resampling through an [`UndistortMap`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    Nearest,
    #[default]
    Linear,
}

/// Settings of the undistorter factories
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndistorterConfig {
    /// 0 keeps only valid pixels, 1 keeps every input pixel
    pub alpha: f64,
    /// Output size relative to the input image
    pub scale: f64,
    pub interpolation: InterpolationMethod,
}

impl Default for UndistorterConfig {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            scale: 1.0,
            interpolation: InterpolationMethod::Linear,
        }
    }
}

impl UndistorterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(UndistortError::InvalidAlpha(self.alpha));
        }
        if !(self.scale > 0.0) {
            return Err(UndistortError::InvalidScale(self.scale));
        }
        Ok(())
    }
}

/// Undistorts images of the input camera into the view of the output camera
/// through a precomputed map.
#[derive(Debug, Clone)]
pub struct MappedUndistorter<I, O> {
    input: I,
    output: O,
    map: UndistortMap,
    interpolation: InterpolationMethod,
}

impl<I: CameraModel, O: CameraModel> MappedUndistorter<I, O> {
    pub fn new(input: I, output: O, interpolation: InterpolationMethod) -> Result<Self> {
        let map = UndistortMap::build(&input, &output)?;
        Ok(Self {
            input,
            output,
            map,
            interpolation,
        })
    }

    pub fn input_camera(&self) -> &I {
        &self.input
    }

    pub fn output_camera(&self) -> &O {
        &self.output
    }

    pub fn map(&self) -> &UndistortMap {
        &self.map
    }

    pub fn interpolation(&self) -> InterpolationMethod {
        self.interpolation
    }

    /// Resample an input image into the output view.
    ///
    /// Output pixels without a source are left at zero.
    pub fn process_image<P>(
        &self,
        image: &ImageBuffer<P, Vec<u8>>,
    ) -> Result<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = image.dimensions();
        self.check_input_size(width, height)?;

        let out_size = self.output.image_size();
        let mut output = ImageBuffer::<P, Vec<u8>>::new(out_size.width, out_size.height);
        let raster = Raster {
            data: image.as_raw(),
            width: width as usize,
            height: height as usize,
            channels: usize::from(P::CHANNEL_COUNT),
        };
        remap(&raster, &self.map, self.interpolation, &mut output);
        Ok(output)
    }

    /// Resample a `[height, width, bands]` array into the output view.
    pub fn process_array(&self, image: &Array3<u8>) -> Result<Array3<u8>> {
        let (height, width, bands) = image.dim();
        self.check_input_size(width as u32, height as u32)?;

        let data = image.as_standard_layout();
        let raster = Raster {
            data: data.as_slice().unwrap_or_default(),
            width,
            height,
            channels: bands,
        };
        let out_size = self.output.image_size();
        let (out_h, out_w) = (out_size.height as usize, out_size.width as usize);
        let mut output = vec![0u8; out_h * out_w * bands];
        remap(&raster, &self.map, self.interpolation, &mut output);
        Ok(Array3::from_shape_vec((out_h, out_w, bands), output)?)
    }

    fn check_input_size(&self, width: u32, height: u32) -> Result<()> {
        let expected = self.input.image_size();
        if (width, height) != (expected.width, expected.height) {
            return Err(UndistortError::ImageSizeMismatch {
                width,
                height,
                expected_width: expected.width,
                expected_height: expected.height,
            });
        }
        Ok(())
    }
}

/// Row-major interleaved 8-bit image
struct Raster<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    channels: usize,
}

impl Raster<'_> {
    fn at(&self, col: usize, row: usize, channel: usize) -> f32 {
        f32::from(self.data[(row * self.width + col) * self.channels + channel])
    }

    fn sample(&self, u: f32, v: f32, method: InterpolationMethod, out: &mut [u8]) {
        let max_col = self.width - 1;
        let max_row = self.height - 1;
        match method {
            InterpolationMethod::Nearest => {
                let col = (u.round() as usize).min(max_col);
                let row = (v.round() as usize).min(max_row);
                let start = (row * self.width + col) * self.channels;
                out.copy_from_slice(&self.data[start..start + self.channels]);
            }
            InterpolationMethod::Linear => {
                let (x0, y0) = (u.floor(), v.floor());
                let (wx, wy) = (u - x0, v - y0);
                let (c0, r0) = ((x0 as usize).min(max_col), (y0 as usize).min(max_row));
                let (c1, r1) = ((c0 + 1).min(max_col), (r0 + 1).min(max_row));
                for (ch, value) in out.iter_mut().enumerate() {
                    let top = self.at(c0, r0, ch) * (1.0 - wx) + self.at(c1, r0, ch) * wx;
                    let bottom = self.at(c0, r1, ch) * (1.0 - wx) + self.at(c1, r1, ch) * wx;
                    *value = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

fn remap(input: &Raster<'_>, map: &UndistortMap, method: InterpolationMethod, output: &mut [u8]) {
    let channels = input.channels;
    let row_len = map.width() * channels;
    debug_assert!(input.data.len() >= input.width * input.height * channels);
    if row_len == 0 {
        return;
    }

    output
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(row, line)| {
            for (col, pixel) in line.chunks_mut(channels).enumerate() {
                if let Some((u, v)) = map.get(col, row) {
                    input.sample(u, v, method, pixel);
                }
            }
        });
}

/// Undistorter factories on [`UnifiedProjectionCamera`]
pub trait UndistorterExt {
    /// Undistorter into a unified view with the same mirror parameter and no
    /// distortion.
    fn create_mapped_undistorter(
        &self,
        alpha: f64,
        scale: f64,
        interpolation: InterpolationMethod,
    ) -> Result<MappedUndistorter<UnifiedProjectionCamera, UnifiedProjectionCamera>>;

    /// Undistorter into a pinhole view.
    fn create_mapped_undistorter_to_pinhole(
        &self,
        alpha: f64,
        scale: f64,
        interpolation: InterpolationMethod,
    ) -> Result<MappedUndistorter<UnifiedProjectionCamera, PinholeCamera>>;
}

impl UndistorterExt for UnifiedProjectionCamera {
    fn create_mapped_undistorter(
        &self,
        alpha: f64,
        scale: f64,
        interpolation: InterpolationMethod,
    ) -> Result<MappedUndistorter<UnifiedProjectionCamera, UnifiedProjectionCamera>> {
        let size = checked_output_size(self, alpha, scale, interpolation)?;
        let k = optimal_new_camera_matrix(self, alpha, scale, TargetModel::Unified)?;
        let output = UnifiedProjectionCamera::new_ideal(
            UnifiedIntrinsics::new(self.xi(), k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)]),
            size,
        )?;

        let undistorter = MappedUndistorter::new(self.clone(), output, interpolation)?;
        info!(
            alpha,
            scale,
            ?interpolation,
            width = size.width,
            height = size.height,
            "created unified undistorter"
        );
        Ok(undistorter)
    }

    fn create_mapped_undistorter_to_pinhole(
        &self,
        alpha: f64,
        scale: f64,
        interpolation: InterpolationMethod,
    ) -> Result<MappedUndistorter<UnifiedProjectionCamera, PinholeCamera>> {
        let size = checked_output_size(self, alpha, scale, interpolation)?;
        let k = optimal_new_camera_matrix(self, alpha, scale, TargetModel::Pinhole)?;
        let output =
            PinholeCamera::new_ideal(size, k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])?;

        let undistorter = MappedUndistorter::new(self.clone(), output, interpolation)?;
        info!(
            alpha,
            scale,
            ?interpolation,
            width = size.width,
            height = size.height,
            "created pinhole undistorter"
        );
        Ok(undistorter)
    }
}

fn checked_output_size(
    camera: &UnifiedProjectionCamera,
    alpha: f64,
    scale: f64,
    interpolation: InterpolationMethod,
) -> Result<ImageSize> {
    UndistorterConfig {
        alpha,
        scale,
        interpolation,
    }
    .validate()?;
    let size = scaled_image_size(camera.image_size(), scale);
    if size.width == 0 || size.height == 0 {
        return Err(UcmError::from(CameraError::InvalidImageSize {
            width: size.width,
            height: size.height,
        })
        .into());
    }
    Ok(size)
}
