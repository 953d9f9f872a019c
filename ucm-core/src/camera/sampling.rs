//! Random keypoints and points for exercising a camera in tests

use super::{CameraModel, UnifiedProjectionCamera};
use crate::error::{CameraError, Result};
use nalgebra::{Vector2, Vector3};
use rand::Rng;
use std::f64::consts::TAU;
use tracing::debug;

const MAX_SAMPLING_TRIES: usize = 20;

impl UnifiedProjectionCamera {
    /// Draw a keypoint that is both visible and liftable.
    ///
    /// Samples are drawn on the normalized plane inside the disk that bounds
    /// the image (and, for `xi > 1`, the liftable disk), then distorted and
    /// mapped to pixels. Returns `None` once the retry bound is exhausted.
    pub fn try_random_keypoint_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vector2<f64>> {
        let max_radius = self.max_normalized_radius();

        for _ in 0..MAX_SAMPLING_TRIES {
            let angle = rng.random_range(0.0..TAU);
            let radius = rng.random::<f64>() * max_radius;
            let normalized = Vector2::new(radius * angle.cos(), radius * angle.sin());

            let distorted = self.distortion().distort(None, &normalized, None);
            let keypoint = Vector2::new(
                self.fu() * distorted.x + self.cu(),
                self.fv() * distorted.y + self.cv(),
            );

            if self.is_keypoint_visible(&keypoint) && self.is_liftable(&keypoint) {
                return Some(keypoint);
            }
        }
        None
    }

    /// Like [`Self::try_random_keypoint_with`], falling back to the image center.
    pub fn random_keypoint_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector2<f64> {
        self.try_random_keypoint_with(rng).unwrap_or_else(|| {
            debug!(
                tries = MAX_SAMPLING_TRIES,
                "failed to produce a random keypoint, using the image center"
            );
            Vector2::new(self.cu(), self.cv())
        })
    }

    pub fn random_keypoint(&self) -> Vector2<f64> {
        self.random_keypoint_with(&mut rand::rng())
    }

    /// A random visible point at distance `depth` from the projection center.
    pub fn random_visible_point_with<R: Rng + ?Sized>(
        &self,
        depth: f64,
        rng: &mut R,
    ) -> Result<Vector3<f64>> {
        if !(depth > 0.0) {
            return Err(CameraError::NonPositiveDepth(depth).into());
        }

        let keypoint = self.random_keypoint_with(rng);
        let (bearing, valid) = self.back_project3(&keypoint);
        if !valid {
            return Err(CameraError::BackProjectionFailed(keypoint.x, keypoint.y).into());
        }

        Ok(bearing.normalize() * depth)
    }

    pub fn random_visible_point(&self, depth: f64) -> Result<Vector3<f64>> {
        self.random_visible_point_with(depth, &mut rand::rng())
    }

    /// Radius of the farthest image corner on the normalized plane, clipped
    /// to the liftable disk when `xi > 1`.
    fn max_normalized_radius(&self) -> f64 {
        let size = self.image_size();
        let du = self.cu().max(f64::from(size.width) - self.cu()) / self.fu();
        let dv = self.cv().max(f64::from(size.height) - self.cv()) / self.fv();
        let corner = du.hypot(dv);

        let xi = self.xi();
        if xi > 1.0 {
            corner.min((1.0 / (xi * xi - 1.0)).sqrt())
        } else {
            corner
        }
    }
}
