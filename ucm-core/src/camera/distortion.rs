//! Lens distortion contract and the owning handle cameras hold

mod equidistant;
mod radtan;

pub use equidistant::EquidistantDistortion;
pub use radtan::RadTanDistortion;

use crate::error::DistortionError;
use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};
use std::fmt;
use tracing::trace;

const MAX_UNDISTORT_ITERATIONS: usize = 20;
const UNDISTORT_TOLERANCE_SQ: f64 = 1e-24;

/// A lens distortion model acting on normalized image-plane coordinates.
///
/// Implementations provide the forward mapping with its 2x2 Jacobian and the
/// Jacobian w.r.t. their own parameters. Inversion defaults to Newton
/// iteration on the forward mapping.
pub trait Distortion: fmt::Debug + Send + Sync {
    /// Short identifier of the model, e.g. `"radtan"`.
    fn name(&self) -> &'static str;

    /// Number of distortion parameters.
    fn parameter_count(&self) -> usize;

    /// Current parameter vector.
    fn parameters(&self) -> &DVector<f64>;

    /// Distort `point` with caller-supplied parameters.
    ///
    /// When `jacobian` is given it receives d(distorted)/d(point).
    ///
    /// # Panics
    ///
    /// Panics if `params` does not hold exactly [`Distortion::parameter_count`] entries.
    fn distort_external(
        &self,
        params: &DVector<f64>,
        point: &Vector2<f64>,
        jacobian: Option<&mut Matrix2<f64>>,
    ) -> Vector2<f64>;

    /// Jacobian of the distorted point w.r.t. the distortion parameters (2 x N),
    /// evaluated at the undistorted `point`. `None` uses the model's own parameters.
    fn parameter_jacobian(&self, params: Option<&DVector<f64>>, point: &Vector2<f64>)
    -> Matrix2xX<f64>;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn Distortion>;

    /// Distort `point` with the model's own parameters.
    fn distort(&self, point: &Vector2<f64>, jacobian: Option<&mut Matrix2<f64>>) -> Vector2<f64> {
        self.distort_external(self.parameters(), point, jacobian)
    }

    /// Remove distortion from `point` by Newton iteration on [`Distortion::distort`].
    fn undistort(&self, point: &Vector2<f64>) -> Result<Vector2<f64>, DistortionError> {
        let params = self.parameters();
        let mut estimate = *point;

        for _ in 0..MAX_UNDISTORT_ITERATIONS {
            let mut jacobian = Matrix2::identity();
            let distorted = self.distort_external(params, &estimate, Some(&mut jacobian));
            let residual = distorted - point;

            if residual.norm_squared() < UNDISTORT_TOLERANCE_SQ {
                return Ok(estimate);
            }

            let Some(jacobian_inv) = jacobian.try_inverse() else {
                trace!(model = self.name(), "singular distortion Jacobian while undistorting");
                return Err(DistortionError::SingularJacobian);
            };
            estimate -= jacobian_inv * residual;
            if !estimate.iter().all(|v| v.is_finite()) {
                break;
            }
        }

        trace!(
            model = self.name(),
            x = point.x,
            y = point.y,
            "undistortion did not converge"
        );
        Err(DistortionError::NonConvergent)
    }

    /// Value equality across trait objects.
    fn equals(&self, other: &dyn Distortion) -> bool {
        self.name() == other.name() && self.parameters() == other.parameters()
    }
}

pub(crate) fn assert_parameter_count(name: &str, params: &DVector<f64>, expected: usize) {
    assert_eq!(
        params.len(),
        expected,
        "{} distortion expects {} parameters, got {}",
        name,
        expected,
        params.len()
    );
}

/// Optional, exclusively owned distortion model.
///
/// An empty handle behaves as the identity distortion, so projection code
/// never branches on presence itself.
#[derive(Debug, Default)]
pub struct LensDistortion {
    model: Option<Box<dyn Distortion>>,
}

impl LensDistortion {
    /// Identity distortion
    pub fn none() -> Self {
        Self { model: None }
    }

    pub fn new<D: Distortion + 'static>(model: D) -> Self {
        Self {
            model: Some(Box::new(model)),
        }
    }

    pub fn from_box(model: Box<dyn Distortion>) -> Self {
        Self { model: Some(model) }
    }

    /// Whether a distortion model is attached
    pub fn is_active(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&dyn Distortion> {
        self.model.as_deref()
    }

    pub fn parameters(&self) -> Option<&DVector<f64>> {
        self.model.as_ref().map(|m| m.parameters())
    }

    /// Number of distortion parameters, zero without a model
    pub fn parameter_count(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.parameter_count())
    }

    /// Forward distortion. `params` overrides the model's own parameters.
    pub fn distort(
        &self,
        params: Option<&DVector<f64>>,
        point: &Vector2<f64>,
        jacobian: Option<&mut Matrix2<f64>>,
    ) -> Vector2<f64> {
        match &self.model {
            None => {
                if let Some(jacobian) = jacobian {
                    *jacobian = Matrix2::identity();
                }
                *point
            }
            Some(model) => model.distort_external(params.unwrap_or(model.parameters()), point, jacobian),
        }
    }

    /// Inverse distortion; the identity without a model.
    pub fn undistort(&self, point: &Vector2<f64>) -> Result<Vector2<f64>, DistortionError> {
        match &self.model {
            None => Ok(*point),
            Some(model) => model.undistort(point),
        }
    }

    /// Parameter Jacobian, `None` without a model.
    pub fn parameter_jacobian(
        &self,
        params: Option<&DVector<f64>>,
        point: &Vector2<f64>,
    ) -> Option<Matrix2xX<f64>> {
        self.model
            .as_ref()
            .map(|model| model.parameter_jacobian(params, point))
    }
}

impl Clone for LensDistortion {
    fn clone(&self) -> Self {
        Self {
            model: self.model.as_ref().map(|m| m.clone_box()),
        }
    }
}

impl PartialEq for LensDistortion {
    fn eq(&self, other: &Self) -> bool {
        match (&self.model, &other.model) {
            (None, None) => true,
            (Some(a), Some(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Display for LensDistortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            None => write!(f, "none"),
            Some(model) => {
                write!(f, "{} [", model.name())?;
                for (i, p) in model.parameters().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_round_trip() {
        let m = LensDistortion::none();
        let p = Vector2::new(0.123, -0.456);
        let mut jac = Matrix2::zeros();
        let pd = m.distort(None, &p, Some(&mut jac));
        assert_eq!(pd, p);
        assert_eq!(jac, Matrix2::identity());
        assert_eq!(m.undistort(&pd), Ok(p));
        assert!(m.parameter_jacobian(None, &p).is_none());
        assert_eq!(m.parameter_count(), 0);
    }

    #[test]
    fn radtan_round_trip() {
        let m = LensDistortion::new(RadTanDistortion::new(-0.1, 0.01, 0.001, -0.001));
        let p = Vector2::new(0.2, -0.15);
        let pd = m.distort(None, &p, None);
        let pu = m.undistort(&pd).unwrap();
        assert!((p - pu).norm() < 1e-10);
    }

    #[test]
    fn equidistant_round_trip() {
        let m = LensDistortion::new(EquidistantDistortion::new(0.01, 0.001, 0.0, 0.0));
        let p = Vector2::new(0.3, 0.1);
        let pd = m.distort(None, &p, None);
        let pu = m.undistort(&pd).unwrap();
        assert!((p - pu).norm() < 1e-10);
    }

    #[test]
    fn signals_non_convergence() {
        let m = LensDistortion::new(RadTanDistortion::new(1e6, 1e6, 1.0, -1.0));
        let res = m.undistort(&Vector2::new(100.0, 100.0));
        assert_eq!(res, Err(DistortionError::NonConvergent));
    }

    #[test]
    fn unreachable_radius_is_an_error() {
        // Equidistant radii are bounded by theta_d(pi / 2), about 1.7 here.
        let m = LensDistortion::new(EquidistantDistortion::test_distortion());
        assert!(m.undistort(&Vector2::new(-3.2, -2.4)).is_err());

        // k1 = -1/3 folds the radial curve over at the unit circle.
        let m = LensDistortion::new(RadTanDistortion::new(-1.0 / 3.0, 0.0, 0.0, 0.0));
        assert!(m.undistort(&Vector2::new(1.0, 0.0)).is_err());
    }

    #[test]
    fn external_parameters_override_own() {
        let m = LensDistortion::new(RadTanDistortion::new(-0.1, 0.01, 0.001, -0.001));
        let p = Vector2::new(0.2, -0.15);
        let zero = DVector::zeros(4);
        assert_eq!(m.distort(Some(&zero), &p, None), p);
    }

    #[test]
    fn clone_is_deep_and_equal() {
        let m = LensDistortion::new(RadTanDistortion::test_distortion());
        let c = m.clone();
        assert_eq!(m, c);
        let (a, b) = (m.model().unwrap(), c.model().unwrap());
        assert!(!std::ptr::addr_eq(a as *const dyn Distortion, b as *const dyn Distortion));
    }

    #[test]
    fn equality_depends_on_presence_and_values() {
        let none = LensDistortion::none();
        let radtan = LensDistortion::new(RadTanDistortion::test_distortion());
        let other = LensDistortion::new(RadTanDistortion::new(0.0, 0.0, 0.0, 0.0));
        let equidistant = LensDistortion::new(EquidistantDistortion::new(0.0, 0.0, 0.0, 0.0));

        assert_eq!(none, LensDistortion::none());
        assert_ne!(none, radtan);
        assert_ne!(radtan, none);
        assert_ne!(radtan, other);
        assert_ne!(other, equidistant);
    }

    #[test]
    fn display_lists_parameters() {
        let m = LensDistortion::new(RadTanDistortion::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(m.to_string(), "radtan [1, 2, 3, 4]");
        assert_eq!(LensDistortion::none().to_string(), "none");
    }
}
