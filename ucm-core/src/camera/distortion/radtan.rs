use super::{Distortion, assert_parameter_count};
use crate::error::DistortionError;
use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};

const NUM_PARAMS: usize = 4;

/// Radial-tangential (plumb bob) distortion with parameters (k1, k2, p1, p2)
#[derive(Debug, Clone, PartialEq)]
pub struct RadTanDistortion {
    params: DVector<f64>,
}

impl RadTanDistortion {
    pub fn new(k1: f64, k2: f64, p1: f64, p2: f64) -> Self {
        Self {
            params: DVector::from_vec(vec![k1, k2, p1, p2]),
        }
    }

    pub fn from_parameters(params: DVector<f64>) -> Result<Self, DistortionError> {
        if params.len() != NUM_PARAMS {
            return Err(DistortionError::WrongParameterCount {
                expected: NUM_PARAMS,
                got: params.len(),
            });
        }
        Ok(Self { params })
    }

    /// Mild barrel distortion for unit tests
    pub fn test_distortion() -> Self {
        Self::new(-0.2, 0.13, 0.0005, 0.0005)
    }
}

impl Distortion for RadTanDistortion {
    fn name(&self) -> &'static str {
        "radtan"
    }

    fn parameter_count(&self) -> usize {
        NUM_PARAMS
    }

    fn parameters(&self) -> &DVector<f64> {
        &self.params
    }

    fn distort_external(
        &self,
        params: &DVector<f64>,
        point: &Vector2<f64>,
        jacobian: Option<&mut Matrix2<f64>>,
    ) -> Vector2<f64> {
        assert_parameter_count(self.name(), params, NUM_PARAMS);
        let (k1, k2, p1, p2) = (params[0], params[1], params[2], params[3]);
        let (x, y) = (point.x, point.y);

        let mx2 = x * x;
        let my2 = y * y;
        let mxy = x * y;
        let r2 = mx2 + my2;
        let radial = k1 * r2 + k2 * r2 * r2;

        if let Some(jac) = jacobian {
            let d_radial = 2.0 * k1 + 4.0 * k2 * r2;
            jac[(0, 0)] = 1.0 + radial + d_radial * mx2 + 2.0 * p1 * y + 6.0 * p2 * x;
            jac[(0, 1)] = d_radial * mxy + 2.0 * p1 * x + 2.0 * p2 * y;
            jac[(1, 0)] = d_radial * mxy + 2.0 * p2 * y + 2.0 * p1 * x;
            jac[(1, 1)] = 1.0 + radial + d_radial * my2 + 2.0 * p2 * x + 6.0 * p1 * y;
        }

        Vector2::new(
            x + x * radial + 2.0 * p1 * mxy + p2 * (r2 + 2.0 * mx2),
            y + y * radial + 2.0 * p2 * mxy + p1 * (r2 + 2.0 * my2),
        )
    }

    fn parameter_jacobian(
        &self,
        params: Option<&DVector<f64>>,
        point: &Vector2<f64>,
    ) -> Matrix2xX<f64> {
        if let Some(params) = params {
            assert_parameter_count(self.name(), params, NUM_PARAMS);
        }
        let (x, y) = (point.x, point.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;

        let mut jac = Matrix2xX::zeros(NUM_PARAMS);
        jac[(0, 0)] = x * r2;
        jac[(0, 1)] = x * r4;
        jac[(0, 2)] = 2.0 * x * y;
        jac[(0, 3)] = r2 + 2.0 * x * x;
        jac[(1, 0)] = y * r2;
        jac[(1, 1)] = y * r4;
        jac[(1, 2)] = r2 + 2.0 * y * y;
        jac[(1, 3)] = 2.0 * x * y;
        jac
    }

    fn clone_box(&self) -> Box<dyn Distortion> {
        Box::new(self.clone())
    }
}
