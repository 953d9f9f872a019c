use super::{Distortion, assert_parameter_count};
use crate::error::DistortionError;
use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};

const NUM_PARAMS: usize = 4;
const MIN_RADIUS: f64 = 1e-8;

/// Equidistant fisheye distortion on the incidence angle, parameters (k1, k2, k3, k4)
#[derive(Debug, Clone, PartialEq)]
pub struct EquidistantDistortion {
    params: DVector<f64>,
}

impl EquidistantDistortion {
    pub fn new(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        Self {
            params: DVector::from_vec(vec![k1, k2, k3, k4]),
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

    pub fn test_distortion() -> Self {
        Self::new(0.1, 0.01, -0.02, 0.002)
    }
}

impl Distortion for EquidistantDistortion {
    fn name(&self) -> &'static str {
        "equidistant"
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
        let (k1, k2, k3, k4) = (params[0], params[1], params[2], params[3]);

        let r = point.norm();
        if r < MIN_RADIUS {
            if let Some(jac) = jacobian {
                *jac = Matrix2::identity();
            }
            return *point;
        }

        let theta = r.atan();
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;

        let theta_d = theta * (1.0 + k1 * theta2 + k2 * theta4 + k3 * theta6 + k4 * theta8);
        let scale = theta_d / r;

        if let Some(jac) = jacobian {
            let d_theta_d = 1.0 + 3.0 * k1 * theta2 + 5.0 * k2 * theta4 + 7.0 * k3 * theta6
                + 9.0 * k4 * theta8;
            let d_theta_dr = 1.0 / (1.0 + r * r);
            // d(scale)/dr, then d(scale)/d(point) = d(scale)/dr * point / r
            let d_scale_dr = (d_theta_d * d_theta_dr * r - theta_d) / (r * r);
            let outer = point * point.transpose() * (d_scale_dr / r);
            *jac = Matrix2::identity() * scale + outer;
        }

        point * scale
    }

    fn parameter_jacobian(
        &self,
        params: Option<&DVector<f64>>,
        point: &Vector2<f64>,
    ) -> Matrix2xX<f64> {
        if let Some(params) = params {
            assert_parameter_count(self.name(), params, NUM_PARAMS);
        }
        let mut jac = Matrix2xX::zeros(NUM_PARAMS);

        let r = point.norm();
        if r < MIN_RADIUS {
            return jac;
        }

        let theta = r.atan();
        let theta2 = theta * theta;
        let mut theta_pow = theta * theta2;
        for i in 0..NUM_PARAMS {
            let column = point * (theta_pow / r);
            jac.set_column(i, &column);
            theta_pow *= theta2;
        }
        jac
    }

    fn clone_box(&self) -> Box<dyn Distortion> {
        Box::new(self.clone())
    }
}
