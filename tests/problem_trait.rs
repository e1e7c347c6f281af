//! The nonlinear solver on hand-written problems, without the separable layer.

use approx::assert_relative_eq;
use kinfit_rs::lm::{ConvergenceStatus, LmConfig};
use kinfit_rs::{KinFitError, LevenbergMarquardt, Problem, Result};
use ndarray::{array, Array1, Array2};

/// Single-exponential decay `y = a * exp(-k t)` with an analytic Jacobian.
struct MonoExponential {
    t: Array1<f64>,
    y: Array1<f64>,
    bounded: bool,
    /// Rates at or above this value fail like a singular matrix
    singular_from: Option<f64>,
}

impl MonoExponential {
    fn new(a: f64, k: f64) -> Self {
        let t = Array1::linspace(0.0, 8.0, 33);
        let y = t.mapv(|t| a * (-k * t).exp());
        Self {
            t,
            y,
            bounded: false,
            singular_from: None,
        }
    }
}

impl Problem for MonoExponential {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != 2 {
            return Err(KinFitError::Dimension(format!(
                "Expected 2 parameters, got {}",
                params.len()
            )));
        }
        let (a, k) = (params[0], params[1]);
        if self.singular_from.map_or(false, |limit| k >= limit) {
            return Err(KinFitError::LinearAlgebra(format!("singular at k = {k}")));
        }
        Ok(&self.t.mapv(|t| a * (-k * t).exp()) - &self.y)
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.t.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let (a, k) = (params[0], params[1]);
        Ok(Array2::from_shape_fn((self.t.len(), 2), |(i, j)| {
            let e = (-k * self.t[i]).exp();
            if j == 0 {
                e
            } else {
                -a * self.t[i] * e
            }
        }))
    }

    fn bounds(&self) -> Option<(Array1<f64>, Array1<f64>)> {
        self.bounded
            .then(|| (array![0.0, 0.0], array![10.0, 0.3]))
    }
}

#[test]
fn test_cost_is_sum_of_squares() {
    let problem = MonoExponential::new(2.0, 0.5);
    assert_relative_eq!(problem.eval_cost(&array![2.0, 0.5]).unwrap(), 0.0);

    let params = array![1.0, 0.5];
    let residuals = problem.eval(&params).unwrap();
    assert_relative_eq!(
        problem.eval_cost(&params).unwrap(),
        residuals.dot(&residuals),
        epsilon = 1e-12
    );
}

#[test]
fn test_wrong_parameter_count() {
    let problem = MonoExponential::new(2.0, 0.5);
    let result = LevenbergMarquardt::new().minimize(&problem, array![1.0]);
    assert!(matches!(result, Err(KinFitError::Dimension(_))));
}

#[test]
fn test_converges_to_truth() {
    let problem = MonoExponential::new(2.0, 0.5);
    let result = LevenbergMarquardt::new()
        .minimize(&problem, array![1.0, 0.2])
        .unwrap();

    assert!(result.success, "{}", result.message);
    assert!(result.status.is_converged());
    assert_relative_eq!(result.params[0], 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.params[1], 0.5, epsilon = 1e-6);
    assert!(result.cost < 1e-12);
}

#[test]
fn test_active_bound_holds() {
    let mut problem = MonoExponential::new(2.0, 0.5);
    problem.bounded = true;
    let result = LevenbergMarquardt::new()
        .minimize(&problem, array![1.0, 0.2])
        .unwrap();

    assert!(result.params[1] <= 0.3);
    assert_relative_eq!(result.params[1], 0.3, epsilon = 1e-6);
    assert!(result.cost > 0.0);
}

#[test]
fn test_start_outside_bounds() {
    let mut problem = MonoExponential::new(2.0, 0.5);
    problem.bounded = true;
    let result = LevenbergMarquardt::new().minimize(&problem, array![1.0, 0.4]);
    assert!(matches!(result, Err(KinFitError::Bounds(_))));
}

#[test]
fn test_jacobian_returned_on_request() {
    let problem = MonoExponential::new(2.0, 0.5);
    let config = LmConfig {
        calc_jacobian: true,
        ..LmConfig::default()
    };
    let result = LevenbergMarquardt::with_config(config)
        .minimize(&problem, array![1.5, 0.4])
        .unwrap();

    let jacobian = result.jacobian.unwrap();
    let expected = problem.jacobian(&result.params).unwrap();
    assert_eq!(jacobian.dim(), (33, 2));
    for (a, b) in jacobian.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
    assert_ne!(result.status, ConvergenceStatus::MaxIterationsReached);
}

#[test]
fn test_failing_trial_points_are_rejected() {
    let mut problem = MonoExponential::new(2.0, 0.5);
    problem.singular_from = Some(0.4);
    let start = array![1.0, 0.1];
    let initial_cost = problem.eval_cost(&start).unwrap();

    let result = LevenbergMarquardt::new().minimize(&problem, start).unwrap();

    assert!(result.params[1] < 0.4);
    assert!(result.cost < initial_cost);
    assert!(result.cost.is_finite());
}
