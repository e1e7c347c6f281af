//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Bound constraints are honoured by projecting every trial point onto the
//! box before it is evaluated. The damped normal equations use Marquardt
//! scaling, `(J^T J + lambda * diag(J^T J)) dx = -J^T r`.

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{KinFitError, Result};
use crate::problem::Problem;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::cancel::CancelToken;
use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Cost at the start and after every accepted step
    pub cost_history: Vec<f64>,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of residual evaluations (excluding Jacobian evaluations)
    pub func_evals: usize,

    /// Number of Jacobian evaluations
    pub jacobian_evals: usize,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
    cancel: Option<CancelToken>,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for the relative cost reduction.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative step size.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the gradient norm.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Check the token between iterations and stop with `KinFitError::Cancelled`.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// Running out of iterations or damping does not produce an error: the
    /// best point found is returned with the corresponding `status`. A
    /// numerical failure at a trial point (see [`KinFitError::is_numerical`])
    /// rejects the step like a non-finite cost; one in the Jacobian ends the
    /// run with `NumericalError`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    ///
    /// # Errors
    ///
    /// * `KinFitError::Dimension` if the initial guess has the wrong length
    /// * `KinFitError::Bounds` if the initial guess violates the problem bounds
    /// * `KinFitError::Cancelled` if the cancel token was set
    /// * Any non-numerical error raised by the problem's residual or Jacobian
    ///   evaluation, and any error at the initial point
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(KinFitError::Dimension(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let bounds = problem.bounds();
        if let Some((lower, upper)) = &bounds {
            for (i, &value) in initial_params.iter().enumerate() {
                if value < lower[i] || value > upper[i] {
                    return Err(KinFitError::Bounds(format!(
                        "initial parameter {} = {} is outside [{}, {}]",
                        i, value, lower[i], upper[i]
                    )));
                }
            }
        }
        let project = |x: Array1<f64>| -> Array1<f64> {
            match &bounds {
                Some((lower, upper)) => {
                    let mut x = x;
                    for i in 0..x.len() {
                        x[i] = x[i].max(lower[i]).min(upper[i]);
                    }
                    x
                }
                None => x,
            }
        };

        let criteria =
            ConvergenceCriteria::new(self.config.xtol, self.config.ftol, self.config.gtol);

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut cost_history = vec![cost];
        let mut lambda = self.config.initial_lambda;
        let mut func_evals = 1;
        let mut jacobian_evals = 0;
        let mut iterations = 0;

        let status = if n_params == 0 {
            ConvergenceStatus::ParameterConvergence
        } else {
            'outer: loop {
                if self.is_cancelled() {
                    info!("Optimization cancelled after {} iterations", iterations);
                    return Err(KinFitError::Cancelled);
                }
                if iterations >= self.config.max_iterations {
                    break ConvergenceStatus::MaxIterationsReached;
                }
                iterations += 1;

                let jac = match problem.jacobian(&params) {
                    Ok(jac) => ndarray_to_nalgebra(jac.view()),
                    Err(e) if e.is_numerical() => {
                        warn!("Jacobian evaluation failed at iteration {}: {}", iterations, e);
                        break ConvergenceStatus::NumericalError;
                    }
                    Err(e) => return Err(e),
                };
                jacobian_evals += 1;
                let r = ndarray_vec_to_nalgebra(&residuals);

                let gradient = jac.transpose() * &r;
                if criteria.gradient_converged(gradient.amax()) {
                    break ConvergenceStatus::GradientConvergence;
                }

                let jtj = jac.transpose() * &jac;

                // Retry with growing damping until a step reduces the cost.
                loop {
                    let step = match solve_damped(&jtj, &gradient, lambda) {
                        Some(step) => nalgebra_vec_to_ndarray(&step),
                        None => {
                            lambda *= self.config.lambda_up_factor;
                            if lambda > self.config.max_lambda {
                                break 'outer ConvergenceStatus::NumericalError;
                            }
                            continue;
                        }
                    };

                    let trial = project(&params + &step);
                    let actual_step = &trial - &params;
                    let step_norm = norm(&actual_step);
                    let params_norm = norm(&params);

                    func_evals += 1;
                    let (trial_residuals, trial_cost) = match problem.eval(&trial) {
                        Ok(r) => {
                            let c = sum_of_squares(&r);
                            (r, c)
                        }
                        Err(e) if e.is_numerical() => {
                            debug!("iteration {}: trial point rejected: {}", iterations, e);
                            (Array1::zeros(0), f64::NAN)
                        }
                        Err(e) => return Err(e),
                    };

                    if trial_cost.is_finite() && trial_cost < cost {
                        let cost_converged = criteria.cost_converged(cost, trial_cost);
                        debug!(
                            "iteration {}: cost {:.6e} -> {:.6e}, lambda {:.1e}",
                            iterations, cost, trial_cost, lambda
                        );

                        params = trial;
                        residuals = trial_residuals;
                        cost = trial_cost;
                        cost_history.push(cost);
                        lambda = (lambda * self.config.lambda_down_factor)
                            .max(self.config.min_lambda);

                        if cost_converged {
                            break 'outer ConvergenceStatus::FunctionValueConvergence;
                        }
                        if criteria.step_converged(step_norm, params_norm) {
                            break 'outer ConvergenceStatus::ParameterConvergence;
                        }
                        break;
                    }

                    // A rejected step that is already negligible means the
                    // current point is a minimum to within xtol. A failed or
                    // non-finite trial says nothing about that.
                    if trial_cost.is_finite()
                        && criteria.step_converged(step_norm, params_norm)
                    {
                        break 'outer ConvergenceStatus::ParameterConvergence;
                    }

                    lambda *= self.config.lambda_up_factor;
                    if lambda > self.config.max_lambda {
                        break 'outer ConvergenceStatus::NumericalError;
                    }
                }
            }
        };

        if status == ConvergenceStatus::NumericalError {
            warn!(
                "Levenberg-Marquardt stopped after {} iterations: {}",
                iterations,
                status.description()
            );
        } else {
            info!(
                "Levenberg-Marquardt finished after {} iterations with cost {:.6e}: {}",
                iterations,
                cost,
                status.description()
            );
        }

        let jacobian = if self.config.calc_jacobian {
            jacobian_evals += 1;
            match problem.jacobian(&params) {
                Ok(jac) => Some(jac),
                Err(e) if e.is_numerical() => {
                    warn!("Jacobian at the solution could not be evaluated: {}", e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            cost_history,
            iterations,
            func_evals,
            jacobian_evals,
            status,
            success: status.is_converged(),
            message: status.description().to_string(),
            jacobian,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancelToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Solve `(J^T J + lambda * D) dx = -g` with `D = diag(J^T J)`.
///
/// Cholesky first; SVD when the damped matrix is not numerically positive definite.
fn solve_damped(jtj: &DMatrix<f64>, gradient: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    if !jtj.iter().chain(gradient.iter()).all(|v| v.is_finite()) {
        return None;
    }
    let n = jtj.nrows();
    let mut a = jtj.clone();
    for i in 0..n {
        a[(i, i)] += lambda * jtj[(i, i)].max(f64::EPSILON);
    }
    let rhs = -gradient.clone();

    let step = match a.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => a.svd(true, true).solve(&rhs, f64::EPSILON).ok()?,
    };

    if step.iter().all(|v| v.is_finite()) {
        Some(step)
    } else {
        None
    }
}

fn sum_of_squares(values: &Array1<f64>) -> f64 {
    values.iter().map(|v| v * v).sum()
}

fn norm(values: &Array1<f64>) -> f64 {
    sum_of_squares(values).sqrt()
}
