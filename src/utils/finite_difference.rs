//! Finite-difference Jacobians.
//!
//! Each column perturbs one free variable and re-evaluates the full residual,
//! which for a separable problem means rebuilding the matrices and solving the
//! linear sub-problems again. Columns are independent and can run in parallel.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KinFitError, Result};

/// Difference scheme used for each Jacobian column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceMethod {
    /// `(f(x + h) - f(x)) / h`, one extra evaluation per column
    #[default]
    Forward,

    /// `(f(x + h) - f(x - h)) / 2h`, two extra evaluations per column
    Central,
}

/// Finite-difference policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiniteDifference {
    pub method: DifferenceMethod,

    /// Step relative to `max(|x|, 1)`. `None` picks `sqrt(eps)` for forward and
    /// `cbrt(eps)` for central differences.
    pub relative_step: Option<f64>,

    /// Evaluate columns on the rayon pool.
    pub parallel: bool,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self {
            method: DifferenceMethod::Forward,
            relative_step: None,
            parallel: true,
        }
    }
}

impl FiniteDifference {
    pub fn forward() -> Self {
        Self::default()
    }

    pub fn central() -> Self {
        Self {
            method: DifferenceMethod::Central,
            ..Self::default()
        }
    }

    pub fn with_relative_step(mut self, step: f64) -> Self {
        self.relative_step = Some(step);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn step(&self, x: f64) -> f64 {
        let relative = self.relative_step.unwrap_or(match self.method {
            DifferenceMethod::Forward => f64::EPSILON.sqrt(),
            DifferenceMethod::Central => f64::EPSILON.cbrt(),
        });
        relative * x.abs().max(1.0)
    }

    /// Compute the Jacobian `J[i, j] = d f_i / d x_j`.
    ///
    /// Steps that would leave `[lower, upper]` are taken from the other side, so
    /// `f` is never called outside the bounds.
    ///
    /// # Arguments
    ///
    /// * `f` - Residual function
    /// * `x` - Point at which to differentiate
    /// * `f0` - `f(x)` if already known (saves one evaluation for forward differences)
    /// * `bounds` - Optional lower and upper bounds of `x`
    pub fn jacobian<F>(
        &self,
        f: F,
        x: &Array1<f64>,
        f0: Option<&Array1<f64>>,
        bounds: Option<(&Array1<f64>, &Array1<f64>)>,
    ) -> Result<Array2<f64>>
    where
        F: Fn(&Array1<f64>) -> Result<Array1<f64>> + Sync,
    {
        let base = match f0 {
            Some(values) => values.clone(),
            None => f(x)?,
        };
        let n_params = x.len();
        let n_residuals = base.len();

        let column = |j: usize| -> Result<Array1<f64>> {
            let h = self.step(x[j]);
            let (lo, hi) = match bounds {
                Some((lower, upper)) => (lower[j], upper[j]),
                None => (f64::NEG_INFINITY, f64::INFINITY),
            };
            let fits_up = x[j] + h <= hi;
            let fits_down = x[j] - h >= lo;

            let shifted = |delta: f64| -> Result<Array1<f64>> {
                let mut perturbed = x.clone();
                perturbed[j] += delta;
                let values = f(&perturbed)?;
                if values.len() != n_residuals {
                    return Err(KinFitError::Dimension(format!(
                        "Expected {} residuals, got {}",
                        n_residuals,
                        values.len()
                    )));
                }
                Ok(values)
            };

            match self.method {
                DifferenceMethod::Central if fits_up && fits_down => {
                    Ok((shifted(h)? - shifted(-h)?) / (2.0 * h))
                }
                _ if fits_up || !fits_down => Ok((shifted(h)? - &base) / h),
                _ => Ok((&base - &shifted(-h)?) / h),
            }
        };

        let columns: Vec<Array1<f64>> = if self.parallel {
            (0..n_params)
                .into_par_iter()
                .map(column)
                .collect::<Result<_>>()?
        } else {
            (0..n_params).map(column).collect::<Result<_>>()?
        };

        let mut jac = Array2::zeros((n_residuals, n_params));
        for (j, values) in columns.into_iter().enumerate() {
            jac.column_mut(j).assign(&values);
        }

        Ok(jac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn model(p: &Array1<f64>) -> Result<Array1<f64>> {
        let t = array![0.0, 0.5, 1.0, 2.0];
        Ok(t.mapv(|t| p[0] * (-p[1] * t).exp()))
    }

    fn analytic(p: &Array1<f64>) -> Array2<f64> {
        let t = array![0.0, 0.5, 1.0, 2.0];
        let mut jac = Array2::zeros((4, 2));
        for (i, &t) in t.iter().enumerate() {
            jac[[i, 0]] = (-p[1] * t).exp();
            jac[[i, 1]] = -p[0] * t * (-p[1] * t).exp();
        }
        jac
    }

    #[test]
    fn test_forward_and_central_match_analytic() {
        let p = array![2.0, 0.7];
        let expected = analytic(&p);

        let forward = FiniteDifference::forward().jacobian(model, &p, None, None).unwrap();
        let central = FiniteDifference::central()
            .with_parallel(false)
            .jacobian(model, &p, None, None)
            .unwrap();

        for (a, b) in forward.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
        for (a, b) in central.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_steps_stay_inside_bounds() {
        let p = array![2.0, 0.7];
        let lower = array![0.0, 0.0];
        let upper = array![2.0, 0.7];

        let guarded = |q: &Array1<f64>| -> Result<Array1<f64>> {
            if q[0] > 2.0 || q[1] > 0.7 {
                return Err(KinFitError::Bounds("left the box".to_string()));
            }
            model(q)
        };

        let jac = FiniteDifference::central()
            .jacobian(guarded, &p, None, Some((&lower, &upper)))
            .unwrap();
        // one-sided fallback with the central step size is less accurate
        let expected = analytic(&p);
        for (a, b) in jac.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }
}
