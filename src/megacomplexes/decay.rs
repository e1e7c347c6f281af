//! First-order decay kinetics, optionally convolved with a Gaussian IRF.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

use crate::error::{KinFitError, Result};
use crate::model::{Irf, IrfShape, MatrixContext, Megacomplex};
use crate::variables::VariableStore;

/// Topology of the decay network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayScheme {
    /// Every compartment decays independently to the ground state.
    Parallel,
    /// Each compartment feeds the next one; the first is populated at t = 0.
    Sequential,
}

/// Compartments decaying with first-order rates. Each compartment
/// contributes one column, labelled with the compartment name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayMegacomplex {
    pub compartments: Vec<String>,
    pub rates: Vec<String>,
    pub scheme: DecayScheme,
}

impl DecayMegacomplex {
    pub fn parallel(compartments: &[&str], rates: &[&str]) -> Self {
        Self::new(compartments, rates, DecayScheme::Parallel)
    }

    pub fn sequential(compartments: &[&str], rates: &[&str]) -> Self {
        Self::new(compartments, rates, DecayScheme::Sequential)
    }

    fn new(compartments: &[&str], rates: &[&str], scheme: DecayScheme) -> Self {
        Self {
            compartments: compartments.iter().map(|c| c.to_string()).collect(),
            rates: rates.iter().map(|r| r.to_string()).collect(),
            scheme,
        }
    }
}

/// `exp(-k t)` for all `t`, or its convolution with a Gaussian of center `mu`
/// and width `sigma` when an IRF shape is given:
///
/// `0.5 * exp(k (mu - t) + k^2 sigma^2 / 2) * erfc((k sigma^2 - (t - mu)) / (sigma sqrt 2))`
pub fn decay_basis(rate: f64, t: f64, irf: Option<IrfShape>) -> f64 {
    let Some(IrfShape {
        center: mu,
        width: sigma,
    }) = irf
    else {
        return (-rate * t).exp();
    };

    let shifted = t - mu;
    let x = (rate * sigma * sigma - shifted) / (sigma * SQRT_2);
    if x > 10.0 {
        // erfc(x) ~ exp(-x^2) / (x sqrt(pi)); the exponentials cancel to a Gaussian
        let inv_x2 = 1.0 / (x * x);
        let erfcx = (1.0 - 0.5 * inv_x2 + 0.75 * inv_x2 * inv_x2) / (x * PI.sqrt());
        0.5 * (-shifted * shifted / (2.0 * sigma * sigma)).exp() * erfcx
    } else {
        0.5 * (-rate * shifted + 0.5 * rate * rate * sigma * sigma).exp() * erfc(x)
    }
}

/// Coefficients `a[i][n]` such that compartment `n` of a sequential scheme is
/// `sum_i a[i][n] * exp(-k_i t)`.
fn sequential_coefficients(rates: &[f64]) -> Result<Vec<Vec<f64>>> {
    let n = rates.len();
    let mut coefficients = vec![vec![0.0; n]; n];
    for target in 0..n {
        let feed: f64 = rates[..target].iter().product();
        for i in 0..=target {
            let mut denominator = 1.0;
            for j in 0..=target {
                if j != i {
                    denominator *= rates[j] - rates[i];
                }
            }
            if denominator == 0.0 {
                return Err(KinFitError::LinearAlgebra(format!(
                    "sequential decay rates coincide ({})",
                    rates[i]
                )));
            }
            coefficients[i][target] = feed / denominator;
        }
    }
    Ok(coefficients)
}

impl Megacomplex for DecayMegacomplex {
    fn type_name(&self) -> &'static str {
        "decay"
    }

    fn clp_labels(&self, _dataset: &str) -> Vec<String> {
        self.compartments.clone()
    }

    fn variable_names(&self) -> Vec<String> {
        self.rates.clone()
    }

    fn check_dataset(&self, dataset: &str, _irf: Option<&Irf>) -> Result<()> {
        if self.rates.len() != self.compartments.len() {
            return Err(KinFitError::Configuration(format!(
                "{} in dataset '{dataset}' has {} compartments but {} rates",
                self.type_name(),
                self.compartments.len(),
                self.rates.len()
            )));
        }
        Ok(())
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        variables: &VariableStore,
    ) -> Result<Array2<f64>> {
        let rates = self
            .rates
            .iter()
            .map(|name| variables.value(name))
            .collect::<std::result::Result<Vec<f64>, _>>()?;
        let shape = context.irf_shape(variables)?;
        let times = context.model_axis;

        let basis = Array2::from_shape_fn((times.len(), rates.len()), |(row, col)| {
            decay_basis(rates[col], times[row], shape)
        });

        match self.scheme {
            DecayScheme::Parallel => Ok(basis),
            DecayScheme::Sequential => {
                let coefficients = sequential_coefficients(&rates)?;
                let transform = Array2::from_shape_fn((rates.len(), rates.len()), |(i, n)| {
                    coefficients[i][n]
                });
                Ok(basis.dot(&transform))
            }
        }
    }
}
