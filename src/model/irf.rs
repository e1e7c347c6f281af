//! Gaussian instrument response function.

use serde::{Deserialize, Serialize};

use crate::variables::VariableStore;
use crate::Result;

/// Gaussian instrument response with optional polynomial dispersion of its
/// center and width along the global axis.
///
/// With dispersion coefficients `c_1..c_n` the center at global value `g` is
/// `center + sum_i c_i * ((g - g0) / 100)^i`, where `g0` is the dispersion
/// center. The width disperses the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Irf {
    /// Variable holding the center
    pub center: String,

    /// Variable holding the width (standard deviation)
    pub width: String,

    #[serde(default)]
    pub center_dispersion: Vec<String>,

    #[serde(default)]
    pub width_dispersion: Vec<String>,

    /// Reference point `g0` of the dispersion polynomials; defaults to the
    /// mean of the dataset's global axis
    #[serde(default)]
    pub dispersion_center: Option<f64>,
}

/// Center and width resolved for one global value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrfShape {
    pub center: f64,
    pub width: f64,
}

impl Irf {
    pub fn gaussian(center: &str, width: &str) -> Self {
        Self {
            center: center.to_string(),
            width: width.to_string(),
            center_dispersion: Vec::new(),
            width_dispersion: Vec::new(),
            dispersion_center: None,
        }
    }

    pub fn with_center_dispersion(mut self, coefficients: &[&str]) -> Self {
        self.center_dispersion = coefficients.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_width_dispersion(mut self, coefficients: &[&str]) -> Self {
        self.width_dispersion = coefficients.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_dispersion_center(mut self, center: f64) -> Self {
        self.dispersion_center = Some(center);
        self
    }

    /// `true` if the shape changes along the global axis.
    pub fn is_dispersed(&self) -> bool {
        !self.center_dispersion.is_empty() || !self.width_dispersion.is_empty()
    }

    pub fn variable_names(&self) -> Vec<String> {
        let mut names = vec![self.center.clone(), self.width.clone()];
        names.extend(self.center_dispersion.iter().cloned());
        names.extend(self.width_dispersion.iter().cloned());
        names
    }

    /// Resolve center and width at a global value.
    ///
    /// Without a global value, or without dispersion, the undispersed shape is
    /// returned.
    pub fn shape(
        &self,
        variables: &VariableStore,
        global_value: Option<f64>,
        global_axis: &[f64],
    ) -> Result<IrfShape> {
        let mut center = variables.value(&self.center)?;
        let mut width = variables.value(&self.width)?;

        if let (Some(g), true) = (global_value, self.is_dispersed()) {
            let g0 = self.dispersion_center.unwrap_or_else(|| {
                if global_axis.is_empty() {
                    0.0
                } else {
                    global_axis.iter().sum::<f64>() / global_axis.len() as f64
                }
            });
            let x = (g - g0) / 100.0;
            center += polynomial(&self.center_dispersion, variables, x)?;
            width += polynomial(&self.width_dispersion, variables, x)?;
        }

        Ok(IrfShape { center, width })
    }
}

fn polynomial(coefficients: &[String], variables: &VariableStore, x: f64) -> Result<f64> {
    let mut sum = 0.0;
    let mut power = x;
    for name in coefficients {
        sum += variables.value(name)? * power;
        power *= x;
    }
    Ok(sum)
}
