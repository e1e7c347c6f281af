//! Damped oscillations, each contributing a cosine and a sine column.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::model::{MatrixContext, Megacomplex};
use crate::variables::VariableStore;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    pub label: String,
    /// Variable holding the angular frequency
    pub frequency: String,
    /// Variable holding the damping rate
    pub rate: String,
}

/// Columns `exp(-r t) cos(w t)` and `exp(-r t) sin(w t)` labelled
/// `<label>_cos` and `<label>_sin` for every oscillation.
///
/// With an IRF, time is measured from the IRF center and the columns are zero
/// before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampedOscillation {
    pub oscillations: Vec<Oscillation>,
}

impl DampedOscillation {
    pub fn new() -> Self {
        Self {
            oscillations: Vec::new(),
        }
    }

    pub fn with_oscillation(mut self, label: &str, frequency: &str, rate: &str) -> Self {
        self.oscillations.push(Oscillation {
            label: label.to_string(),
            frequency: frequency.to_string(),
            rate: rate.to_string(),
        });
        self
    }
}

impl Default for DampedOscillation {
    fn default() -> Self {
        Self::new()
    }
}

impl Megacomplex for DampedOscillation {
    fn type_name(&self) -> &'static str {
        "damped-oscillation"
    }

    fn clp_labels(&self, _dataset: &str) -> Vec<String> {
        self.oscillations
            .iter()
            .flat_map(|o| [format!("{}_cos", o.label), format!("{}_sin", o.label)])
            .collect()
    }

    fn variable_names(&self) -> Vec<String> {
        self.oscillations
            .iter()
            .flat_map(|o| [o.frequency.clone(), o.rate.clone()])
            .collect()
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        variables: &VariableStore,
    ) -> Result<Array2<f64>> {
        let shape = context.irf_shape(variables)?;
        let times = context.model_axis;
        let mut matrix = Array2::zeros((times.len(), 2 * self.oscillations.len()));

        for (i, oscillation) in self.oscillations.iter().enumerate() {
            let frequency = variables.value(&oscillation.frequency)?;
            let rate = variables.value(&oscillation.rate)?;
            for (row, &t) in times.iter().enumerate() {
                let t = match shape {
                    Some(irf) if t < irf.center => continue,
                    Some(irf) => t - irf.center,
                    None => t,
                };
                let envelope = (-rate * t).exp();
                let (sin, cos) = (frequency * t).sin_cos();
                matrix[[row, 2 * i]] = envelope * cos;
                matrix[[row, 2 * i + 1]] = envelope * sin;
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Irf;
    use approx::assert_relative_eq;

    #[test]
    fn test_columns_and_labels() {
        let mut variables = VariableStore::new();
        variables.add_value("osc.w", 2.0).unwrap();
        variables.add_value("osc.r", 0.3).unwrap();
        variables.add_value("irf.center", 1.0).unwrap();
        variables.add_value("irf.width", 0.1).unwrap();
        let oscillation = DampedOscillation::new().with_oscillation("osc1", "osc.w", "osc.r");
        assert_eq!(oscillation.clp_labels("ds"), vec!["osc1_cos", "osc1_sin"]);

        let times = [0.0, 0.5, 1.0, 2.0];
        let mut context = MatrixContext {
            dataset: "ds",
            model_axis: &times,
            global_axis: &[],
            global_index: None,
            irf: None,
        };
        let matrix = oscillation.calculate_matrix(&context, &variables).unwrap();
        assert_relative_eq!(matrix[[1, 0]], (-0.15f64).exp() * 1.0f64.cos());
        assert_relative_eq!(matrix[[1, 1]], (-0.15f64).exp() * 1.0f64.sin());

        let irf = Irf::gaussian("irf.center", "irf.width");
        context.irf = Some(&irf);
        let shifted = oscillation.calculate_matrix(&context, &variables).unwrap();
        assert_eq!(shifted[[1, 0]], 0.0);
        assert_relative_eq!(shifted[[2, 0]], 1.0);
        assert_relative_eq!(shifted[[3, 1]], (-0.3f64).exp() * 2.0f64.sin());
    }
}
