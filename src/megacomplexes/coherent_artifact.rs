//! Coherent artifact: the IRF Gaussian and its time derivatives.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{KinFitError, Result};
use crate::model::{Irf, MatrixContext, Megacomplex};
use crate::variables::VariableStore;

/// Columns built from the IRF Gaussian `g(t)` and its first `order - 1` time
/// derivatives, labelled `<dataset>_coherent_artifact_<n>` with `n` from 1.
///
/// Requires a dataset IRF. An optional width variable replaces the IRF width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherentArtifact {
    pub order: usize,

    #[serde(default)]
    pub width: Option<String>,
}

impl CoherentArtifact {
    pub fn new(order: usize) -> Self {
        Self { order, width: None }
    }

    pub fn with_width(mut self, width: &str) -> Self {
        self.width = Some(width.to_string());
        self
    }
}

impl Megacomplex for CoherentArtifact {
    fn type_name(&self) -> &'static str {
        "coherent-artifact"
    }

    fn clp_labels(&self, dataset: &str) -> Vec<String> {
        (1..=self.order)
            .map(|n| format!("{dataset}_coherent_artifact_{n}"))
            .collect()
    }

    fn variable_names(&self) -> Vec<String> {
        self.width.iter().cloned().collect()
    }

    fn check_dataset(&self, dataset: &str, irf: Option<&Irf>) -> Result<()> {
        if !(1..=3).contains(&self.order) {
            return Err(KinFitError::Configuration(format!(
                "{} order must be 1, 2 or 3, got {}",
                self.type_name(),
                self.order
            )));
        }
        if irf.is_none() {
            return Err(KinFitError::Configuration(format!(
                "{} in dataset '{dataset}' requires an IRF",
                self.type_name()
            )));
        }
        Ok(())
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        variables: &VariableStore,
    ) -> Result<Array2<f64>> {
        let shape = context.irf_shape(variables)?.ok_or_else(|| {
            KinFitError::Configuration(format!(
                "coherent artifact in dataset '{}' requires an IRF",
                context.dataset
            ))
        })?;
        let sigma = match &self.width {
            Some(name) => variables.value(name)?,
            None => shape.width,
        };
        let s2 = sigma * sigma;

        let times = context.model_axis;
        let mut matrix = Array2::zeros((times.len(), self.order));
        for (row, &t) in times.iter().enumerate() {
            let d = t - shape.center;
            let g = (-d * d / (2.0 * s2)).exp();
            let derivatives = [
                g,
                -d / s2 * g,
                (d * d / (s2 * s2) - 1.0 / s2) * g,
            ];
            for (col, value) in derivatives.iter().take(self.order).enumerate() {
                matrix[[row, col]] = *value;
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_requires_irf() {
        let artifact = CoherentArtifact::new(2);
        let err = artifact.check_dataset("ds", None).unwrap_err();
        assert!(err.to_string().contains("coherent-artifact in dataset 'ds'"));
        let irf = Irf::gaussian("c", "w");
        assert!(artifact.check_dataset("ds", Some(&irf)).is_ok());
        assert!(CoherentArtifact::new(4).check_dataset("ds", Some(&irf)).is_err());
    }

    #[test]
    fn test_derivative_columns() {
        let mut variables = VariableStore::new();
        variables.add_value("c", 0.0).unwrap();
        variables.add_value("w", 1.0).unwrap();
        let irf = Irf::gaussian("c", "w");
        let times = [-1.0, 0.0, 1.0];
        let context = MatrixContext {
            dataset: "ds",
            model_axis: &times,
            global_axis: &[],
            global_index: None,
            irf: Some(&irf),
        };
        let matrix = CoherentArtifact::new(3)
            .calculate_matrix(&context, &variables)
            .unwrap();
        let g1 = (-0.5f64).exp();
        assert_relative_eq!(matrix[[1, 0]], 1.0);
        assert_relative_eq!(matrix[[1, 1]], 0.0);
        assert_relative_eq!(matrix[[1, 2]], -1.0);
        assert_relative_eq!(matrix[[2, 1]], -g1);
        assert_relative_eq!(matrix[[0, 1]], g1);
        assert_relative_eq!(matrix[[2, 2]], 0.0, epsilon = 1e-15);
    }
}
