use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::model::{MatrixContext, Megacomplex};
use crate::variables::VariableStore;
use crate::Result;

/// Constant offset. Contributes a single column of ones labelled
/// `<dataset>_baseline`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline;

impl Megacomplex for Baseline {
    fn type_name(&self) -> &'static str {
        "baseline"
    }

    fn clp_labels(&self, dataset: &str) -> Vec<String> {
        vec![format!("{dataset}_baseline")]
    }

    fn variable_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn index_dependent(&self, _irf: Option<&crate::model::Irf>) -> bool {
        false
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        _variables: &VariableStore,
    ) -> Result<Array2<f64>> {
        Ok(Array2::ones((context.model_axis.len(), 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_column() {
        let times = [0.0, 1.0, 2.0, 3.0];
        let context = MatrixContext {
            dataset: "ds1",
            model_axis: &times,
            global_axis: &[],
            global_index: None,
            irf: None,
        };
        let matrix = Baseline
            .calculate_matrix(&context, &VariableStore::new())
            .unwrap();
        assert_eq!(matrix.dim(), (4, 1));
        assert!(matrix.iter().all(|&v| v == 1.0));
        assert_eq!(Baseline.clp_labels("ds1"), vec!["ds1_baseline"]);
    }
}
