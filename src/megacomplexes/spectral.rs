use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::model::{MatrixContext, Megacomplex};
use crate::variables::VariableStore;
use crate::Result;

/// Gaussian band `amplitude * exp(-ln 2 * (2 (x - location) / width)^2)`;
/// `width` is the full width at half maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralShape {
    pub label: String,
    pub amplitude: String,
    pub location: String,
    pub width: String,
}

/// Spectral model: one column per Gaussian shape over the model axis, which
/// here is a spectral axis. Used when the roles of the axes are swapped and
/// the CLPs are concentrations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralMegacomplex {
    pub shapes: Vec<SpectralShape>,
}

impl SpectralMegacomplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, label: &str, amplitude: &str, location: &str, width: &str) -> Self {
        self.shapes.push(SpectralShape {
            label: label.to_string(),
            amplitude: amplitude.to_string(),
            location: location.to_string(),
            width: width.to_string(),
        });
        self
    }
}

impl Megacomplex for SpectralMegacomplex {
    fn type_name(&self) -> &'static str {
        "spectral"
    }

    fn clp_labels(&self, _dataset: &str) -> Vec<String> {
        self.shapes.iter().map(|s| s.label.clone()).collect()
    }

    fn variable_names(&self) -> Vec<String> {
        self.shapes
            .iter()
            .flat_map(|s| [s.amplitude.clone(), s.location.clone(), s.width.clone()])
            .collect()
    }

    fn index_dependent(&self, _irf: Option<&crate::model::Irf>) -> bool {
        false
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        variables: &VariableStore,
    ) -> Result<Array2<f64>> {
        let axis = context.model_axis;
        let mut matrix = Array2::zeros((axis.len(), self.shapes.len()));
        for (col, shape) in self.shapes.iter().enumerate() {
            let amplitude = variables.value(&shape.amplitude)?;
            let location = variables.value(&shape.location)?;
            let width = variables.value(&shape.width)?;
            for (row, &x) in axis.iter().enumerate() {
                let z = 2.0 * (x - location) / width;
                matrix[[row, col]] = amplitude * (-std::f64::consts::LN_2 * z * z).exp();
            }
        }
        Ok(matrix)
    }
}
