//! Measured datasets and their weights.

use log::warn;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{KinFitError, Result};
use crate::model::ModelWeight;

/// A measured 2-D dataset. Rows follow the model axis (e.g. time), columns
/// the global axis (e.g. wavelength).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    model_axis: Array1<f64>,
    global_axis: Array1<f64>,
    data: Array2<f64>,
    weight: Option<Array2<f64>>,
}

impl Dataset {
    /// # Errors
    ///
    /// * `KinFitError::Dimension` if `data` is not `model_axis.len() x global_axis.len()`
    pub fn new(
        model_axis: Array1<f64>,
        global_axis: Array1<f64>,
        data: Array2<f64>,
    ) -> Result<Self> {
        let expected = (model_axis.len(), global_axis.len());
        if data.dim() != expected {
            return Err(KinFitError::Dimension(format!(
                "data has shape {:?}, axes imply {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self {
            model_axis,
            global_axis,
            data,
            weight: None,
        })
    }

    /// Attach a per-point weight array of the same shape as the data.
    pub fn with_weight(mut self, weight: Array2<f64>) -> Result<Self> {
        if weight.dim() != self.data.dim() {
            return Err(KinFitError::Dimension(format!(
                "weight has shape {:?}, data has {:?}",
                weight.dim(),
                self.data.dim()
            )));
        }
        self.weight = Some(weight);
        Ok(self)
    }

    pub fn model_axis(&self) -> &Array1<f64> {
        &self.model_axis
    }

    pub fn global_axis(&self) -> &Array1<f64> {
        &self.global_axis
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn weight(&self) -> Option<&Array2<f64>> {
        self.weight.as_ref()
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Weight in effect for the dataset `label`: its own weight, or the
    /// product of all model weights targeting it, or `None` when unweighted.
    ///
    /// Model weights are ignored, with a warning, if the dataset carries its
    /// own weight.
    pub fn effective_weight(&self, label: &str, weights: &[ModelWeight]) -> Option<Array2<f64>> {
        let targeting: Vec<&ModelWeight> = weights.iter().filter(|w| w.targets(label)).collect();
        if let Some(weight) = &self.weight {
            if !targeting.is_empty() {
                warn!(
                    "Dataset '{label}' has its own weight; ignoring {} model weights",
                    targeting.len()
                );
            }
            return Some(weight.clone());
        }
        if targeting.is_empty() {
            return None;
        }

        let model_axis = self.model_axis.to_vec();
        let global_axis = self.global_axis.to_vec();
        let mut grid = Array2::ones(self.data.dim());
        for weight in targeting {
            let rows = weight
                .model_interval
                .map_or(0..model_axis.len(), |i| i.index_range(&model_axis));
            let cols = weight
                .global_interval
                .map_or(0..global_axis.len(), |i| i.index_range(&global_axis));
            grid.slice_mut(s![rows, cols])
                .mapv_inplace(|v: f64| v * weight.value);
        }
        Some(grid)
    }
}
