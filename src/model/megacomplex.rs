//! The megacomplex trait: a named generator of model-axis basis columns.

use ndarray::Array2;
use std::fmt;

use crate::variables::VariableStore;
use crate::Result;

use super::irf::{Irf, IrfShape};

/// Everything a megacomplex may look at when it builds its matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixContext<'a> {
    /// Label of the dataset the matrix is built for
    pub dataset: &'a str,

    pub model_axis: &'a [f64],

    pub global_axis: &'a [f64],

    /// Global index the matrix is built for. `None` when the matrix does not
    /// depend on the global axis and is shared by all indices.
    pub global_index: Option<usize>,

    pub irf: Option<&'a Irf>,
}

impl<'a> MatrixContext<'a> {
    pub fn global_value(&self) -> Option<f64> {
        self.global_index
            .and_then(|index| self.global_axis.get(index).copied())
    }

    /// IRF shape at this context's global value, if the dataset has an IRF.
    pub fn irf_shape(&self, variables: &VariableStore) -> Result<Option<IrfShape>> {
        self.irf
            .map(|irf| irf.shape(variables, self.global_value(), self.global_axis))
            .transpose()
    }
}

/// A component of a dataset model that produces matrix columns.
///
/// The matrix returned by [`Megacomplex::calculate_matrix`] has one row per
/// model-axis point and one column per label of
/// [`Megacomplex::clp_labels`], in the same order.
pub trait Megacomplex: Send + Sync + fmt::Debug {
    /// Short name of the megacomplex kind, used in messages.
    fn type_name(&self) -> &'static str;

    /// CLP labels of the columns for the given dataset.
    fn clp_labels(&self, dataset: &str) -> Vec<String>;

    /// Names of the variables the matrix is computed from.
    fn variable_names(&self) -> Vec<String>;

    /// `true` if the matrix differs between global indices of a dataset with
    /// the given IRF.
    fn index_dependent(&self, irf: Option<&Irf>) -> bool {
        irf.map_or(false, Irf::is_dispersed)
    }

    /// Check requirements on the dataset, e.g. the presence of an IRF.
    fn check_dataset(&self, _dataset: &str, _irf: Option<&Irf>) -> Result<()> {
        Ok(())
    }

    fn calculate_matrix(
        &self,
        context: &MatrixContext<'_>,
        variables: &VariableStore,
    ) -> Result<Array2<f64>>;
}
