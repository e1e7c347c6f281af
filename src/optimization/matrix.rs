//! Dataset matrices: combining megacomplex columns and caching the parts
//! that do not depend on the global index.

use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{KinFitError, Result};
use crate::model::{DatasetModel, MatrixContext, Megacomplex, Model};
use crate::variables::VariableStore;

/// A matrix together with the CLP label of each column.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixContainer {
    pub clp_labels: Vec<String>,
    pub matrix: Array2<f64>,
}

impl MatrixContainer {
    /// # Errors
    ///
    /// * `KinFitError::Dimension` if the column count does not match the labels
    pub fn new(clp_labels: Vec<String>, matrix: Array2<f64>) -> Result<Self> {
        if matrix.ncols() != clp_labels.len() {
            return Err(KinFitError::Dimension(format!(
                "matrix has {} columns for {} CLP labels",
                matrix.ncols(),
                clp_labels.len()
            )));
        }
        Ok(Self { clp_labels, matrix })
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Sum scaled containers with equal row counts into one. Labels keep
    /// their first-seen order; columns sharing a label are added.
    pub fn combine<'a, I>(parts: I, nrows: usize) -> Self
    where
        I: IntoIterator<Item = (&'a MatrixContainer, f64)>,
    {
        let parts: Vec<(&MatrixContainer, f64)> = parts.into_iter().collect();
        let mut labels: Vec<String> = Vec::new();
        for (part, _) in &parts {
            for label in &part.clp_labels {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        let positions: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut matrix = Array2::zeros((nrows, labels.len()));
        for (part, scale) in parts {
            for (column, label) in part.matrix.columns().into_iter().zip(&part.clp_labels) {
                let mut target = matrix.column_mut(positions[label.as_str()]);
                target.scaled_add(scale, &column);
            }
        }
        Self {
            clp_labels: labels,
            matrix,
        }
    }

    /// Stack containers vertically. Each block keeps its own rows; columns
    /// are aligned by label and missing columns are zero.
    pub fn stack(blocks: &[&MatrixContainer]) -> Self {
        let mut labels: Vec<String> = Vec::new();
        for block in blocks {
            for label in &block.clp_labels {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        let positions: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let nrows = blocks.iter().map(|b| b.nrows()).sum();
        let mut matrix = Array2::zeros((nrows, labels.len()));
        let mut offset = 0;
        for block in blocks {
            for (column, label) in block.matrix.columns().into_iter().zip(&block.clp_labels) {
                matrix
                    .column_mut(positions[label.as_str()])
                    .slice_mut(ndarray::s![offset..offset + block.nrows()])
                    .assign(&column);
            }
            offset += block.nrows();
        }
        Self {
            clp_labels: labels,
            matrix,
        }
    }

    /// Multiply every row by the matching weight.
    pub fn weighted(&self, weight: &Array1<f64>) -> Self {
        let mut matrix = self.matrix.clone();
        for (mut row, &w) in matrix.axis_iter_mut(Axis(0)).zip(weight) {
            row *= w;
        }
        Self {
            clp_labels: self.clp_labels.clone(),
            matrix,
        }
    }
}

/// Matrices of one dataset for a single evaluation, one per global index.
/// Index-independent datasets share one matrix across all indices.
#[derive(Debug, Clone)]
pub struct DatasetMatrices {
    matrices: Vec<Arc<MatrixContainer>>,
}

impl DatasetMatrices {
    pub fn at(&self, global_index: usize) -> &MatrixContainer {
        &self.matrices[global_index]
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// `true` if every global index shares the same matrix.
    pub fn is_shared(&self) -> bool {
        self.matrices
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0], &pair[1]))
    }
}

/// Build the matrices of a dataset for every global index.
///
/// Megacomplexes whose matrix does not depend on the global index are
/// calculated once; the others once per index. Megacomplex and dataset
/// scales are applied here.
///
/// # Errors
///
/// * `KinFitError::MatrixShape` if a megacomplex returns the wrong number of rows
/// * `KinFitError::Dimension` if a megacomplex returns the wrong number of columns
/// * Errors from variable lookups
pub fn calculate_dataset_matrices(
    model: &Model,
    dataset: &DatasetModel,
    model_axis: &[f64],
    global_axis: &[f64],
    variables: &VariableStore,
) -> Result<DatasetMatrices> {
    let irf = dataset.irf.as_ref();
    let dataset_scale = match &dataset.scale {
        Some(name) => variables.value(name)?,
        None => 1.0,
    };

    let mut entries = Vec::with_capacity(dataset.megacomplexes.len());
    for reference in &dataset.megacomplexes {
        let megacomplex = model.megacomplex(&reference.label).ok_or_else(|| {
            KinFitError::Configuration(format!(
                "dataset '{}' refers to unknown megacomplex '{}'",
                dataset.label, reference.label
            ))
        })?;
        let scale = match &reference.scale {
            Some(name) => variables.value(name)?,
            None => 1.0,
        } * dataset_scale;
        entries.push((reference.label.as_str(), megacomplex, scale));
    }

    let build = |label: &str,
                 megacomplex: &dyn Megacomplex,
                 global_index: Option<usize>|
     -> Result<MatrixContainer> {
        let context = MatrixContext {
            dataset: &dataset.label,
            model_axis,
            global_axis,
            global_index,
            irf,
        };
        let matrix = megacomplex.calculate_matrix(&context, variables)?;
        if matrix.nrows() != model_axis.len() {
            return Err(KinFitError::MatrixShape {
                dataset: dataset.label.clone(),
                megacomplex: label.to_string(),
                kind: megacomplex.type_name(),
                expected: model_axis.len(),
                actual: matrix.nrows(),
            });
        }
        MatrixContainer::new(megacomplex.clp_labels(&dataset.label), matrix)
    };

    // Index-independent parts, in declaration order; `None` marks a part
    // rebuilt for every index.
    let cached = entries
        .iter()
        .map(|&(label, megacomplex, _)| {
            if megacomplex.index_dependent(irf) {
                Ok(None)
            } else {
                build(label, megacomplex, None).map(Some)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if cached.iter().all(Option::is_some) {
        let shared = Arc::new(MatrixContainer::combine(
            cached
                .iter()
                .zip(&entries)
                .filter_map(|(part, &(_, _, scale))| part.as_ref().map(|m| (m, scale))),
            model_axis.len(),
        ));
        return Ok(DatasetMatrices {
            matrices: vec![shared; global_axis.len()],
        });
    }

    let mut matrices = Vec::with_capacity(global_axis.len());
    for index in 0..global_axis.len() {
        let rebuilt = entries
            .iter()
            .zip(&cached)
            .map(|(&(label, megacomplex, _), part)| match part {
                Some(_) => Ok(None),
                None => build(label, megacomplex, Some(index)).map(Some),
            })
            .collect::<Result<Vec<_>>>()?;
        let parts = cached
            .iter()
            .zip(&rebuilt)
            .zip(&entries)
            .filter_map(|((shared, fresh), &(_, _, scale))| {
                shared.as_ref().or(fresh.as_ref()).map(|m| (m, scale))
            });
        matrices.push(Arc::new(MatrixContainer::combine(parts, model_axis.len())));
    }
    Ok(DatasetMatrices { matrices })
}
