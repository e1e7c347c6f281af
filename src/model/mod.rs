//! Model description: megacomplexes, dataset models, CLP constraints and
//! relations, and model weights.
//!
//! A [`Model`] only holds names of variables. Values are looked up in a
//! [`VariableStore`] whenever matrices are built, so the same model can be
//! evaluated for any number of variable vectors.

pub mod clp;
pub mod dataset;
pub mod interval;
pub mod irf;
pub mod megacomplex;
pub mod weight;

pub use clp::{ClpConstraint, ClpRelation};
pub use dataset::{DatasetModel, MegacomplexRef};
pub use interval::Interval;
pub use irf::{Irf, IrfShape};
pub use megacomplex::{MatrixContext, Megacomplex};
pub use weight::ModelWeight;

use log::debug;
use std::collections::HashSet;

use crate::error::{KinFitError, Result};
use crate::variables::VariableStore;

/// A complete global-analysis model.
#[derive(Debug, Default)]
pub struct Model {
    megacomplexes: Vec<(String, Box<dyn Megacomplex>)>,
    datasets: Vec<DatasetModel>,
    clp_constraints: Vec<ClpConstraint>,
    clp_relations: Vec<ClpRelation>,
    weights: Vec<ModelWeight>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a megacomplex under a label.
    ///
    /// # Errors
    ///
    /// * `KinFitError::Configuration` if the label is already taken
    pub fn add_megacomplex<M: Megacomplex + 'static>(
        &mut self,
        label: &str,
        megacomplex: M,
    ) -> Result<()> {
        if self.megacomplex(label).is_some() {
            return Err(KinFitError::Configuration(format!(
                "megacomplex '{label}' defined twice"
            )));
        }
        self.megacomplexes
            .push((label.to_string(), Box::new(megacomplex)));
        Ok(())
    }

    /// Add a dataset model. Datasets keep the order they were added in; this
    /// order defines the layout of the residual vector.
    pub fn add_dataset(&mut self, dataset: DatasetModel) -> Result<()> {
        if self.dataset(&dataset.label).is_some() {
            return Err(KinFitError::Configuration(format!(
                "dataset '{}' defined twice",
                dataset.label
            )));
        }
        self.datasets.push(dataset);
        Ok(())
    }

    pub fn add_clp_constraint(&mut self, constraint: ClpConstraint) {
        self.clp_constraints.push(constraint);
    }

    pub fn add_clp_relation(&mut self, relation: ClpRelation) {
        self.clp_relations.push(relation);
    }

    pub fn add_weight(&mut self, weight: ModelWeight) {
        self.weights.push(weight);
    }

    pub fn megacomplex(&self, label: &str) -> Option<&dyn Megacomplex> {
        self.megacomplexes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| m.as_ref())
    }

    pub fn dataset(&self, label: &str) -> Option<&DatasetModel> {
        self.datasets.iter().find(|d| d.label == label)
    }

    pub fn datasets(&self) -> &[DatasetModel] {
        &self.datasets
    }

    pub fn clp_constraints(&self) -> &[ClpConstraint] {
        &self.clp_constraints
    }

    pub fn clp_relations(&self) -> &[ClpRelation] {
        &self.clp_relations
    }

    pub fn weights(&self) -> &[ModelWeight] {
        &self.weights
    }

    /// CLP labels of a dataset in first-seen order, aliases merged.
    pub fn dataset_clp_labels(&self, dataset: &DatasetModel) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for reference in &dataset.megacomplexes {
            if let Some(megacomplex) = self.megacomplex(&reference.label) {
                for label in megacomplex.clp_labels(&dataset.label) {
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
            }
        }
        labels
    }

    /// Check that every reference in the model resolves.
    ///
    /// # Errors
    ///
    /// * `KinFitError::Configuration` naming the first unresolved megacomplex,
    ///   variable, dataset or CLP label
    pub fn validate(&self, variables: &VariableStore) -> Result<()> {
        let require = |name: &str, owner: &str| {
            if variables.contains(name) {
                Ok(())
            } else {
                Err(KinFitError::Configuration(format!(
                    "{owner} refers to unknown variable '{name}'"
                )))
            }
        };

        if self.datasets.is_empty() {
            return Err(KinFitError::Configuration("model has no datasets".into()));
        }

        let mut known_clps = HashSet::new();
        for dataset in &self.datasets {
            let owner = format!("dataset '{}'", dataset.label);
            if dataset.megacomplexes.is_empty() {
                return Err(KinFitError::Configuration(format!(
                    "{owner} has no megacomplexes"
                )));
            }
            for reference in &dataset.megacomplexes {
                let megacomplex = self.megacomplex(&reference.label).ok_or_else(|| {
                    KinFitError::Configuration(format!(
                        "{owner} refers to unknown megacomplex '{}'",
                        reference.label
                    ))
                })?;
                megacomplex.check_dataset(&dataset.label, dataset.irf.as_ref())?;
                let mc_owner = format!("megacomplex '{}'", reference.label);
                for name in megacomplex.variable_names() {
                    require(&name, &mc_owner)?;
                }
                known_clps.extend(megacomplex.clp_labels(&dataset.label));
            }
            for name in dataset.variable_names() {
                require(&name, &owner)?;
            }
        }

        for constraint in &self.clp_constraints {
            if !known_clps.contains(&constraint.target) {
                return Err(KinFitError::Configuration(format!(
                    "CLP constraint targets unknown CLP '{}'",
                    constraint.target
                )));
            }
        }
        for relation in &self.clp_relations {
            for label in [&relation.source, &relation.target] {
                if !known_clps.contains(label) {
                    return Err(KinFitError::Configuration(format!(
                        "CLP relation refers to unknown CLP '{label}'"
                    )));
                }
            }
            if let Some(parameter) = &relation.parameter {
                require(parameter, "CLP relation")?;
            }
        }
        for weight in &self.weights {
            for label in &weight.datasets {
                if self.dataset(label).is_none() {
                    return Err(KinFitError::Configuration(format!(
                        "model weight refers to unknown dataset '{label}'"
                    )));
                }
            }
        }

        debug!(
            "Model valid: {} datasets, {} megacomplexes, {} CLP constraints, {} CLP relations",
            self.datasets.len(),
            self.megacomplexes.len(),
            self.clp_constraints.len(),
            self.clp_relations.len()
        );
        Ok(())
    }
}
