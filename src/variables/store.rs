//! Ordered variable collection and its flat-vector view.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::convert::TryFrom;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::expression::{constant, EvaluationContext, Expression};
use super::variable::Variable;
use super::VariableError;
use crate::error::{KinFitError, Result};

/// Variables in declaration order with a name index.
///
/// The free variables, in declaration order, map one to one onto the entries of
/// the optimizer's flat vector. Serialized as a JSON array of variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableStore {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable. Names must be unique.
    pub fn add(&mut self, variable: Variable) -> std::result::Result<(), VariableError> {
        if self.index.contains_key(variable.name()) {
            return Err(VariableError::Duplicate {
                name: variable.name().to_string(),
            });
        }
        self.index
            .insert(variable.name().to_string(), self.variables.len());
        self.variables.push(variable);
        Ok(())
    }

    /// Add a free, unbounded variable.
    pub fn add_value(&mut self, name: &str, value: f64) -> std::result::Result<(), VariableError> {
        self.add(Variable::new(name, value))
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.variables[i]),
            None => None,
        }
    }

    /// Current value of a variable.
    pub fn value(&self, name: &str) -> std::result::Result<f64, VariableError> {
        self.get(name)
            .map(Variable::value)
            .ok_or_else(|| VariableError::NotFound {
                name: name.to_string(),
            })
    }

    /// Set the value of a variable, enforcing its bounds.
    pub fn set_value(&mut self, name: &str, value: f64) -> std::result::Result<(), VariableError> {
        self.get_mut(name)
            .ok_or_else(|| VariableError::NotFound {
                name: name.to_string(),
            })?
            .set_value(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name().to_string()).collect()
    }

    fn free(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_free())
    }

    /// Names of the free variables, in flat-vector order.
    pub fn free_names(&self) -> Vec<String> {
        self.free().map(|v| v.name().to_string()).collect()
    }

    pub fn free_count(&self) -> usize {
        self.free().count()
    }

    /// Values of the free variables in declaration order.
    pub fn to_vector(&self) -> Array1<f64> {
        self.free().map(Variable::value).collect()
    }

    /// Lower and upper bounds of the free variables, in flat-vector order.
    pub fn bounds(&self) -> (Array1<f64>, Array1<f64>) {
        (
            self.free().map(Variable::minimum).collect(),
            self.free().map(Variable::maximum).collect(),
        )
    }

    /// Write optimizer values back onto the free variables.
    ///
    /// The vector is checked completely before anything is written, so a rejected
    /// vector leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// * `KinFitError::Dimension` if the length differs from the free count
    /// * `KinFitError::Bounds` if a value is outside its variable's bounds or not finite
    pub fn from_vector(&mut self, values: &Array1<f64>) -> Result<()> {
        let free_count = self.free_count();
        if values.len() != free_count {
            return Err(KinFitError::Dimension(format!(
                "Expected {} free variable values, got {}",
                free_count,
                values.len()
            )));
        }

        for (variable, &value) in self.free().zip(values.iter()) {
            if !value.is_finite() || !variable.bounds().contains(value) {
                return Err(KinFitError::Bounds(format!(
                    "value {} for '{}' is outside [{}, {}]",
                    value,
                    variable.name(),
                    variable.minimum(),
                    variable.maximum()
                )));
            }
        }

        for (variable, &value) in self
            .variables
            .iter_mut()
            .filter(|v| v.is_free())
            .zip(values.iter())
        {
            variable.set_derived_value(value);
        }

        Ok(())
    }

    /// Recompute every derived variable in dependency order.
    ///
    /// # Errors
    ///
    /// * `KinFitError::ExpressionCycle` if derived variables depend on each other in a loop
    /// * `KinFitError::ExpressionEval` if an expression references an unknown name
    ///   or cannot be evaluated
    pub fn update_derived(&mut self) -> Result<()> {
        for (index, expression) in self.derived_order()? {
            let value = expression
                .evaluate(self)
                .map_err(|e| KinFitError::ExpressionEval {
                    name: self.variables[index].name().to_string(),
                    message: e.to_string(),
                })?;
            self.variables[index].set_derived_value(value);
        }
        Ok(())
    }

    /// Derived variables with their parsed expressions, sorted so that every
    /// variable comes after the derived variables it references.
    fn derived_order(&self) -> Result<Vec<(usize, Expression)>> {
        let mut nodes = Vec::new();
        let mut position = HashMap::new();

        for (index, variable) in self.variables.iter().enumerate() {
            if let Some(text) = variable.expression() {
                let expression =
                    Expression::parse(text).map_err(|e| KinFitError::ExpressionEval {
                        name: variable.name().to_string(),
                        message: e.to_string(),
                    })?;
                position.insert(index, nodes.len());
                nodes.push((index, expression));
            }
        }

        let mut in_degree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for (node, (index, expression)) in nodes.iter().enumerate() {
            for name in expression.variables() {
                match self.index.get(&name) {
                    Some(referenced) => {
                        if let Some(&source) = position.get(referenced) {
                            in_degree[node] += 1;
                            dependents[source].push(node);
                        }
                    }
                    None if constant(&name).is_some() => {}
                    None => {
                        return Err(KinFitError::ExpressionEval {
                            name: self.variables[*index].name().to_string(),
                            message: format!("unknown variable '{}'", name),
                        })
                    }
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&n| in_degree[n] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());

        while let Some(node) = ready.pop_front() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < nodes.len() {
            let names = (0..nodes.len())
                .filter(|&n| in_degree[n] > 0)
                .map(|n| self.variables[nodes[n].0].name().to_string())
                .collect();
            return Err(KinFitError::ExpressionCycle { names });
        }

        let mut slots: Vec<Option<(usize, Expression)>> = nodes.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|node| slots[node].take())
            .collect())
    }

    /// Store standard errors of the free variables, in flat-vector order.
    pub fn set_standard_errors(&mut self, errors: &Array1<f64>) -> Result<()> {
        let free_count = self.free_count();
        if errors.len() != free_count {
            return Err(KinFitError::Dimension(format!(
                "Expected {} standard errors, got {}",
                free_count,
                errors.len()
            )));
        }
        for (variable, &error) in self
            .variables
            .iter_mut()
            .filter(|v| v.is_free())
            .zip(errors.iter())
        {
            variable.standard_error = Some(error);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }
}

impl EvaluationContext for VariableStore {
    fn value_of(&self, name: &str) -> Option<f64> {
        self.get(name).map(Variable::value)
    }
}

impl TryFrom<Vec<Variable>> for VariableStore {
    type Error = VariableError;

    fn try_from(variables: Vec<Variable>) -> std::result::Result<Self, Self::Error> {
        let mut store = VariableStore::new();
        for variable in variables {
            store.add(variable)?;
        }
        Ok(store)
    }
}

impl From<VariableStore> for Vec<Variable> {
    fn from(store: VariableStore) -> Self {
        store.variables
    }
}
