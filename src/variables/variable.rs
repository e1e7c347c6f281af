//! A single named model variable.

use serde::{Deserialize, Serialize};

use super::bounds::Bounds;
use super::expression::Expression;
use super::VariableError;

/// A named scalar the model reads during evaluation.
///
/// A variable is either *free* (varied by the optimizer), *fixed* (kept at its
/// value) or *derived* (recomputed from an expression over other variables).
///
/// # Examples
///
/// ```
/// use kinfit_rs::variables::Variable;
///
/// let k1 = Variable::new("rates.k1", 0.5).with_bounds(0.0, 10.0).unwrap();
/// assert!(k1.is_free());
///
/// let k2 = Variable::new("rates.k2", 0.0).with_expression("rates.k1 / 2").unwrap();
/// assert!(k2.is_derived());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,

    value: f64,

    #[serde(default)]
    bounds: Bounds,

    #[serde(default)]
    fixed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<String>,

    /// Standard error, set after a fit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_error: Option<f64>,
}

impl Variable {
    /// Create a free, unbounded variable.
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            bounds: Bounds::default(),
            fixed: false,
            expression: None,
            standard_error: None,
        }
    }

    /// Set bounds. The current value must already lie inside them.
    pub fn with_bounds(mut self, min: f64, max: f64) -> Result<Self, VariableError> {
        let bounds = Bounds::new(min, max)?;
        if !bounds.contains(self.value) {
            return Err(VariableError::OutOfBounds {
                name: self.name,
                value: self.value,
                min,
                max,
            });
        }
        self.bounds = bounds;
        Ok(self)
    }

    /// Keep the variable at its value during optimization.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Derive the value from an expression over other variables.
    pub fn with_expression(mut self, expression: &str) -> Result<Self, VariableError> {
        if self.fixed {
            return Err(VariableError::FixedWithExpression { name: self.name });
        }
        Expression::parse(expression).map_err(|source| VariableError::Expression {
            name: self.name.clone(),
            source,
        })?;
        self.expression = Some(expression.to_string());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value, rejecting values outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), VariableError> {
        if !self.bounds.contains(value) {
            return Err(VariableError::OutOfBounds {
                name: self.name.clone(),
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        self.value = value;
        Ok(())
    }

    // Derived values are not checked against the bounds.
    pub(crate) fn set_derived_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn minimum(&self) -> f64 {
        self.bounds.min
    }

    pub fn maximum(&self) -> f64 {
        self.bounds.max
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn is_derived(&self) -> bool {
        self.expression.is_some()
    }

    /// `true` if the optimizer varies this variable.
    pub fn is_free(&self) -> bool {
        !self.fixed && self.expression.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_outside_bounds_is_rejected() {
        let err = Variable::new("k", 5.0).with_bounds(0.0, 1.0).unwrap_err();
        assert!(matches!(err, VariableError::OutOfBounds { .. }));

        let mut k = Variable::new("k", 0.5).with_bounds(0.0, 1.0).unwrap();
        assert!(k.set_value(2.0).is_err());
        assert_eq!(k.value(), 0.5);
        k.set_value(1.0).unwrap();
        assert_eq!(k.value(), 1.0);
    }

    #[test]
    fn test_variable_kinds() {
        assert!(Variable::new("a", 1.0).is_free());
        assert!(!Variable::new("a", 1.0).fixed().is_free());

        let derived = Variable::new("b", 0.0).with_expression("a * 2").unwrap();
        assert!(derived.is_derived());
        assert!(!derived.is_free());

        assert!(Variable::new("c", 0.0)
            .fixed()
            .with_expression("a")
            .is_err());
        assert!(Variable::new("d", 0.0).with_expression("a +").is_err());
    }

    #[test]
    fn test_serde_skips_empty_fields() {
        let json = serde_json::to_string(&Variable::new("a", 1.5)).unwrap();
        assert!(!json.contains("expression"));
        assert!(!json.contains("standard_error"));

        let parsed: Variable = serde_json::from_str(r#"{"name":"a","value":1.5}"#).unwrap();
        assert_eq!(parsed, Variable::new("a", 1.5));
    }
}
