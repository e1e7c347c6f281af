//! Constraints and relations between conditionally linear parameters.

use serde::{Deserialize, Serialize};

use super::interval::{applies, Interval};

/// Fixes a CLP to a constant value (zero unless given otherwise). The CLP is
/// removed from the linear solve and reappears with the fixed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClpConstraint {
    pub target: String,

    #[serde(default)]
    pub value: f64,

    /// Global-axis intervals the constraint is active in; empty means everywhere
    #[serde(default)]
    pub intervals: Vec<Interval>,
}

impl ClpConstraint {
    pub fn zero(target: &str) -> Self {
        Self {
            target: target.to_string(),
            value: 0.0,
            intervals: Vec::new(),
        }
    }

    pub fn fixed(target: &str, value: f64) -> Self {
        Self {
            value,
            ..Self::zero(target)
        }
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.intervals.push(interval);
        self
    }

    pub fn applies(&self, global_value: f64) -> bool {
        applies(&self.intervals, global_value)
    }
}

/// Ties a CLP to another: `target = factor * source`. The factor is read from
/// `parameter` and is 1 without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClpRelation {
    pub source: String,
    pub target: String,

    #[serde(default)]
    pub parameter: Option<String>,

    #[serde(default)]
    pub intervals: Vec<Interval>,
}

impl ClpRelation {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            parameter: None,
            intervals: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: &str) -> Self {
        self.parameter = Some(parameter.to_string());
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.intervals.push(interval);
        self
    }

    pub fn applies(&self, global_value: f64) -> bool {
        applies(&self.intervals, global_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_interval() {
        let constraint = ClpConstraint::zero("s2").with_interval(Interval::new(400.0, 500.0));
        assert!(constraint.applies(450.0));
        assert!(!constraint.applies(550.0));
        assert_eq!(constraint.value, 0.0);
    }

    #[test]
    fn test_relation_deserialize_defaults() {
        let relation: ClpRelation =
            serde_json::from_str(r#"{"source": "s1", "target": "s2"}"#).unwrap();
        assert_eq!(relation, ClpRelation::new("s1", "s2"));
        assert!(relation.applies(-1e12));
    }
}
