//! Variable bounds.
//!
//! Bounds are handed to the optimizer, which keeps its trial points inside the
//! box. Nothing in the crate clamps a value silently: a value outside its bounds
//! is reported as an error.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};

use super::VariableError;

/// Closed interval `[min, max]` a variable value must stay in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value (may be `-inf`)
    pub min: f64,

    /// Maximum allowed value (may be `+inf`)
    pub max: f64,
}

// JSON has no infinity, so open ends are written as null.
impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;
        let min = if self.min == NEG_INFINITY { None } else { Some(self.min) };
        let max = if self.max == INFINITY { None } else { Some(self.max) };
        state.serialize_field("min", &min)?;
        state.serialize_field("max", &max)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;

        Ok(Bounds {
            min: helper.min.unwrap_or(NEG_INFINITY),
            max: helper.max.unwrap_or(INFINITY),
        })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create bounds, rejecting `min > max` and NaN limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use kinfit_rs::variables::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert!(bounds.contains(5.0));
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, VariableError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(VariableError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Bounds from -inf to +inf.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Check if a value lies within the bounds (inclusive).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `true` if at least one end is finite.
    pub fn is_bounded(&self) -> bool {
        self.min.is_finite() || self.max.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::new(-1.0, 2.0).unwrap();
        assert!(bounds.contains(-1.0));
        assert!(bounds.contains(2.0));
        assert!(!bounds.contains(2.0 + 1e-12));
        assert!(Bounds::unbounded().contains(1e300));
        assert!(!Bounds::unbounded().is_bounded());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(Bounds::new(3.0, 1.0).is_err());
        assert!(Bounds::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_serialization_of_infinite_bounds() {
        let json = serde_json::to_string(&Bounds::new(0.0, INFINITY).unwrap()).unwrap();
        assert_eq!(json, r#"{"min":0.0,"max":null}"#);

        let bounds: Bounds = serde_json::from_str(r#"{"max":5.0}"#).unwrap();
        assert_eq!(bounds.min, NEG_INFINITY);
        assert_eq!(bounds.max, 5.0);
    }
}
