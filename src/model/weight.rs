use serde::{Deserialize, Serialize};

use super::interval::Interval;

/// Multiplies the weight of a region of one or more datasets by `value`.
///
/// Without intervals the whole axis is covered. Model weights are ignored for
/// datasets that bring their own weight array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    pub datasets: Vec<String>,

    #[serde(default)]
    pub global_interval: Option<Interval>,

    #[serde(default)]
    pub model_interval: Option<Interval>,

    pub value: f64,
}

impl ModelWeight {
    pub fn new(datasets: &[&str], value: f64) -> Self {
        Self {
            datasets: datasets.iter().map(|d| d.to_string()).collect(),
            global_interval: None,
            model_interval: None,
            value,
        }
    }

    pub fn with_global_interval(mut self, interval: Interval) -> Self {
        self.global_interval = Some(interval);
        self
    }

    pub fn with_model_interval(mut self, interval: Interval) -> Self {
        self.model_interval = Some(interval);
        self
    }

    pub fn targets(&self, dataset: &str) -> bool {
        self.datasets.iter().any(|d| d == dataset)
    }
}
