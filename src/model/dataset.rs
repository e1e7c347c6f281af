use serde::{Deserialize, Serialize};

use super::irf::Irf;

/// Reference from a dataset model to a megacomplex, with an optional scale
/// variable applied to the megacomplex's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MegacomplexRef {
    pub label: String,

    #[serde(default)]
    pub scale: Option<String>,
}

/// How one dataset is modelled: which megacomplexes contribute columns, an
/// optional overall scale and an optional IRF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetModel {
    pub label: String,

    pub megacomplexes: Vec<MegacomplexRef>,

    #[serde(default)]
    pub scale: Option<String>,

    #[serde(default)]
    pub irf: Option<Irf>,
}

impl DatasetModel {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            megacomplexes: Vec::new(),
            scale: None,
            irf: None,
        }
    }

    pub fn with_megacomplex(mut self, label: &str) -> Self {
        self.megacomplexes.push(MegacomplexRef {
            label: label.to_string(),
            scale: None,
        });
        self
    }

    pub fn with_scaled_megacomplex(mut self, label: &str, scale: &str) -> Self {
        self.megacomplexes.push(MegacomplexRef {
            label: label.to_string(),
            scale: Some(scale.to_string()),
        });
        self
    }

    pub fn with_scale(mut self, scale: &str) -> Self {
        self.scale = Some(scale.to_string());
        self
    }

    pub fn with_irf(mut self, irf: Irf) -> Self {
        self.irf = Some(irf);
        self
    }

    /// Every variable name the dataset model itself refers to.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .megacomplexes
            .iter()
            .filter_map(|m| m.scale.clone())
            .collect();
        names.extend(self.scale.iter().cloned());
        if let Some(irf) = &self.irf {
            names.extend(irf.variable_names());
        }
        names
    }
}
