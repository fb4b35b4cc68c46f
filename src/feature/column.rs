//! Column declarations: what a backend natively stores.

use serde::{Deserialize, Serialize};

/// A column a backend declares. Any requested column not declared here is
/// virtual and resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSourceColumn {
    /// Column name, matched exactly (case-sensitive).
    pub name: String,
    /// Declared type as the backend names it (e.g. "string", "double").
    #[serde(default = "default_type_name")]
    pub type_name: String,
    /// Maximum value length, 0 when unbounded.
    #[serde(default)]
    pub max_length: u32,
}

fn default_type_name() -> String {
    "string".to_string()
}

impl FeatureSourceColumn {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, max_length: u32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            max_length,
        }
    }

    /// Unbounded string column.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, default_type_name(), 0)
    }
}
