//! Engine configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::NearestOptions;

use super::errors::{EngineError, EngineResult};

/// Tunables for one [`QueryEngine`](super::QueryEngine).
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reads overlay the uncommitted buffer while a transaction is active.
    pub live_transaction: bool,
    /// Cache by-id fetches outside live transactions.
    pub read_cache_enabled: bool,
    /// Cache capacity; inserts are skipped once full.
    pub read_cache_max_entries: usize,
    /// Nearest search box growth per iteration.
    pub nearest_growth_factor: f64,
    /// Nearest search iteration bound.
    pub nearest_max_iterations: u32,
    /// Padding for degenerate nearest search boxes.
    pub nearest_epsilon: f64,
    /// Items between progress callbacks on long scans.
    pub progress_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let nearest = NearestOptions::default();
        Self {
            live_transaction: false,
            read_cache_enabled: false,
            read_cache_max_entries: 1000,
            nearest_growth_factor: nearest.growth_factor,
            nearest_max_iterations: nearest.max_iterations,
            nearest_epsilon: nearest.epsilon,
            progress_interval: 200,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::validation(format!("Failed to read config: {}", e)))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::validation(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.nearest_growth_factor > 1.0) || !self.nearest_growth_factor.is_finite() {
            return Err(EngineError::validation(format!(
                "nearest_growth_factor must be a finite value > 1, got {}",
                self.nearest_growth_factor
            )));
        }
        if self.nearest_max_iterations == 0 {
            return Err(EngineError::validation("nearest_max_iterations must be > 0"));
        }
        if !(self.nearest_epsilon > 0.0) || !self.nearest_epsilon.is_finite() {
            return Err(EngineError::validation(format!(
                "nearest_epsilon must be a finite value > 0, got {}",
                self.nearest_epsilon
            )));
        }
        if self.progress_interval == 0 {
            return Err(EngineError::validation("progress_interval must be > 0"));
        }
        Ok(())
    }

    pub fn nearest_options(&self) -> NearestOptions {
        NearestOptions {
            growth_factor: self.nearest_growth_factor,
            max_iterations: self.nearest_max_iterations,
            epsilon: self.nearest_epsilon,
        }
    }

    /// Default config with live transactions on.
    pub fn live() -> Self {
        Self {
            live_transaction: true,
            ..Self::default()
        }
    }
}
