//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configurations from YAML files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::types::EngineConfig;

/// Loads and validates an engine configuration file.
///
/// The file is a single YAML document whose sections mirror
/// [`EngineConfig`]. Omitted sections and fields take their defaults:
///
/// ```text
/// slots:
///   slot_minutes: 30
///   extended: false
/// need:
///   statistic: median
///   outlier_removal: true
///   outlier_multiplier: 1.5
///   adjustment_factor: 1.0
///   holidays: [2025-01-01]
///   mode: monthly_pattern
/// upper:
///   statistic: p90
/// shortage:
///   max_span_days: 90
///   daily_cap_hours: 120.0
/// consistency:
///   tolerance: "0.01"
///   strict: false
/// ```
///
/// # Example
///
/// ```no_run
/// use shortage_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default.yaml")?;
/// println!("Slot width: {} minutes", loader.config().slots.slot_minutes);
/// # Ok::<(), shortage_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified YAML file.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - The file is missing (`ConfigNotFound`)
    /// - The file contains invalid YAML or unknown keys (`ConfigParseError`)
    /// - A value is semantically invalid (`InvalidConfig`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let config = Self::load_yaml(path)?;
        config.validate()?;

        debug!(
            path = %path.display(),
            slot_minutes = config.slots.slot_minutes,
            statistic = %config.need.statistic,
            mode = %config.need.mode,
            "Loaded engine configuration"
        );

        Ok(Self { config })
    }

    /// Parses and validates configuration from an in-memory YAML string.
    pub fn from_yaml_str(content: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(content).map_err(|e| EngineError::ConfigParseError {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(Self { config })
    }

    /// Loads and parses a YAML file.
    fn load_yaml(path: &Path) -> EngineResult<EngineConfig> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }
}

impl From<EngineConfig> for ConfigLoader {
    fn from(config: EngineConfig) -> Self {
        Self { config }
    }
}
