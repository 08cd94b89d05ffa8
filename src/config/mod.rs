//! Configuration loading and management for the shortage engine.
//!
//! This module provides the explicit configuration struct enumerating every
//! recognised option, and a loader for YAML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shortage_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default.yaml").unwrap();
//! println!("Need statistic: {}", config.config().need.statistic);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    ConsistencyConfig, DEFAULT_MAX_SPAN_DAYS, DEFAULT_OUTLIER_MULTIPLIER, DEFAULT_SLOT_MINUTES,
    EngineConfig, MINUTES_PER_DAY, NeedConfig, NeedMode, ShortageConfig, SlotConfig, Statistic,
    UpperConfig,
};
