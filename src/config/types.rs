//! Configuration types for the shortage engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files. Every recognised option
//! is a named field; unknown keys are rejected at parse time.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Number of minutes in one calendar day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Default slot granularity in minutes.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Default multiplier applied to the interquartile range when trimming outliers.
pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 1.5;

/// Default maximum number of date columns the shortage calculator accepts.
pub const DEFAULT_MAX_SPAN_DAYS: usize = 90;

/// The central statistic used to turn a row of historical actuals into a baseline.
///
/// Parses from `median`, `mean`, `pNN` or `percentile:NN` where `NN` is in `0..=100`.
///
/// # Example
///
/// ```
/// use shortage_engine::config::Statistic;
///
/// assert_eq!("median".parse::<Statistic>().unwrap(), Statistic::Median);
/// assert_eq!("p75".parse::<Statistic>().unwrap(), Statistic::Percentile(75.0));
/// assert!("mode".parse::<Statistic>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Statistic {
    /// The 50th percentile.
    Median,
    /// The arithmetic mean.
    Mean,
    /// An arbitrary percentile in `0..=100`, linearly interpolated.
    Percentile(f64),
}

impl FromStr for Statistic {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let percentile = name
            .strip_prefix("percentile:")
            .or_else(|| name.strip_prefix('p'));

        match (name.as_str(), percentile) {
            ("median", _) => Ok(Statistic::Median),
            ("mean", _) => Ok(Statistic::Mean),
            (_, Some(raw)) => {
                let p: f64 = raw.trim().parse().map_err(|_| {
                    EngineError::invalid_config("statistic", format!("unknown statistic '{}'", s))
                })?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(EngineError::invalid_config(
                        "statistic",
                        format!("percentile {} is outside 0..=100", p),
                    ));
                }
                Ok(Statistic::Percentile(p))
            }
            _ => Err(EngineError::invalid_config(
                "statistic",
                format!("unknown statistic '{}'", s),
            )),
        }
    }
}

impl TryFrom<String> for Statistic {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Statistic> for String {
    fn from(value: Statistic) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Median => write!(f, "median"),
            Statistic::Mean => write!(f, "mean"),
            Statistic::Percentile(p) => write!(f, "p{}", p),
        }
    }
}

/// How the need baseline partitions the analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedMode {
    /// One statistic per row over the whole window.
    #[default]
    SinglePeriod,
    /// One statistic per row per calendar month, concatenated chronologically.
    MonthlyPattern,
}

impl fmt::Display for NeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedMode::SinglePeriod => write!(f, "single_period"),
            NeedMode::MonthlyPattern => write!(f, "monthly_pattern"),
        }
    }
}

/// Slot grid settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotConfig {
    /// Width of one slot in minutes. Must divide 1440.
    pub slot_minutes: u32,
    /// Whether the grid extends past midnight for overnight shifts.
    pub extended: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            extended: false,
        }
    }
}

/// Settings for the need baseline calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeedConfig {
    /// Central statistic applied to each row.
    pub statistic: Statistic,
    /// Whether values beyond the IQR fences are discarded first.
    pub outlier_removal: bool,
    /// Fence distance from the nearest quartile, in IQRs.
    pub outlier_multiplier: f64,
    /// Multiplier applied to the statistic before clipping at zero.
    pub adjustment_factor: f64,
    /// Dates on which no staffing is expected.
    pub holidays: BTreeSet<NaiveDate>,
    /// Window partitioning mode.
    pub mode: NeedMode,
    /// Compute a separate statistic for each weekday.
    pub weekday_pattern: bool,
}

impl Default for NeedConfig {
    fn default() -> Self {
        Self {
            statistic: Statistic::Median,
            outlier_removal: true,
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
            adjustment_factor: 1.0,
            holidays: BTreeSet::new(),
            mode: NeedMode::SinglePeriod,
            weekday_pattern: false,
        }
    }
}

/// Settings for the upper staffing ceiling used by the excess calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpperConfig {
    /// Statistic for the ceiling.
    pub statistic: Statistic,
    /// Multiplier applied to the ceiling statistic.
    pub adjustment_factor: f64,
}

impl Default for UpperConfig {
    fn default() -> Self {
        Self {
            statistic: Statistic::Percentile(90.0),
            adjustment_factor: 1.0,
        }
    }
}

/// Guards applied by the shortage/excess calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShortageConfig {
    /// Maximum number of aligned date columns kept.
    pub max_span_days: usize,
    /// Per-day cap on shortage, in hour-equivalents. `None` disables the cap.
    pub daily_cap_hours: Option<f64>,
}

impl Default for ShortageConfig {
    fn default() -> Self {
        Self {
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
            daily_cap_hours: None,
        }
    }
}

/// Settings for the proportional consistency enforcer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsistencyConfig {
    /// Largest acceptable difference between allocated and overall totals.
    pub tolerance: Decimal,
    /// Promote a failed check to a hard error.
    pub strict: bool,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
            strict: false,
        }
    }
}

/// The complete engine configuration for one scenario.
///
/// # Example
///
/// ```
/// use shortage_engine::config::{EngineConfig, NeedMode};
///
/// let config: EngineConfig = serde_yaml::from_str("need:\n  mode: monthly_pattern\n").unwrap();
/// assert_eq!(config.need.mode, NeedMode::MonthlyPattern);
/// assert_eq!(config.slots.slot_minutes, 30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Slot grid settings.
    pub slots: SlotConfig,
    /// Need baseline settings.
    pub need: NeedConfig,
    /// Upper ceiling settings.
    pub upper: UpperConfig,
    /// Shortage guard settings.
    pub shortage: ShortageConfig,
    /// Reconciliation settings.
    pub consistency: ConsistencyConfig,
}

impl EngineConfig {
    /// Checks every option for semantic validity.
    ///
    /// Returns the first [`EngineError::InvalidConfig`] found.
    pub fn validate(&self) -> EngineResult<()> {
        let slot = self.slots.slot_minutes;
        if slot == 0 || MINUTES_PER_DAY % slot != 0 {
            return Err(EngineError::invalid_config(
                "slots.slot_minutes",
                format!("{} does not evenly divide {}", slot, MINUTES_PER_DAY),
            ));
        }

        validate_statistic("need.statistic", self.need.statistic)?;
        validate_statistic("upper.statistic", self.upper.statistic)?;
        validate_factor("need.adjustment_factor", self.need.adjustment_factor)?;
        validate_factor("upper.adjustment_factor", self.upper.adjustment_factor)?;

        if !self.need.outlier_multiplier.is_finite() || self.need.outlier_multiplier <= 0.0 {
            return Err(EngineError::invalid_config(
                "need.outlier_multiplier",
                format!("must be positive, got {}", self.need.outlier_multiplier),
            ));
        }

        if self.shortage.max_span_days == 0 {
            return Err(EngineError::invalid_config(
                "shortage.max_span_days",
                "must be at least 1",
            ));
        }

        if let Some(cap) = self.shortage.daily_cap_hours {
            if !cap.is_finite() || cap < 0.0 {
                return Err(EngineError::invalid_config(
                    "shortage.daily_cap_hours",
                    format!("must be a non-negative number, got {}", cap),
                ));
            }
        }

        if self.consistency.tolerance < Decimal::ZERO {
            return Err(EngineError::invalid_config(
                "consistency.tolerance",
                format!("must not be negative, got {}", self.consistency.tolerance),
            ));
        }

        Ok(())
    }

    /// Returns the baseline settings used to derive the upper ceiling.
    ///
    /// Outlier handling, holidays and mode are shared with the need baseline;
    /// only the statistic and factor differ.
    pub fn upper_baseline(&self) -> NeedConfig {
        NeedConfig {
            statistic: self.upper.statistic,
            adjustment_factor: self.upper.adjustment_factor,
            ..self.need.clone()
        }
    }
}

fn validate_statistic(field: &str, statistic: Statistic) -> EngineResult<()> {
    match statistic {
        Statistic::Percentile(p) if !(0.0..=100.0).contains(&p) => Err(
            EngineError::invalid_config(field, format!("percentile {} is outside 0..=100", p)),
        ),
        _ => Ok(()),
    }
}

fn validate_factor(field: &str, factor: f64) -> EngineResult<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(EngineError::invalid_config(
            field,
            format!("must be a non-negative number, got {}", factor),
        ));
    }
    Ok(())
}
