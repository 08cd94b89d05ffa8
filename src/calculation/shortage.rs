//! Shortage and excess calculation.
//!
//! Runs the guard stages in a fixed order (alignment, period precheck), then
//! the cell arithmetic, then the daily cap:
//!
//! - `shortage = max(need - actual, 0)`
//! - `excess = max(actual - upper, 0)`
//!
//! Excess is measured against the upper ceiling, not against need.

use tracing::info;

use crate::config::ShortageConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{GuardReport, SlotMatrix};

use super::guards::{align_columns, apply_daily_cap, truncate_period};

/// The output of [`compute_shortage`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShortageResult {
    /// Deficit per (slot, date) after all guards.
    pub shortage: SlotMatrix,
    /// Surplus above the upper ceiling per (slot, date).
    pub excess: SlotMatrix,
    /// Need restricted to the output columns.
    pub need: SlotMatrix,
    /// Actual staffing restricted to the output columns.
    pub actual: SlotMatrix,
    /// Upper ceiling restricted to the output columns.
    pub upper: SlotMatrix,
    /// Total shortage in hour-equivalents.
    pub shortage_hours: f64,
    /// Total excess in hour-equivalents.
    pub excess_hours: f64,
    /// Everything the guards dropped, truncated or scaled.
    pub report: GuardReport,
}

/// Computes shortage and excess from need, actual and upper.
///
/// `slot_hours` is the hour-equivalent of one cell and is used for the daily
/// cap and the hour totals.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] for a zero maximum span or a
/// negative cap, and [`EngineError::MatrixShapeMismatch`] if the inputs do
/// not share row labels.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::compute_shortage;
/// use shortage_engine::config::ShortageConfig;
/// use shortage_engine::models::SlotMatrix;
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
/// let rows = vec!["09:00".to_string(), "09:30".to_string()];
/// let need = SlotMatrix::from_rows(rows.clone(), vec![day], vec![vec![1.0], vec![1.0]]).unwrap();
/// let actual = SlotMatrix::zeros(rows, vec![day]);
///
/// let result = compute_shortage(&need, &actual, &need, &ShortageConfig::default(), 0.5).unwrap();
/// assert_eq!(result.shortage.row(0), &[1.0]);
/// assert_eq!(result.excess.total(), 0.0);
/// assert_eq!(result.shortage_hours, 1.0);
/// ```
pub fn compute_shortage(
    need: &SlotMatrix,
    actual: &SlotMatrix,
    upper: &SlotMatrix,
    config: &ShortageConfig,
    slot_hours: f64,
) -> EngineResult<ShortageResult> {
    validate(config, slot_hours)?;

    let mut report = GuardReport::default();

    let aligned = align_columns(need, actual, upper, &mut report)?;
    let kept = truncate_period(aligned.columns(), config.max_span_days, &mut report);

    let need = aligned.need.select_columns(&kept);
    let actual = aligned.actual.select_columns(&kept);
    let upper = aligned.upper.select_columns(&kept);

    let mut shortage = SlotMatrix::zeros(need.index().to_vec(), kept.clone());
    let mut excess = SlotMatrix::zeros(need.index().to_vec(), kept);
    for row in 0..need.n_rows() {
        for col in 0..need.n_cols() {
            let present = actual.get(row, col);
            shortage.set(row, col, (need.get(row, col) - present).max(0.0));
            excess.set(row, col, (present - upper.get(row, col)).max(0.0));
        }
    }

    if let Some(cap_hours) = config.daily_cap_hours {
        shortage = apply_daily_cap(&shortage, cap_hours, slot_hours, &mut report);
    }

    let shortage_hours = shortage.total() * slot_hours;
    let excess_hours = excess.total() * slot_hours;

    info!(
        columns = shortage.n_cols(),
        shortage_hours,
        excess_hours,
        guard_warnings = report.warnings.len(),
        "Computed shortage and excess"
    );

    Ok(ShortageResult {
        shortage,
        excess,
        need,
        actual,
        upper,
        shortage_hours,
        excess_hours,
        report,
    })
}

fn validate(config: &ShortageConfig, slot_hours: f64) -> EngineResult<()> {
    if config.max_span_days == 0 {
        return Err(EngineError::invalid_config(
            "shortage.max_span_days",
            "must be at least 1",
        ));
    }
    if let Some(cap) = config.daily_cap_hours {
        if !cap.is_finite() || cap < 0.0 {
            return Err(EngineError::invalid_config(
                "shortage.daily_cap_hours",
                format!("must be a non-negative number, got {}", cap),
            ));
        }
    }
    if !slot_hours.is_finite() || slot_hours <= 0.0 {
        return Err(EngineError::invalid_config(
            "slots.slot_minutes",
            format!("slot duration must be positive, got {}h", slot_hours),
        ));
    }
    Ok(())
}
