//! Data-quality guards for the shortage calculation.
//!
//! Each guard is a standalone stage that absorbs one class of bad input and
//! records what it did in a [`GuardReport`]:
//!
//! - [`align_columns`] drops date columns not present on every side,
//! - [`truncate_period`] bounds the number of date columns,
//! - [`apply_daily_cap`] scales down days whose shortage exceeds a cap.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    DAILY_CAP_APPLIED, GuardReport, GuardWarning, PERIOD_TRUNCATED, Severity, SlotMatrix,
    UNMATCHED_DATE_COLUMN,
};

/// Need, actual and upper restricted to a common set of date columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrices {
    /// Aligned need baseline.
    pub need: SlotMatrix,
    /// Aligned actual staffing.
    pub actual: SlotMatrix,
    /// Aligned upper ceiling.
    pub upper: SlotMatrix,
}

impl AlignedMatrices {
    /// The shared date columns.
    pub fn columns(&self) -> &[NaiveDate] {
        self.need.columns()
    }
}

/// Restricts need, actual and upper to the dates present in all three.
///
/// Every dropped column produces an [`UNMATCHED_DATE_COLUMN`] warning naming
/// the sides it was found on. This keeps a day missing from one side from
/// contributing a full day of spurious shortage or excess.
///
/// # Errors
///
/// Returns [`EngineError::MatrixShapeMismatch`] if the row labels differ.
pub fn align_columns(
    need: &SlotMatrix,
    actual: &SlotMatrix,
    upper: &SlotMatrix,
    report: &mut GuardReport,
) -> EngineResult<AlignedMatrices> {
    if !need.same_index(actual) || !need.same_index(upper) {
        return Err(EngineError::MatrixShapeMismatch {
            message: "need, actual and upper must share the same time-slot rows".to_string(),
        });
    }

    let sides = [("need", need), ("actual", actual), ("upper", upper)];
    let all: BTreeSet<NaiveDate> = sides
        .iter()
        .flat_map(|(_, m)| m.columns().iter().copied())
        .collect();

    let mut common = Vec::new();
    for date in all {
        let present: Vec<&str> = sides
            .iter()
            .filter(|(_, m)| m.column_position(date).is_some())
            .map(|(name, _)| *name)
            .collect();

        if present.len() == sides.len() {
            common.push(date);
            continue;
        }

        warn!(date = %date, present_in = ?present, "Dropping unmatched date column");
        report.push(GuardWarning::for_date(
            UNMATCHED_DATE_COLUMN,
            date,
            format!(
                "unmatched date column: {} present only in {}; dropped from all outputs",
                date,
                present.join(", ")
            ),
            Severity::Medium,
        ));
    }

    Ok(AlignedMatrices {
        need: need.select_columns(&common),
        actual: actual.select_columns(&common),
        upper: upper.select_columns(&common),
    })
}

/// Keeps at most `max_span` dates, earliest first.
///
/// `dates` must be ascending. Records a [`PERIOD_TRUNCATED`] warning when
/// anything is cut.
pub fn truncate_period(
    dates: &[NaiveDate],
    max_span: usize,
    report: &mut GuardReport,
) -> Vec<NaiveDate> {
    if dates.len() <= max_span {
        return dates.to_vec();
    }

    let kept = &dates[..max_span];
    let first_dropped = dates[max_span];
    warn!(
        requested = dates.len(),
        kept = max_span,
        first_dropped = %first_dropped,
        "Analysis period exceeds maximum span; truncating"
    );
    report.push(GuardWarning::new(
        PERIOD_TRUNCATED,
        format!(
            "period truncated: {} date columns requested, kept the first {} ({} to {})",
            dates.len(),
            max_span,
            kept[0],
            kept[max_span - 1]
        ),
        Severity::Medium,
    ));
    kept.to_vec()
}

/// Scales down any column whose shortage exceeds `cap_hours`.
///
/// A column's hour-equivalent total is its cell sum times `slot_hours`.
/// When that exceeds the cap, every cell in the column is multiplied by
/// `cap / total`, so the column lands exactly on the cap with its intra-day
/// distribution intact. Each scaled column gets a [`DAILY_CAP_APPLIED`]
/// warning.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::apply_daily_cap;
/// use shortage_engine::models::{GuardReport, SlotMatrix};
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
/// let shortage = SlotMatrix::from_rows(
///     vec!["09:00".into(), "10:00".into()],
///     vec![day],
///     vec![vec![30.0], vec![10.0]],
/// ).unwrap();
///
/// let mut report = GuardReport::default();
/// let capped = apply_daily_cap(&shortage, 20.0, 1.0, &mut report);
/// assert_eq!(capped.row(0), &[15.0]);
/// assert_eq!(capped.row(1), &[5.0]);
/// ```
pub fn apply_daily_cap(
    shortage: &SlotMatrix,
    cap_hours: f64,
    slot_hours: f64,
    report: &mut GuardReport,
) -> SlotMatrix {
    let mut capped = shortage.clone();

    for (col, date) in shortage.columns().iter().enumerate() {
        let day_hours = shortage.column_sum(col) * slot_hours;
        if day_hours <= cap_hours {
            continue;
        }

        let ratio = cap_hours / day_hours;
        for row in 0..capped.n_rows() {
            capped.set(row, col, shortage.get(row, col) * ratio);
        }
        trim_to_cap(&mut capped, col, cap_hours, slot_hours);

        warn!(
            date = %date,
            shortage_hours = day_hours,
            cap_hours,
            ratio,
            "Daily shortage exceeds cap; scaling down"
        );
        report.push(GuardWarning::for_date(
            DAILY_CAP_APPLIED,
            *date,
            format!(
                "shortage of {:.2}h on {} exceeds the daily cap of {:.2}h; scaled by {:.4}",
                day_hours, date, cap_hours, ratio
            ),
            Severity::Medium,
        ));
    }

    capped
}

/// Upper bound on residue trimming passes for one column.
const MAX_TRIM_STEPS: usize = 64;

/// Lowers the largest cell of a scaled column until the column no longer
/// exceeds the cap. Scaling by `cap / total` can overshoot by a few ulps.
fn trim_to_cap(matrix: &mut SlotMatrix, col: usize, cap_hours: f64, slot_hours: f64) {
    for _ in 0..MAX_TRIM_STEPS {
        let over = matrix.column_sum(col) * slot_hours - cap_hours;
        if over <= 0.0 {
            return;
        }
        let largest = (0..matrix.n_rows())
            .max_by(|a, b| matrix.get(*a, col).total_cmp(&matrix.get(*b, col)));
        let Some(row) = largest else {
            return;
        };
        let value = matrix.get(row, col);
        if value <= 0.0 {
            return;
        }
        // step down by at least one ulp so every pass makes progress
        let one_ulp_down = f64::from_bits(value.to_bits() - 1);
        let lowered = (value - over / slot_hours).min(one_ulp_down).max(0.0);
        matrix.set(row, col, lowered);
    }
}
