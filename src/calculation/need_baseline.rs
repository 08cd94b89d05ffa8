//! Need baseline calculation.
//!
//! This module derives, per time-slot row, a representative staffing level
//! from historical actuals. Each row is summarised independently:
//!
//! 1. collect the row's values on non-holiday dates,
//! 2. optionally discard IQR outliers,
//! 3. apply the configured statistic,
//! 4. multiply by the adjustment factor and clip at zero,
//! 5. write the value into every non-holiday column; holidays get zero.
//!
//! In monthly-pattern mode the steps run separately for each calendar month
//! and the month results are concatenated. A month's slice therefore does
//! not depend on which other months are part of the run.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::config::{NeedConfig, NeedMode, Statistic};
use crate::error::{EngineError, EngineResult};
use crate::models::{EMPTY_BASELINE_ROW, GuardReport, GuardWarning, Severity, SlotMatrix};

use super::statistics::{remove_outliers_iqr, summarize};

/// The output of [`compute_need_baseline`].
#[derive(Debug, Clone, PartialEq)]
pub struct NeedBaseline {
    /// Required staffing per (slot, date), same shape as the input.
    pub need: SlotMatrix,
    /// Notes about rows that had no values to summarise.
    pub report: GuardReport,
}

/// A contiguous set of columns summarised together.
struct Partition {
    label: String,
    dates: Vec<NaiveDate>,
}

/// Computes the need baseline from a matrix of historical actuals.
///
/// The result has exactly the input's rows and columns. Cells on dates in
/// `config.holidays` are always zero. Rows whose value set is empty (every
/// date a holiday, or everything trimmed as an outlier) get zero and an
/// [`EMPTY_BASELINE_ROW`] note.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] for a negative or non-finite
/// adjustment factor, a non-positive outlier multiplier or an out-of-range
/// percentile.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::compute_need_baseline;
/// use shortage_engine::config::NeedConfig;
/// use shortage_engine::models::SlotMatrix;
/// use chrono::NaiveDate;
///
/// let dates: Vec<NaiveDate> = (1..=3)
///     .map(|d| NaiveDate::from_ymd_opt(2025, 4, d).unwrap())
///     .collect();
/// let actual = SlotMatrix::from_rows(
///     vec!["09:00".into()],
///     dates,
///     vec![vec![2.0, 4.0, 3.0]],
/// ).unwrap();
///
/// let baseline = compute_need_baseline(&actual, &NeedConfig::default()).unwrap();
/// assert_eq!(baseline.need.row(0), &[3.0, 3.0, 3.0]);
/// ```
pub fn compute_need_baseline(actual: &SlotMatrix, config: &NeedConfig) -> EngineResult<NeedBaseline> {
    validate(config)?;

    let mut report = GuardReport::default();
    let index = actual.index().to_vec();

    let parts = partitions(actual.columns(), config.mode)
        .iter()
        .map(|partition| {
            let slice = actual.select_columns(&partition.dates);
            summarise_partition(&slice, partition, config, &mut report)
        })
        .collect::<Vec<_>>();

    let need = SlotMatrix::hconcat(index, parts)?;

    info!(
        statistic = %config.statistic,
        mode = %config.mode,
        outlier_removal = config.outlier_removal,
        weekday_pattern = config.weekday_pattern,
        holidays = config.holidays.len(),
        columns = need.n_cols(),
        need_total = need.total(),
        "Computed need baseline"
    );

    Ok(NeedBaseline { need, report })
}

fn validate(config: &NeedConfig) -> EngineResult<()> {
    if !config.adjustment_factor.is_finite() || config.adjustment_factor < 0.0 {
        return Err(EngineError::invalid_config(
            "need.adjustment_factor",
            format!("must be a non-negative number, got {}", config.adjustment_factor),
        ));
    }
    if config.outlier_removal
        && (!config.outlier_multiplier.is_finite() || config.outlier_multiplier <= 0.0)
    {
        return Err(EngineError::invalid_config(
            "need.outlier_multiplier",
            format!("must be positive, got {}", config.outlier_multiplier),
        ));
    }
    if let Statistic::Percentile(p) = config.statistic {
        if !(0.0..=100.0).contains(&p) {
            return Err(EngineError::invalid_config(
                "need.statistic",
                format!("percentile {} is outside 0..=100", p),
            ));
        }
    }
    Ok(())
}

/// Splits ascending date columns according to the mode.
fn partitions(columns: &[NaiveDate], mode: NeedMode) -> Vec<Partition> {
    match mode {
        NeedMode::SinglePeriod => vec![Partition {
            label: "whole period".to_string(),
            dates: columns.to_vec(),
        }],
        NeedMode::MonthlyPattern => {
            let mut months: BTreeMap<(i32, u32), Vec<NaiveDate>> = BTreeMap::new();
            for date in columns {
                months
                    .entry((date.year(), date.month()))
                    .or_default()
                    .push(*date);
            }
            months
                .into_iter()
                .map(|((year, month), dates)| Partition {
                    label: format!("{:04}-{:02}", year, month),
                    dates,
                })
                .collect()
        }
    }
}

/// Summarises every row of one partition.
fn summarise_partition(
    slice: &SlotMatrix,
    partition: &Partition,
    config: &NeedConfig,
    report: &mut GuardReport,
) -> SlotMatrix {
    let mut need = SlotMatrix::zeros(slice.index().to_vec(), slice.columns().to_vec());

    // Column groups sharing one statistic: every column, or one group per weekday.
    let mut groups: BTreeMap<Option<u32>, Vec<usize>> = BTreeMap::new();
    for (col, date) in slice.columns().iter().enumerate() {
        let key = config
            .weekday_pattern
            .then(|| date.weekday().num_days_from_monday());
        groups.entry(key).or_default().push(col);
    }

    for (weekday, cols) in &groups {
        let working: Vec<usize> = cols
            .iter()
            .copied()
            .filter(|c| !config.holidays.contains(&slice.columns()[*c]))
            .collect();
        let mut empty_rows = Vec::new();

        for row in 0..slice.n_rows() {
            let values: Vec<f64> = working.iter().map(|c| slice.get(row, *c)).collect();
            let values = if config.outlier_removal {
                remove_outliers_iqr(&values, config.outlier_multiplier)
            } else {
                values
            };

            let Some(statistic) = summarize(&values, config.statistic) else {
                empty_rows.push(slice.index()[row].as_str());
                continue;
            };

            let value = (statistic * config.adjustment_factor).max(0.0);
            for col in &working {
                need.set(row, *col, value);
            }
        }

        if !empty_rows.is_empty() {
            let scope = match weekday {
                Some(_) => format!(
                    "{} ({})",
                    partition.label,
                    slice.columns()[cols[0]].weekday()
                ),
                None => partition.label.clone(),
            };
            debug!(
                scope = %scope,
                rows = empty_rows.len(),
                "Baseline rows had no values after filtering"
            );
            report.push(GuardWarning::new(
                EMPTY_BASELINE_ROW,
                format!(
                    "{} of {} rows in {} had no values to summarise and were set to 0 (first: {})",
                    empty_rows.len(),
                    slice.n_rows(),
                    scope,
                    empty_rows[0]
                ),
                Severity::Low,
            ));
        }
    }

    need
}
