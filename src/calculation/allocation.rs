//! Proportional consistency enforcement.
//!
//! An overall total (shortage, excess or need hours) is decomposed across the
//! values of one dimension (role or employment category) in proportion to
//! each value's record count. Because the shares come from a single
//! partition of one record population they sum to one, so the allocated
//! totals reconcile with the overall total by construction. A separate
//! validation pass re-adds them and reports any rounding residue.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::{debug, warn};

use crate::config::ConsistencyConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{ConsistencyReport, SlotMatrix};

/// Decimal places kept when converting floating-point totals.
const TOTAL_SCALE: u32 = 9;

/// The output of [`allocate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Allocated total per dimension value.
    pub per_dimension_totals: BTreeMap<String, Decimal>,
    /// The validation result.
    pub report: ConsistencyReport,
}

/// Converts a floating-point hour total into a [`Decimal`].
///
/// # Errors
///
/// Returns [`EngineError::CalculationError`] for NaN or infinite values.
pub fn to_decimal(value: f64) -> EngineResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(TOTAL_SCALE).normalize())
        .ok_or_else(|| EngineError::CalculationError {
            message: format!("total {} cannot be represented as a decimal", value),
        })
}

/// Splits `overall_total` across dimension values by record share.
///
/// `measure` and `dimension` only label the report. A check that fails is a
/// non-fatal diagnostic unless `config.strict` is set.
///
/// # Errors
///
/// Returns [`EngineError::ConsistencyCheckFailed`] in strict mode when the
/// allocated sum misses the overall total by more than the tolerance, and
/// [`EngineError::CalculationError`] for a non-finite total.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::allocate;
/// use shortage_engine::config::ConsistencyConfig;
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let counts: BTreeMap<String, u64> = [("nurse", 10), ("aide", 5), ("cook", 5)]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v))
///     .collect();
///
/// let allocation = allocate("shortage", "role", 20.0, &counts, &ConsistencyConfig::default()).unwrap();
/// assert_eq!(allocation.per_dimension_totals["nurse"], Decimal::from(10));
/// assert_eq!(allocation.per_dimension_totals["aide"], Decimal::from(5));
/// assert_eq!(allocation.report.allocated_sum, Decimal::from(20));
/// assert!(allocation.report.passed);
/// ```
pub fn allocate(
    measure: &str,
    dimension: &str,
    overall_total: f64,
    counts: &BTreeMap<String, u64>,
    config: &ConsistencyConfig,
) -> EngineResult<Allocation> {
    let overall = to_decimal(overall_total)?;
    let total_count: u64 = counts.values().sum();

    let mut per_dimension_totals = BTreeMap::new();
    if total_count > 0 {
        let denominator = Decimal::from(total_count);
        for (value, count) in counts {
            let allocated = overall
                .checked_mul(Decimal::from(*count))
                .and_then(|scaled| scaled.checked_div(denominator))
                .ok_or_else(|| EngineError::CalculationError {
                    message: format!(
                        "allocating {} {} to {} '{}' overflowed",
                        overall, measure, dimension, value
                    ),
                })?;
            per_dimension_totals.insert(value.clone(), allocated);
        }
    }

    let report = check_consistency(
        measure,
        dimension,
        overall,
        &per_dimension_totals,
        config.tolerance,
    );

    debug!(
        measure,
        dimension,
        overall_total = %overall,
        values = per_dimension_totals.len(),
        difference = %report.difference,
        "Allocated total across dimension"
    );

    if !report.passed {
        warn!(
            measure,
            dimension,
            overall_total = %report.overall_total,
            allocated_sum = %report.allocated_sum,
            difference = %report.difference,
            tolerance = %report.tolerance,
            "Consistency check failed"
        );
        if config.strict {
            return Err(EngineError::ConsistencyCheckFailed {
                dimension: format!("{}/{}", measure, dimension),
                difference: report.abs_difference(),
                tolerance: report.tolerance,
            });
        }
    }

    Ok(Allocation {
        per_dimension_totals,
        report,
    })
}

/// Re-adds a decomposition and compares it with the overall total.
///
/// This never re-normalises: a residue beyond `tolerance` is reported as a
/// failed check and left in place.
pub fn check_consistency(
    measure: &str,
    dimension: &str,
    overall_total: Decimal,
    per_dimension_totals: &BTreeMap<String, Decimal>,
    tolerance: Decimal,
) -> ConsistencyReport {
    let allocated_sum: Decimal = per_dimension_totals.values().copied().sum();
    let difference = allocated_sum - overall_total;

    ConsistencyReport {
        measure: measure.to_string(),
        dimension: dimension.to_string(),
        overall_total,
        per_dimension_totals: per_dimension_totals.clone(),
        allocated_sum,
        difference,
        tolerance,
        passed: difference.abs() <= tolerance,
    }
}

/// Splits a matrix cell-wise across dimension values by record share.
///
/// Each value receives `overall × count / total_count`, so the per-value
/// matrices add back to `overall` in every cell. Returns an empty map when
/// there are no records.
pub fn allocate_matrix(
    overall: &SlotMatrix,
    counts: &BTreeMap<String, u64>,
) -> BTreeMap<String, SlotMatrix> {
    let total_count: u64 = counts.values().sum();
    if total_count == 0 {
        return BTreeMap::new();
    }

    counts
        .iter()
        .map(|(value, count)| {
            let share = *count as f64 / total_count as f64;
            (value.clone(), overall.scaled(share))
        })
        .collect()
}
