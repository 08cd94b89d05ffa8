//! Cross-dimension reconciliation results.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of reconciling one overall total against one dimension's shares.
///
/// `passed` is true when `|difference| <= tolerance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// What was allocated (e.g. `shortage`, `need`).
    pub measure: String,
    /// The dimension the total was split across (e.g. `role`).
    pub dimension: String,
    /// The overall total being decomposed, in hour-equivalents.
    pub overall_total: Decimal,
    /// Allocated total per dimension value.
    pub per_dimension_totals: BTreeMap<String, Decimal>,
    /// Sum of `per_dimension_totals`.
    pub allocated_sum: Decimal,
    /// `allocated_sum - overall_total`.
    pub difference: Decimal,
    /// The tolerance the difference was checked against.
    pub tolerance: Decimal,
    /// Whether the check passed.
    pub passed: bool,
}

impl ConsistencyReport {
    /// Absolute value of the difference.
    pub fn abs_difference(&self) -> Decimal {
        self.difference.abs()
    }
}
