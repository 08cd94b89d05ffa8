//! Diagnostics emitted by stage-local guards.
//!
//! Guards never fail a scenario. When one fires it records a
//! [`GuardWarning`] so downstream consumers can see what was dropped,
//! truncated or scaled.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Warning code: a date column existed on only one side of an alignment.
pub const UNMATCHED_DATE_COLUMN: &str = "unmatched_date_column";
/// Warning code: the aligned period exceeded the maximum span.
pub const PERIOD_TRUNCATED: &str = "period_truncated";
/// Warning code: a day's shortage exceeded the daily cap and was scaled down.
pub const DAILY_CAP_APPLIED: &str = "daily_cap_applied";
/// Warning code: a baseline row had no values left to summarise.
pub const EMPTY_BASELINE_ROW: &str = "empty_baseline_row";
/// Warning code: the run had no presence records.
pub const EMPTY_INPUT: &str = "empty_input";
/// Warning code: a record could not be placed on the slot grid.
pub const RECORD_DROPPED: &str = "record_dropped";
/// Warning code: an allocation did not reconcile within tolerance.
pub const CONSISTENCY_CHECK_FAILED: &str = "consistency_check_failed";

/// How much attention a warning deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Output was altered by a guard.
    Medium,
    /// Output may be unreliable.
    High,
}

/// A single guard diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level.
    pub severity: Severity,
    /// The date column the warning refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl GuardWarning {
    /// Creates a warning not tied to a specific date.
    pub fn new(code: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            date: None,
        }
    }

    /// Creates a warning about a specific date column.
    pub fn for_date(
        code: &str,
        date: NaiveDate,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            date: Some(date),
        }
    }
}

/// The ordered list of warnings a stage produced.
///
/// # Example
///
/// ```
/// use shortage_engine::models::{GuardReport, GuardWarning, Severity, PERIOD_TRUNCATED};
///
/// let mut report = GuardReport::default();
/// report.push(GuardWarning::new(PERIOD_TRUNCATED, "kept 90 of 365 columns", Severity::Medium));
/// assert!(report.has(PERIOD_TRUNCATED));
/// assert_eq!(report.count(PERIOD_TRUNCATED), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardReport {
    /// Warnings in the order they were raised.
    pub warnings: Vec<GuardWarning>,
}

impl GuardReport {
    /// Appends a warning.
    pub fn push(&mut self, warning: GuardWarning) {
        self.warnings.push(warning);
    }

    /// Appends all warnings from another report.
    pub fn extend(&mut self, other: GuardReport) {
        self.warnings.extend(other.warnings);
    }

    /// Returns true if any warning carries `code`.
    pub fn has(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Number of warnings carrying `code`.
    pub fn count(&self, code: &str) -> usize {
        self.warnings.iter().filter(|w| w.code == code).count()
    }

    /// Dates referenced by warnings carrying `code`.
    pub fn dates(&self, code: &str) -> Vec<NaiveDate> {
        self.warnings
            .iter()
            .filter(|w| w.code == code)
            .filter_map(|w| w.date)
            .collect()
    }

    /// Returns true if no warnings were raised.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates_filters_by_code() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let mut report = GuardReport::default();
        report.push(GuardWarning::for_date(
            UNMATCHED_DATE_COLUMN,
            date,
            "only in need",
            Severity::Medium,
        ));
        report.push(GuardWarning::new(PERIOD_TRUNCATED, "truncated", Severity::Medium));

        assert_eq!(report.dates(UNMATCHED_DATE_COLUMN), vec![date]);
        assert!(report.dates(PERIOD_TRUNCATED).is_empty());
        assert!(!report.has(DAILY_CAP_APPLIED));
    }

    #[test]
    fn test_warning_without_date_skips_field() {
        let warning = GuardWarning::new(EMPTY_INPUT, "no records", Severity::Low);
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("\"severity\":\"low\""));
        assert!(!json.contains("date"));
    }
}
