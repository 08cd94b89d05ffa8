//! Core data models for the shortage engine.
//!
//! This module contains the domain models shared by every pipeline stage.

mod consistency;
mod guard;
mod matrix;
mod presence;

pub use consistency::ConsistencyReport;
pub use guard::{
    CONSISTENCY_CHECK_FAILED, DAILY_CAP_APPLIED, EMPTY_BASELINE_ROW, EMPTY_INPUT, GuardReport,
    GuardWarning, PERIOD_TRUNCATED, RECORD_DROPPED, Severity, UNMATCHED_DATE_COLUMN,
};
pub use matrix::SlotMatrix;
pub use presence::{PresenceRecord, WorkStatus};
