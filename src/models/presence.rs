//! Presence record model.
//!
//! A [`PresenceRecord`] states that one staff member occupied one time slot on
//! one date. Records are produced by the ingestion collaborator and are
//! immutable inside the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What a staff member was doing in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// On duty; counts toward staffing.
    Work,
    /// On leave; excluded from staffing counts.
    Leave,
    /// Off for a holiday; excluded from staffing counts.
    Holiday,
}

/// One staff member occupying one slot.
///
/// # Example
///
/// ```
/// use shortage_engine::models::{PresenceRecord, WorkStatus};
/// use chrono::NaiveDate;
///
/// let record = PresenceRecord {
///     staff_id: "s-001".to_string(),
///     date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
///     slot: "09:00".to_string(),
///     role: "nurse".to_string(),
///     employment: "full_time".to_string(),
///     status: WorkStatus::Work,
/// };
/// assert!(record.is_work());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// Identifier of the staff member.
    pub staff_id: String,
    /// Calendar date the slot belongs to (the shift start day in extended mode).
    pub date: NaiveDate,
    /// Slot label, `HH:MM`. May exceed `24:00` for overnight shifts.
    pub slot: String,
    /// Role (job function) of the staff member.
    pub role: String,
    /// Employment category (e.g. full-time, part-time, agency).
    pub employment: String,
    /// Work/leave/holiday flag.
    pub status: WorkStatus,
}

impl PresenceRecord {
    /// Returns true if the record counts toward staffing.
    pub fn is_work(&self) -> bool {
        self.status == WorkStatus::Work
    }
}
