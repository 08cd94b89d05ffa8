//! Presence record ingestion boundary.
//!
//! The engine does not parse source workbooks. An upstream collaborator
//! hands over presence records as a JSON array, and this module loads them.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{PresenceRecord, WorkStatus};

/// Loads presence records from a JSON file.
///
/// The file must contain a single array of [`PresenceRecord`] objects.
///
/// # Errors
///
/// Returns [`EngineError::RecordsNotFound`] if the file cannot be read and
/// [`EngineError::RecordsParseError`] if it is not a valid record array.
///
/// # Example
///
/// ```no_run
/// use shortage_engine::ingest::load_records;
///
/// let records = load_records("./data/presence.json")?;
/// println!("Loaded {} records", records.len());
/// # Ok::<(), shortage_engine::error::EngineError>(())
/// ```
pub fn load_records<P: AsRef<Path>>(path: P) -> EngineResult<Vec<PresenceRecord>> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|_| EngineError::RecordsNotFound {
        path: path_str.clone(),
    })?;

    let records: Vec<PresenceRecord> =
        serde_json::from_str(&content).map_err(|e| EngineError::RecordsParseError {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

    info!(path = %path_str, records = records.len(), "Loaded presence records");
    Ok(records)
}

/// Returns the dates on which every record carries the holiday flag.
///
/// This is an opt-in helper for callers that have no holiday calendar. Its
/// result is never applied automatically; pass it into
/// [`NeedConfig::holidays`](crate::config::NeedConfig::holidays) explicitly
/// if wanted.
///
/// # Example
///
/// ```
/// use shortage_engine::ingest::flagged_holiday_dates;
/// use shortage_engine::models::{PresenceRecord, WorkStatus};
/// use chrono::NaiveDate;
///
/// let record = |day: u32, status: WorkStatus| PresenceRecord {
///     staff_id: "s-001".to_string(),
///     date: NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
///     slot: "09:00".to_string(),
///     role: "nurse".to_string(),
///     employment: "full_time".to_string(),
///     status,
/// };
///
/// let records = vec![record(24, WorkStatus::Work), record(25, WorkStatus::Holiday)];
/// let flagged = flagged_holiday_dates(&records);
/// assert_eq!(flagged.len(), 1);
/// assert!(flagged.contains(&NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
/// ```
pub fn flagged_holiday_dates(records: &[PresenceRecord]) -> BTreeSet<NaiveDate> {
    let mut all_holiday: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for record in records {
        let entry = all_holiday.entry(record.date).or_insert(true);
        *entry &= record.status == WorkStatus::Holiday;
    }

    let flagged: BTreeSet<NaiveDate> = all_holiday
        .into_iter()
        .filter_map(|(date, holiday)| holiday.then_some(date))
        .collect();

    debug!(dates = flagged.len(), "Flagged holiday dates from records");
    flagged
}
