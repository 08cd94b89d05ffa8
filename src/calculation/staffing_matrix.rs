//! Staffing matrix construction.
//!
//! This module turns presence records into distinct-staff counts per
//! (slot, date), overall and per role / employment category. Every matrix
//! produced by one build shares the same row labels and date columns.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::models::{
    EMPTY_INPUT, GuardReport, GuardWarning, PresenceRecord, RECORD_DROPPED, Severity, SlotMatrix,
};

use super::time_slots::TimeLabels;

/// The output of [`build_staffing_matrices`].
#[derive(Debug, Clone, PartialEq)]
pub struct StaffingMatrices {
    /// Distinct staff present per (slot, date).
    pub overall: SlotMatrix,
    /// Distinct staff per (slot, date) for each role observed.
    pub by_role: BTreeMap<String, SlotMatrix>,
    /// Distinct staff per (slot, date) for each employment category observed.
    pub by_employment: BTreeMap<String, SlotMatrix>,
    /// Distinct work records counted per role, used for proportional allocation.
    pub role_record_counts: BTreeMap<String, u64>,
    /// Distinct work records counted per employment category.
    pub employment_record_counts: BTreeMap<String, u64>,
    /// Leave and holiday records per date. These never count toward staffing.
    pub non_work_counts: BTreeMap<NaiveDate, u64>,
    /// Number of records that could not be placed on the grid.
    pub dropped_records: usize,
    /// Diagnostics raised while building.
    pub report: GuardReport,
}

/// A work record resolved onto the grid.
struct Placement<'a> {
    date: NaiveDate,
    row: usize,
    record: &'a PresenceRecord,
}

/// Builds the overall, per-role and per-employment staffing matrices.
///
/// Only `work` records are counted, and a staff member contributes at most
/// one to any (slot, date) cell no matter how many overlapping records they
/// have. The column set is every date observed in the input (after
/// past-midnight slots have been rolled onto their calendar day), so days
/// with only leave or holiday records appear as all-zero columns. Missing
/// (value, date) combinations in per-dimension matrices are zero-filled.
///
/// Records with an empty staff id, or a work record whose slot label cannot
/// be parsed, are dropped with a [`RECORD_DROPPED`] warning. An empty input
/// yields an all-zero matrix with no columns and an [`EMPTY_INPUT`] note.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::{TimeLabels, build_staffing_matrices};
/// use shortage_engine::models::{PresenceRecord, WorkStatus};
/// use chrono::NaiveDate;
///
/// let labels = TimeLabels::new(60, false).unwrap();
/// let record = |staff: &str, slot: &str| PresenceRecord {
///     staff_id: staff.to_string(),
///     date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
///     slot: slot.to_string(),
///     role: "nurse".to_string(),
///     employment: "full_time".to_string(),
///     status: WorkStatus::Work,
/// };
///
/// // The same person twice in the 09:00 slot counts once.
/// let records = vec![record("a", "09:00"), record("a", "09:30"), record("b", "09:00")];
/// let built = build_staffing_matrices(&records, &labels);
/// assert_eq!(built.overall.get(9, 0), 2.0);
/// assert_eq!(built.role_record_counts["nurse"], 2);
/// ```
pub fn build_staffing_matrices(records: &[PresenceRecord], labels: &TimeLabels) -> StaffingMatrices {
    let index = labels.labels().to_vec();
    let mut report = GuardReport::default();

    if records.is_empty() {
        info!("No presence records supplied; producing empty staffing matrices");
        report.push(GuardWarning::new(
            EMPTY_INPUT,
            "No presence records supplied",
            Severity::Low,
        ));
        return StaffingMatrices {
            overall: SlotMatrix::zeros(index, Vec::new()),
            by_role: BTreeMap::new(),
            by_employment: BTreeMap::new(),
            role_record_counts: BTreeMap::new(),
            employment_record_counts: BTreeMap::new(),
            non_work_counts: BTreeMap::new(),
            dropped_records: 0,
            report,
        };
    }

    let mut dates = BTreeSet::new();
    let mut placements = Vec::new();
    let mut non_work_counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut dropped_records = 0;

    for record in records {
        if record.staff_id.trim().is_empty() {
            dropped_records += 1;
            report.push(GuardWarning::for_date(
                RECORD_DROPPED,
                record.date,
                format!("Record at slot '{}' has no staff id", record.slot),
                Severity::Medium,
            ));
            continue;
        }

        let position = labels.position(&record.slot);
        let date = position
            .and_then(|p| record.date.checked_add_days(Days::new(u64::from(p.day_offset))))
            .unwrap_or(record.date);

        if !record.is_work() {
            *non_work_counts.entry(date).or_default() += 1;
            dates.insert(date);
            continue;
        }

        match position {
            Some(p) => {
                dates.insert(date);
                placements.push(Placement {
                    date,
                    row: p.row,
                    record,
                });
            }
            None => {
                dropped_records += 1;
                warn!(
                    staff_id = %record.staff_id,
                    date = %record.date,
                    slot = %record.slot,
                    "Dropping work record with malformed slot label"
                );
                report.push(GuardWarning::for_date(
                    RECORD_DROPPED,
                    record.date,
                    format!(
                        "Work record for staff '{}' has malformed slot label '{}'",
                        record.staff_id, record.slot
                    ),
                    Severity::Medium,
                ));
            }
        }
    }

    let columns: Vec<NaiveDate> = dates.into_iter().collect();
    let column_of: BTreeMap<NaiveDate, usize> =
        columns.iter().enumerate().map(|(c, d)| (*d, c)).collect();

    let mut overall = SlotMatrix::zeros(index.clone(), columns.clone());
    let mut by_role: BTreeMap<String, SlotMatrix> = BTreeMap::new();
    let mut by_employment: BTreeMap<String, SlotMatrix> = BTreeMap::new();
    let mut role_record_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut employment_record_counts: BTreeMap<String, u64> = BTreeMap::new();

    let mut seen_overall: HashSet<(NaiveDate, usize, &str)> = HashSet::new();
    let mut seen_role: HashSet<(&str, NaiveDate, usize, &str)> = HashSet::new();
    let mut seen_employment: HashSet<(&str, NaiveDate, usize, &str)> = HashSet::new();

    for placement in &placements {
        let col = column_of[&placement.date];
        let staff = placement.record.staff_id.as_str();
        let role = placement.record.role.as_str();
        let employment = placement.record.employment.as_str();

        if seen_overall.insert((placement.date, placement.row, staff)) {
            overall.add(placement.row, col, 1.0);
        }

        if seen_role.insert((role, placement.date, placement.row, staff)) {
            by_role
                .entry(role.to_string())
                .or_insert_with(|| SlotMatrix::zeros(index.clone(), columns.clone()))
                .add(placement.row, col, 1.0);
            *role_record_counts.entry(role.to_string()).or_default() += 1;
        }

        if seen_employment.insert((employment, placement.date, placement.row, staff)) {
            by_employment
                .entry(employment.to_string())
                .or_insert_with(|| SlotMatrix::zeros(index.clone(), columns.clone()))
                .add(placement.row, col, 1.0);
            *employment_record_counts
                .entry(employment.to_string())
                .or_default() += 1;
        }
    }

    debug!(
        records = records.len(),
        work_placements = placements.len(),
        distinct_cells = seen_overall.len(),
        dropped = dropped_records,
        "Deduplicated presence records"
    );
    info!(
        rows = overall.n_rows(),
        columns = overall.n_cols(),
        roles = by_role.len(),
        employment_categories = by_employment.len(),
        total_staff_slots = overall.total(),
        "Built staffing matrices"
    );

    StaffingMatrices {
        overall,
        by_role,
        by_employment,
        role_record_counts,
        employment_record_counts,
        non_work_counts,
        dropped_records,
        report,
    }
}
