//! Calculation logic for the shortage engine.
//!
//! This module contains the calculation stages in the order the pipeline runs
//! them: time-slot label generation, staffing matrix construction, need
//! baseline derivation, data-quality guards, shortage and excess arithmetic,
//! and proportional allocation across roles and employment categories.

mod allocation;
mod guards;
mod need_baseline;
mod shortage;
mod staffing_matrix;
mod statistics;
mod time_slots;

pub use allocation::{Allocation, allocate, allocate_matrix, check_consistency, to_decimal};
pub use guards::{AlignedMatrices, align_columns, apply_daily_cap, truncate_period};
pub use need_baseline::{NeedBaseline, compute_need_baseline};
pub use shortage::{ShortageResult, compute_shortage};
pub use staffing_matrix::{StaffingMatrices, build_staffing_matrices};
pub use statistics::{mean, median, percentile, remove_outliers_iqr, summarize};
pub use time_slots::{
    EXTENDED_SPAN_MINUTES, SlotPosition, TimeLabels, format_label, generate_time_labels,
    parse_label,
};
