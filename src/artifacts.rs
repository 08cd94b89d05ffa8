//! Columnar snapshot artifacts.
//!
//! Each matrix of a [`PipelineOutput`] is written as `<name>.json` in
//! `{index, columns, data}` form together with a `<name>.meta.json` sidecar.
//! The consistency and guard reports are written alongside. All maps are
//! ordered, so writing the same output twice produces identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{NeedMode, Statistic};
use crate::error::{EngineError, EngineResult};
use crate::models::{ConsistencyReport, GuardReport, SlotMatrix};
use crate::pipeline::{
    DimensionBreakdown, EMPLOYMENT_DIMENSION, PipelineOutput, ROLE_DIMENSION, validate_scenario_name,
};

/// File name of the consistency report.
pub const CONSISTENCY_REPORT_FILE: &str = "consistency_report.json";
/// File name of the guard report.
pub const GUARD_REPORT_FILE: &str = "guard_report.json";

/// First and last date column of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date column.
    pub start: NaiveDate,
    /// Last date column.
    pub end: NaiveDate,
}

/// Sidecar metadata written next to every matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Matrix name, matching the file stem.
    pub matrix: String,
    /// Scenario that produced the matrix.
    pub scenario: String,
    /// Slot width in minutes.
    pub slot_minutes: u32,
    /// Whether the slot grid extends past midnight.
    pub extended: bool,
    /// Statistic used for the baseline behind this matrix.
    pub statistic_method: Statistic,
    /// Whether IQR outlier removal was applied.
    pub outlier_removal: bool,
    /// Adjustment factor applied to the statistic.
    pub adjustment_factor: f64,
    /// Configured holidays inside the matrix's date range.
    pub holidays_used: Vec<NaiveDate>,
    /// Date range covered, absent for a matrix without columns.
    pub date_range: Option<DateRange>,
    /// Need baseline partitioning mode.
    pub mode: NeedMode,
}

#[derive(Serialize)]
struct GuardReportArtifact<'a> {
    scenario: &'a str,
    dropped_records: usize,
    non_work_counts: &'a BTreeMap<NaiveDate, u64>,
    #[serde(flatten)]
    report: &'a GuardReport,
}

#[derive(Serialize)]
struct ConsistencyArtifact<'a> {
    scenario: &'a str,
    passed: bool,
    reports: &'a [ConsistencyReport],
}

/// Which baseline a matrix derives from, for its metadata.
#[derive(Clone, Copy)]
enum Basis {
    Need,
    Upper,
}

/// Writes every artifact of `output` under `root/<scenario>/`.
///
/// Returns the written paths in write order.
///
/// # Errors
///
/// Returns [`EngineError::ArtifactWrite`] if the scenario name is not a plain
/// directory name, a directory or file cannot be created, or a value cannot
/// be serialized.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use shortage_engine::artifacts::write_artifacts;
/// use shortage_engine::config::EngineConfig;
/// use shortage_engine::pipeline::{RunContext, run_pipeline};
///
/// let context = RunContext::new("baseline", Arc::new(Vec::new()), EngineConfig::default())?;
/// let output = run_pipeline(&context)?;
/// let written = write_artifacts("./out", &output)?;
/// println!("Wrote {} files", written.len());
/// # Ok::<(), shortage_engine::error::EngineError>(())
/// ```
pub fn write_artifacts<P: AsRef<Path>>(root: P, output: &PipelineOutput) -> EngineResult<Vec<PathBuf>> {
    validate_scenario_name(&output.scenario).map_err(|e| EngineError::ArtifactWrite {
        path: root.as_ref().display().to_string(),
        message: e.to_string(),
    })?;

    let dir = root.as_ref().join(&output.scenario);
    fs::create_dir_all(&dir).map_err(|e| EngineError::ArtifactWrite {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut writer = ArtifactWriter {
        dir,
        output,
        names: BTreeSet::new(),
        written: Vec::new(),
    };

    let staffing = &output.staffing;
    writer.matrix("staffing_overall", &staffing.overall, Basis::Need)?;
    writer.family("staffing", ROLE_DIMENSION, &staffing.by_role, Basis::Need)?;
    writer.family("staffing", EMPLOYMENT_DIMENSION, &staffing.by_employment, Basis::Need)?;

    let result = &output.shortage;
    writer.matrix("actual", &result.actual, Basis::Need)?;
    writer.matrix("need", &result.need, Basis::Need)?;
    writer.matrix("upper", &result.upper, Basis::Upper)?;
    writer.matrix("shortage", &result.shortage, Basis::Need)?;
    writer.matrix("excess", &result.excess, Basis::Upper)?;
    writer.breakdown(ROLE_DIMENSION, &output.by_role)?;
    writer.breakdown(EMPLOYMENT_DIMENSION, &output.by_employment)?;

    writer.json(
        CONSISTENCY_REPORT_FILE,
        &ConsistencyArtifact {
            scenario: &output.scenario,
            passed: output.consistent(),
            reports: &output.consistency,
        },
    )?;
    writer.json(
        GUARD_REPORT_FILE,
        &GuardReportArtifact {
            scenario: &output.scenario,
            dropped_records: staffing.dropped_records,
            non_work_counts: &staffing.non_work_counts,
            report: &output.report,
        },
    )?;

    info!(
        scenario = %output.scenario,
        dir = %writer.dir.display(),
        files = writer.written.len(),
        "Wrote snapshot artifacts"
    );
    Ok(writer.written)
}

/// Builds the sidecar for one matrix.
fn metadata(name: &str, matrix: &SlotMatrix, output: &PipelineOutput, basis: Basis) -> SnapshotMetadata {
    let config = &output.config;
    let (statistic_method, adjustment_factor) = match basis {
        Basis::Need => (config.need.statistic, config.need.adjustment_factor),
        Basis::Upper => (config.upper.statistic, config.upper.adjustment_factor),
    };

    let columns = matrix.columns();
    let date_range = match (columns.first(), columns.last()) {
        (Some(start), Some(end)) => Some(DateRange {
            start: *start,
            end: *end,
        }),
        _ => None,
    };
    let holidays_used = date_range
        .map(|range| {
            config
                .need
                .holidays
                .range(range.start..=range.end)
                .copied()
                .collect()
        })
        .unwrap_or_default();

    SnapshotMetadata {
        matrix: name.to_string(),
        scenario: output.scenario.clone(),
        slot_minutes: config.slots.slot_minutes,
        extended: config.slots.extended,
        statistic_method,
        outlier_removal: config.need.outlier_removal,
        adjustment_factor,
        holidays_used,
        date_range,
        mode: config.need.mode,
    }
}

/// Makes a dimension value safe to use in a file name.
fn file_stem_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Hex encoding of the raw value, used to tell apart values that sanitise alike.
fn value_suffix(value: &str) -> String {
    value.bytes().map(|b| format!("{:02x}", b)).collect()
}

struct ArtifactWriter<'a> {
    dir: PathBuf,
    output: &'a PipelineOutput,
    names: BTreeSet<String>,
    written: Vec<PathBuf>,
}

impl ArtifactWriter<'_> {
    fn matrix(&mut self, name: &str, matrix: &SlotMatrix, basis: Basis) -> EngineResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(EngineError::ArtifactWrite {
                path: self.dir.join(format!("{}.json", name)).display().to_string(),
                message: format!("matrix name '{}' is already taken", name),
            });
        }
        self.json(&format!("{}.json", name), matrix)?;
        let meta = metadata(name, matrix, self.output, basis);
        self.json(&format!("{}.meta.json", name), &meta)
    }

    fn family(
        &mut self,
        measure: &str,
        dimension: &str,
        matrices: &BTreeMap<String, SlotMatrix>,
        basis: Basis,
    ) -> EngineResult<()> {
        for (value, matrix) in matrices {
            let mut name = format!("{}_{}_{}", measure, dimension, file_stem_part(value));
            if self.names.contains(&name) {
                name = format!("{}_{}", name, value_suffix(value));
            }
            self.matrix(&name, matrix, basis)?;
        }
        Ok(())
    }

    fn breakdown(&mut self, dimension: &str, breakdown: &DimensionBreakdown) -> EngineResult<()> {
        self.family("shortage", dimension, &breakdown.shortage, Basis::Need)?;
        self.family("excess", dimension, &breakdown.excess, Basis::Upper)?;
        self.family("need", dimension, &breakdown.need, Basis::Need)
    }

    fn json<T: Serialize>(&mut self, file_name: &str, value: &T) -> EngineResult<()> {
        let path = self.dir.join(file_name);
        let path_str = path.display().to_string();

        let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| EngineError::ArtifactWrite {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        bytes.push(b'\n');

        fs::write(&path, bytes).map_err(|e| EngineError::ArtifactWrite {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        debug!(path = %path_str, "Wrote artifact");
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{PresenceRecord, WorkStatus};
    use crate::pipeline::{RunContext, run_pipeline};
    use std::sync::Arc;

    fn record(staff: &str, day: u32, slot: &str, role: &str) -> PresenceRecord {
        PresenceRecord {
            staff_id: staff.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap(),
            slot: slot.to_string(),
            role: role.to_string(),
            employment: "full_time".to_string(),
            status: WorkStatus::Work,
        }
    }

    fn output() -> PipelineOutput {
        let records = vec![
            record("a", 1, "09:00", "nurse"),
            record("b", 1, "09:00", "care aide"),
            record("a", 2, "09:00", "nurse"),
        ];
        let mut config = EngineConfig::default();
        config.slots.slot_minutes = 60;
        config
            .need
            .holidays
            .insert(NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        config
            .need
            .holidays
            .insert(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap());
        let context = RunContext::new("median", Arc::new(records), config).unwrap();
        run_pipeline(&context).unwrap()
    }

    #[test]
    fn test_writes_matrices_with_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_artifacts(dir.path(), &output()).unwrap();

        let scenario_dir = dir.path().join("median");
        for name in [
            "staffing_overall",
            "staffing_role_nurse",
            "staffing_role_care_aide",
            "need",
            "upper",
            "shortage",
            "excess",
            "shortage_role_nurse",
            "shortage_employment_full_time",
        ] {
            assert!(scenario_dir.join(format!("{}.json", name)).exists(), "{}", name);
            assert!(scenario_dir.join(format!("{}.meta.json", name)).exists(), "{}", name);
        }
        assert!(scenario_dir.join(CONSISTENCY_REPORT_FILE).exists());
        assert!(scenario_dir.join(GUARD_REPORT_FILE).exists());
        assert!(written.iter().all(|p| p.starts_with(&scenario_dir)));
    }

    #[test]
    fn test_matrix_file_is_columnar() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), &output()).unwrap();

        let raw = fs::read_to_string(dir.path().join("median/need.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["index"][9], "09:00");
        assert_eq!(value["columns"][0], "2025-04-01");
        assert_eq!(value["data"].as_array().unwrap().len(), 24);
    }

    #[test]
    fn test_sidecar_carries_run_settings() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), &output()).unwrap();

        let raw = fs::read_to_string(dir.path().join("median/need.meta.json")).unwrap();
        let meta: SnapshotMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta.slot_minutes, 60);
        assert_eq!(meta.statistic_method, Statistic::Median);
        assert_eq!(meta.mode, NeedMode::SinglePeriod);
        assert_eq!(
            meta.holidays_used,
            vec![NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()]
        );
        assert_eq!(
            meta.date_range.map(|r| r.end),
            NaiveDate::from_ymd_opt(2025, 4, 2)
        );

        let raw = fs::read_to_string(dir.path().join("median/upper.meta.json")).unwrap();
        let meta: SnapshotMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta.statistic_method, Statistic::Percentile(90.0));
    }

    #[test]
    fn test_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), &output()).unwrap();

        let raw = fs::read_to_string(dir.path().join("median").join(CONSISTENCY_REPORT_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["reports"].as_array().unwrap().len(), 6);

        let raw = fs::read_to_string(dir.path().join("median").join(GUARD_REPORT_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["scenario"], "median");
        assert!(value["warnings"].is_array());
    }

    #[test]
    fn test_artifacts_are_byte_identical_across_runs() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let a = write_artifacts(first.path(), &output()).unwrap();
        let b = write_artifacts(second.path(), &output()).unwrap();

        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(&b) {
            assert_eq!(left.file_name(), right.file_name());
            assert_eq!(fs::read(left).unwrap(), fs::read(right).unwrap());
        }
    }

    #[test]
    fn test_values_that_sanitise_alike_get_separate_files() {
        let records = vec![
            record("a", 1, "09:00", "care aide"),
            record("b", 1, "09:00", "care_aide"),
            record("c", 1, "10:00", "care_aide"),
        ];
        let mut config = EngineConfig::default();
        config.slots.slot_minutes = 60;
        let context = RunContext::new("collide", Arc::new(records), config).unwrap();
        let output = run_pipeline(&context).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = write_artifacts(dir.path(), &output).unwrap();

        let distinct: BTreeSet<&PathBuf> = written.iter().collect();
        assert_eq!(distinct.len(), written.len());

        let scenario_dir = dir.path().join("collide");
        let first = scenario_dir.join("staffing_role_care_aide.json");
        let second = scenario_dir.join(format!(
            "staffing_role_care_aide_{}.json",
            value_suffix("care_aide")
        ));
        let total = |path: &PathBuf| -> f64 {
            let raw = fs::read_to_string(path).unwrap();
            let matrix: SlotMatrix = serde_json::from_str(&raw).unwrap();
            matrix.total()
        };
        assert_eq!(total(&first), 1.0);
        assert_eq!(total(&second), 2.0);
    }

    #[test]
    fn test_scenario_name_cannot_leave_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let mut escaped = output();
        escaped.scenario = "../escaped".to_string();

        let result = write_artifacts(&root, &escaped);

        assert!(matches!(result, Err(EngineError::ArtifactWrite { .. })));
        assert!(!dir.path().join("escaped").exists());
    }

    #[test]
    fn test_unwritable_root_is_artifact_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = write_artifacts(file.path(), &output());
        assert!(matches!(result, Err(EngineError::ArtifactWrite { .. })));
    }
}
