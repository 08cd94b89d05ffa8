//! The staged shortage pipeline and the concurrent scenario runner.
//!
//! A run executes, in order: staffing matrix construction, need and upper
//! baselines, shortage and excess with guards, then proportional allocation
//! across roles and employment categories. Everything a run needs is carried
//! by an explicit [`RunContext`]; there is no process-wide state.
//!
//! Scenarios (for example the same records under different statistics) are
//! independent. [`ScenarioRunner`] runs them on separate blocking workers,
//! sharing only the read-only records and slot labels.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calculation::{
    NeedBaseline, ShortageResult, StaffingMatrices, TimeLabels, allocate, allocate_matrix,
    build_staffing_matrices, compute_need_baseline, compute_shortage,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    CONSISTENCY_CHECK_FAILED, ConsistencyReport, GuardReport, GuardWarning, PresenceRecord,
    Severity, SlotMatrix,
};

/// Dimension name for the role breakdown.
pub const ROLE_DIMENSION: &str = "role";
/// Dimension name for the employment-category breakdown.
pub const EMPLOYMENT_DIMENSION: &str = "employment";

/// A cancellation flag for one scenario.
///
/// Clones share the flag. Cancelling is checked between stages, so a stage
/// already running finishes before the scenario stops.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Everything one pipeline run reads.
#[derive(Debug, Clone)]
pub struct RunContext {
    scenario: String,
    records: Arc<Vec<PresenceRecord>>,
    labels: Arc<TimeLabels>,
    config: EngineConfig,
    cancel: CancelHandle,
}

impl RunContext {
    /// Validates the scenario name and `config`, and builds the slot labels
    /// the configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the configuration is invalid
    /// or the scenario name is not a plain directory name.
    pub fn new(
        scenario: impl Into<String>,
        records: Arc<Vec<PresenceRecord>>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let scenario = scenario.into();
        validate_scenario_name(&scenario)?;
        config.validate()?;
        let labels = TimeLabels::new(config.slots.slot_minutes, config.slots.extended)?;
        Ok(Self {
            scenario,
            records,
            labels: Arc::new(labels),
            config,
            cancel: CancelHandle::new(),
        })
    }

    /// Reuses an already built label sequence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `labels` was built for a
    /// different grid than the configuration.
    pub fn with_labels(mut self, labels: Arc<TimeLabels>) -> EngineResult<Self> {
        let slots = &self.config.slots;
        if labels.slot_minutes() != slots.slot_minutes || labels.extended() != slots.extended {
            return Err(EngineError::invalid_config(
                "slots",
                format!(
                    "labels built for {} minute slots (extended: {}) do not match the configuration",
                    labels.slot_minutes(),
                    labels.extended()
                ),
            ));
        }
        self.labels = labels;
        Ok(self)
    }

    /// Attaches a cancellation handle.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// The scenario name.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// The configuration for this run.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The slot labels for this run.
    pub fn labels(&self) -> &TimeLabels {
        &self.labels
    }

    fn checkpoint(&self, stage: &str) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            warn!(scenario = %self.scenario, stage, "Scenario cancelled");
            return Err(EngineError::ScenarioCancelled {
                scenario: self.scenario.clone(),
            });
        }
        Ok(())
    }
}

/// Per-value matrices for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DimensionBreakdown {
    /// Allocated shortage per dimension value.
    pub shortage: BTreeMap<String, SlotMatrix>,
    /// Allocated excess per dimension value.
    pub excess: BTreeMap<String, SlotMatrix>,
    /// Allocated need per dimension value.
    pub need: BTreeMap<String, SlotMatrix>,
}

/// The complete result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Scenario name.
    pub scenario: String,
    /// The configuration the run used.
    pub config: EngineConfig,
    /// Staffing matrices as built from the records.
    pub staffing: StaffingMatrices,
    /// Need baseline over every observed date, before alignment.
    pub need: NeedBaseline,
    /// Upper ceiling over every observed date, before alignment.
    pub upper: NeedBaseline,
    /// Aligned need, actual, upper, shortage and excess.
    pub shortage: ShortageResult,
    /// Role breakdown of the aligned matrices.
    pub by_role: DimensionBreakdown,
    /// Employment-category breakdown of the aligned matrices.
    pub by_employment: DimensionBreakdown,
    /// One reconciliation per (measure, dimension).
    pub consistency: Vec<ConsistencyReport>,
    /// Every stage's diagnostics, in stage order.
    pub report: GuardReport,
}

impl PipelineOutput {
    /// Whether every reconciliation passed.
    pub fn consistent(&self) -> bool {
        self.consistency.iter().all(|r| r.passed)
    }

    /// Configured holidays that fall within the output date range.
    pub fn holidays_used(&self) -> BTreeSet<chrono::NaiveDate> {
        let columns = self.shortage.shortage.columns();
        match (columns.first(), columns.last()) {
            (Some(first), Some(last)) => self
                .config
                .need
                .holidays
                .range(*first..=*last)
                .copied()
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// Runs every stage for one scenario.
///
/// # Errors
///
/// Returns [`EngineError::ScenarioCancelled`] if the context's handle is
/// cancelled between stages, [`EngineError::ConsistencyCheckFailed`] for a
/// failed reconciliation in strict mode, and any configuration error a stage
/// raises.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use shortage_engine::config::EngineConfig;
/// use shortage_engine::models::{PresenceRecord, WorkStatus};
/// use shortage_engine::pipeline::{RunContext, run_pipeline};
/// use chrono::NaiveDate;
///
/// let records = vec![PresenceRecord {
///     staff_id: "s-001".to_string(),
///     date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
///     slot: "09:00".to_string(),
///     role: "nurse".to_string(),
///     employment: "full_time".to_string(),
///     status: WorkStatus::Work,
/// }];
///
/// let context = RunContext::new("baseline", Arc::new(records), EngineConfig::default()).unwrap();
/// let output = run_pipeline(&context).unwrap();
/// assert_eq!(output.shortage.shortage.n_cols(), 1);
/// assert!(output.consistent());
/// ```
pub fn run_pipeline(context: &RunContext) -> EngineResult<PipelineOutput> {
    let config = &context.config;
    let slot_hours = context.labels.slot_hours();
    info!(
        scenario = %context.scenario,
        records = context.records.len(),
        slot_minutes = context.labels.slot_minutes(),
        statistic = %config.need.statistic,
        mode = %config.need.mode,
        "Starting pipeline"
    );

    context.checkpoint("staffing")?;
    let staffing = build_staffing_matrices(&context.records, &context.labels);
    let mut report = staffing.report.clone();

    context.checkpoint("need")?;
    let need = compute_need_baseline(&staffing.overall, &config.need)?;
    report.extend(need.report.clone());

    let upper = compute_need_baseline(&staffing.overall, &config.upper_baseline())?;
    for warning in &upper.report.warnings {
        report.push(GuardWarning {
            message: format!("upper ceiling: {}", warning.message),
            ..warning.clone()
        });
    }

    context.checkpoint("shortage")?;
    let shortage = compute_shortage(
        &need.need,
        &staffing.overall,
        &upper.need,
        &config.shortage,
        slot_hours,
    )?;
    report.extend(shortage.report.clone());

    context.checkpoint("allocation")?;
    let need_hours = shortage.need.total() * slot_hours;
    let totals = [
        ("shortage", shortage.shortage_hours),
        ("excess", shortage.excess_hours),
        ("need", need_hours),
    ];

    let mut consistency = Vec::new();
    for (dimension, counts) in [
        (ROLE_DIMENSION, &staffing.role_record_counts),
        (EMPLOYMENT_DIMENSION, &staffing.employment_record_counts),
    ] {
        for (measure, total) in totals {
            let allocation = allocate(measure, dimension, total, counts, &config.consistency)?;
            if !allocation.report.passed {
                report.push(GuardWarning::new(
                    CONSISTENCY_CHECK_FAILED,
                    format!(
                        "{} by {} allocated {} against an overall total of {} (difference {}, tolerance {})",
                        measure,
                        dimension,
                        allocation.report.allocated_sum,
                        allocation.report.overall_total,
                        allocation.report.difference,
                        allocation.report.tolerance
                    ),
                    Severity::High,
                ));
            }
            consistency.push(allocation.report);
        }
    }

    let by_role = breakdown(&shortage, &staffing.role_record_counts);
    let by_employment = breakdown(&shortage, &staffing.employment_record_counts);

    debug!(
        scenario = %context.scenario,
        roles = by_role.shortage.len(),
        employment_categories = by_employment.shortage.len(),
        "Allocated matrices across dimensions"
    );
    info!(
        scenario = %context.scenario,
        columns = shortage.shortage.n_cols(),
        shortage_hours = shortage.shortage_hours,
        excess_hours = shortage.excess_hours,
        need_hours,
        warnings = report.warnings.len(),
        "Pipeline complete"
    );

    Ok(PipelineOutput {
        scenario: context.scenario.clone(),
        config: config.clone(),
        staffing,
        need,
        upper,
        shortage,
        by_role,
        by_employment,
        consistency,
        report,
    })
}

fn breakdown(result: &ShortageResult, counts: &BTreeMap<String, u64>) -> DimensionBreakdown {
    DimensionBreakdown {
        shortage: allocate_matrix(&result.shortage, counts),
        excess: allocate_matrix(&result.excess, counts),
        need: allocate_matrix(&result.need, counts),
    }
}

/// A named configuration to run against the shared records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name; also the artifact directory name.
    pub name: String,
    /// Configuration for this scenario.
    #[serde(default)]
    pub config: EngineConfig,
}

impl Scenario {
    /// Creates a scenario.
    pub fn new(name: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// The result of one scenario in a [`ScenarioRunner`] batch.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub scenario: String,
    /// The pipeline output, or the error that stopped this scenario.
    pub result: EngineResult<PipelineOutput>,
}

/// Runs independent scenarios concurrently over one record set.
///
/// # Example
///
/// ```
/// use shortage_engine::config::{EngineConfig, Statistic};
/// use shortage_engine::pipeline::{Scenario, ScenarioRunner};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut runner = ScenarioRunner::new(Vec::new());
/// let mut p75 = EngineConfig::default();
/// p75.need.statistic = Statistic::Percentile(75.0);
///
/// runner.add(Scenario::new("median", EngineConfig::default())).unwrap();
/// runner.add(Scenario::new("p75", p75)).unwrap();
///
/// let outcomes = runner.run_all().await;
/// assert_eq!(outcomes.len(), 2);
/// assert!(outcomes.iter().all(|o| o.result.is_ok()));
/// # }
/// ```
#[derive(Debug)]
pub struct ScenarioRunner {
    records: Arc<Vec<PresenceRecord>>,
    scenarios: Vec<(Scenario, CancelHandle)>,
}

impl ScenarioRunner {
    /// Creates a runner over `records`.
    pub fn new(records: Vec<PresenceRecord>) -> Self {
        Self {
            records: Arc::new(records),
            scenarios: Vec::new(),
        }
    }

    /// Queues a scenario and returns the handle that cancels it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the name is empty, is not a
    /// plain directory name, or is already queued.
    pub fn add(&mut self, scenario: Scenario) -> EngineResult<CancelHandle> {
        validate_scenario_name(&scenario.name)?;
        if self.scenarios.iter().any(|(s, _)| s.name == scenario.name) {
            return Err(EngineError::invalid_config(
                "scenarios",
                format!("duplicate scenario name '{}'", scenario.name),
            ));
        }
        let cancel = CancelHandle::new();
        self.scenarios.push((scenario, cancel.clone()));
        Ok(cancel)
    }

    /// Number of queued scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Runs every queued scenario and returns outcomes in the order added.
    ///
    /// Each scenario runs on its own blocking worker. A failure or
    /// cancellation only affects that scenario's outcome.
    pub async fn run_all(self) -> Vec<ScenarioOutcome> {
        info!(
            scenarios = self.scenarios.len(),
            records = self.records.len(),
            "Running scenarios"
        );

        let mut labels: BTreeMap<(u32, bool), Arc<TimeLabels>> = BTreeMap::new();
        let mut tasks = Vec::with_capacity(self.scenarios.len());

        for (scenario, cancel) in self.scenarios {
            let context = RunContext::new(scenario.name.clone(), self.records.clone(), scenario.config)
                .and_then(|context| {
                    let slots = &context.config().slots;
                    let key = (slots.slot_minutes, slots.extended);
                    match labels.get(&key) {
                        Some(shared) => context.with_labels(shared.clone()),
                        None => {
                            labels.insert(key, context.labels.clone());
                            Ok(context)
                        }
                    }
                })
                .map(|context| context.with_cancel(cancel));

            let task = tokio::task::spawn_blocking(move || context.and_then(|c| run_pipeline(&c)));
            tasks.push((scenario.name, task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            let result = task.await.unwrap_or_else(|e| {
                Err(EngineError::CalculationError {
                    message: format!("scenario worker failed: {}", e),
                })
            });
            if let Err(error) = &result {
                warn!(scenario = %name, error = %error, "Scenario failed");
            }
            outcomes.push(ScenarioOutcome {
                scenario: name,
                result,
            });
        }
        outcomes
    }
}

/// Scenario names double as artifact directory names.
pub(crate) fn validate_scenario_name(name: &str) -> EngineResult<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !plain {
        return Err(EngineError::invalid_config(
            "scenarios",
            format!(
                "scenario name '{}' must be non-empty and use only letters, digits, '-', '_' or '.'",
                name
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NeedMode, Statistic};
    use crate::models::{EMPTY_INPUT, WorkStatus};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(staff: &str, day: u32, slot: &str, role: &str, employment: &str) -> PresenceRecord {
        PresenceRecord {
            staff_id: staff.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap(),
            slot: slot.to_string(),
            role: role.to_string(),
            employment: employment.to_string(),
            status: WorkStatus::Work,
        }
    }

    /// Four days of hourly records with a thin third day.
    fn sample_records() -> Vec<PresenceRecord> {
        let mut records = Vec::new();
        for day in 1..=4 {
            let staff: &[(&str, &str, &str)] = if day == 3 {
                &[("a", "nurse", "full_time")]
            } else {
                &[
                    ("a", "nurse", "full_time"),
                    ("b", "nurse", "casual"),
                    ("c", "aide", "full_time"),
                ]
            };
            for (id, role, employment) in staff {
                for slot in ["08:00", "09:00", "10:00"] {
                    records.push(record(id, day, slot, role, employment));
                }
            }
        }
        records
    }

    fn hourly() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.slots.slot_minutes = 60;
        config.need.outlier_removal = false;
        config
    }

    fn run(records: Vec<PresenceRecord>, config: EngineConfig) -> PipelineOutput {
        let context = RunContext::new("test", Arc::new(records), config).unwrap();
        run_pipeline(&context).unwrap()
    }

    #[test]
    fn test_pipeline_finds_shortage_on_thin_day() {
        let output = run(sample_records(), hourly());

        // median of [3, 3, 1, 3] is 3; day 3 has 1 present in each of 3 slots
        let shortage = &output.shortage.shortage;
        assert_eq!(shortage.n_cols(), 4);
        assert_eq!(shortage.column_sum(2), 6.0);
        assert_eq!(shortage.column_sum(0), 0.0);
        assert_eq!(output.shortage.shortage_hours, 6.0);
        assert!(output.consistent());
    }

    #[test]
    fn test_role_and_employment_breakdowns_reconcile() {
        let output = run(sample_records(), hourly());

        for breakdown in [&output.by_role, &output.by_employment] {
            let sum: f64 = breakdown.shortage.values().map(SlotMatrix::total).sum();
            assert!((sum - output.shortage.shortage.total()).abs() < 1e-9);
        }

        let role_shortage = output
            .consistency
            .iter()
            .find(|r| r.measure == "shortage" && r.dimension == ROLE_DIMENSION)
            .unwrap();
        assert_eq!(role_shortage.overall_total, Decimal::from(6));
        assert_eq!(role_shortage.allocated_sum, Decimal::from(6));
        assert_eq!(output.consistency.len(), 6);
    }

    #[test]
    fn test_holiday_forces_zero_need_and_shortage() {
        let mut config = hourly();
        config
            .need
            .holidays
            .insert(NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());

        let output = run(sample_records(), config);
        assert_eq!(output.shortage.need.column_sum(2), 0.0);
        assert_eq!(output.shortage.shortage.column_sum(2), 0.0);
        assert_eq!(output.holidays_used().len(), 1);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let first = run(sample_records(), hourly());
        let second = run(sample_records(), hourly());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.shortage.shortage).unwrap(),
            serde_json::to_string(&second.shortage.shortage).unwrap()
        );
    }

    #[test]
    fn test_empty_records_produce_empty_output() {
        let output = run(Vec::new(), hourly());
        assert!(output.shortage.shortage.is_empty());
        assert!(output.report.has(EMPTY_INPUT));
        assert!(output.by_role.shortage.is_empty());
    }

    #[test]
    fn test_strict_mode_accepts_zero_totals_without_work_records() {
        let mut records = sample_records();
        for r in &mut records {
            r.status = WorkStatus::Leave;
        }
        let mut config = hourly();
        config.consistency.strict = true;
        let context = RunContext::new("strict", Arc::new(records), config).unwrap();
        let output = run_pipeline(&context).unwrap();
        assert_eq!(output.shortage.shortage.n_cols(), 4);
        assert!(output.consistent());
    }

    #[test]
    fn test_cancelled_context_stops_before_first_stage() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let context = RunContext::new("cancelled", Arc::new(sample_records()), hourly())
            .unwrap()
            .with_cancel(cancel);

        match run_pipeline(&context) {
            Err(EngineError::ScenarioCancelled { scenario }) => assert_eq!(scenario, "cancelled"),
            other => panic!("Expected ScenarioCancelled, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_config_rejected_by_context() {
        let mut config = hourly();
        config.slots.slot_minutes = 7;
        assert!(matches!(
            RunContext::new("bad", Arc::new(Vec::new()), config),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_context_rejects_path_like_scenario_names() {
        for name in ["../escaped", "a/b", "..", ""] {
            assert!(
                matches!(
                    RunContext::new(name, Arc::new(Vec::new()), hourly()),
                    Err(EngineError::InvalidConfig { .. })
                ),
                "{:?}",
                name
            );
        }
        assert!(RunContext::new("p90.v2", Arc::new(Vec::new()), hourly()).is_ok());
    }

    #[test]
    fn test_with_labels_rejects_other_grid() {
        let context = RunContext::new("grid", Arc::new(Vec::new()), hourly()).unwrap();
        let labels = Arc::new(TimeLabels::new(30, false).unwrap());
        assert!(context.with_labels(labels).is_err());
    }

    #[test]
    fn test_scenario_names_must_be_unique_and_plain() {
        let mut runner = ScenarioRunner::new(Vec::new());
        assert!(runner.add(Scenario::new("median", hourly())).is_ok());
        assert!(runner.add(Scenario::new("median", hourly())).is_err());
        assert!(runner.add(Scenario::new("../escape", hourly())).is_err());
        assert!(runner.add(Scenario::new("", hourly())).is_err());
        assert_eq!(runner.len(), 1);
    }

    #[tokio::test]
    async fn test_runner_isolates_cancelled_scenario() {
        let mut runner = ScenarioRunner::new(sample_records());
        runner.add(Scenario::new("median", hourly())).unwrap();

        let mut monthly = hourly();
        monthly.need.mode = NeedMode::MonthlyPattern;
        monthly.need.statistic = Statistic::Mean;
        let cancel = runner.add(Scenario::new("monthly-mean", monthly)).unwrap();
        cancel.cancel();

        let outcomes = runner.run_all().await;
        assert_eq!(outcomes[0].scenario, "median");
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(EngineError::ScenarioCancelled { .. })
        ));
    }

    #[tokio::test]
    async fn test_runner_matches_sequential_runs() {
        let mut p75 = hourly();
        p75.need.statistic = Statistic::Percentile(75.0);

        let mut runner = ScenarioRunner::new(sample_records());
        runner.add(Scenario::new("median", hourly())).unwrap();
        runner.add(Scenario::new("p75", p75.clone())).unwrap();

        let outcomes = runner.run_all().await;
        let sequential = run(sample_records(), p75);
        let concurrent = outcomes[1].result.as_ref().unwrap();
        assert_eq!(concurrent.shortage, sequential.shortage);
        assert_eq!(concurrent.scenario, "p75");
    }

    #[tokio::test]
    async fn test_runner_reports_invalid_config_per_scenario() {
        let mut bad = hourly();
        bad.need.adjustment_factor = -1.0;

        let mut runner = ScenarioRunner::new(sample_records());
        runner.add(Scenario::new("bad", bad)).unwrap();
        runner.add(Scenario::new("good", hourly())).unwrap();

        let outcomes = runner.run_all().await;
        assert!(matches!(
            outcomes[0].result,
            Err(EngineError::InvalidConfig { .. })
        ));
        assert!(outcomes[1].result.is_ok());
    }
}
