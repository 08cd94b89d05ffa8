//! Performance benchmarks for the shortage engine.
//!
//! Covers the synchronous pipeline at increasing history lengths and the
//! `/analyze` endpoint with one and several concurrent scenarios.
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use shortage_engine::api::{AppState, create_router};
use shortage_engine::config::{ConfigLoader, EngineConfig, NeedMode};
use shortage_engine::models::{PresenceRecord, WorkStatus};
use shortage_engine::pipeline::{RunContext, run_pipeline};

use axum::{body::Body, http::Request};
use tower::ServiceExt;

const ROLES: [&str; 4] = ["nurse", "aide", "cook", "cleaner"];
const EMPLOYMENT: [&str; 3] = ["full_time", "part_time", "casual"];

/// Creates a test state with loaded configuration.
fn create_test_state() -> AppState {
    let config = ConfigLoader::load("./config/default.yaml").expect("Failed to load config");
    AppState::new(config)
}

/// Creates a day-shift roster of `staff` people over `days` days on a 30-minute grid.
fn create_records(days: u64, staff: usize) -> Vec<PresenceRecord> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut records = Vec::new();

    for day in 0..days {
        let date = start.checked_add_days(Days::new(day)).unwrap();
        // thin out staffing on a rolling pattern so shortage is non-trivial
        let present = staff - (day as usize % 3);
        for person in 0..present {
            for half_hour in 16..34 {
                records.push(PresenceRecord {
                    staff_id: format!("s{:03}", person),
                    date,
                    slot: format!("{:02}:{:02}", half_hour / 2, (half_hour % 2) * 30),
                    role: ROLES[person % ROLES.len()].to_string(),
                    employment: EMPLOYMENT[person % EMPLOYMENT.len()].to_string(),
                    status: if (person + day as usize) % 11 == 0 {
                        WorkStatus::Leave
                    } else {
                        WorkStatus::Work
                    },
                });
            }
        }
    }

    records
}

fn analyze_body(days: u64, staff: usize, scenarios: &[&str]) -> String {
    let scenarios: Vec<serde_json::Value> = scenarios
        .iter()
        .map(|statistic| {
            serde_json::json!({
                "name": statistic,
                "config": {"need": {"statistic": statistic}}
            })
        })
        .collect();

    serde_json::json!({
        "records": create_records(days, staff),
        "scenarios": scenarios
    })
    .to_string()
}

/// Benchmark: full pipeline over a growing history.
fn bench_pipeline_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for days in [7u64, 30, 90].iter() {
        let records = Arc::new(create_records(*days, 12));
        let context = RunContext::new("bench", records.clone(), EngineConfig::default()).unwrap();

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("days", days), days, |b, _| {
            b.iter(|| black_box(run_pipeline(black_box(&context)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark: monthly-pattern need over a quarter.
fn bench_monthly_pattern(c: &mut Criterion) {
    let mut config = EngineConfig::default();
    config.need.mode = NeedMode::MonthlyPattern;
    let context = RunContext::new("monthly", Arc::new(create_records(90, 12)), config).unwrap();

    c.bench_function("monthly_pattern_90_days", |b| {
        b.iter(|| black_box(run_pipeline(black_box(&context)).unwrap()))
    });
}

/// Benchmark: `/analyze` with one and with three concurrent scenarios.
fn bench_analyze_endpoint(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let state = create_test_state();

    let mut group = c.benchmark_group("analyze");

    for scenarios in [vec!["median"], vec!["median", "mean", "p90"]] {
        let router = create_router(state.clone());
        let body = analyze_body(30, 12, &scenarios);

        group.throughput(Throughput::Elements(scenarios.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("scenarios", scenarios.len()),
            &scenarios.len(),
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    let router = router.clone();
                    let response = router
                        .oneshot(
                            Request::builder()
                                .method("POST")
                                .uri("/analyze")
                                .header("Content-Type", "application/json")
                                .body(Body::from(body.clone()))
                                .unwrap(),
                        )
                        .await
                        .unwrap();
                    black_box(response)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline_scaling,
    bench_monthly_pattern,
    bench_analyze_endpoint,
);
criterion_main!(benches);
