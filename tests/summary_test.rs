// Summary engine tests against a scripted meter.
// Tokio time is paused, so the settling interval costs no wall-clock time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use common::{registers, FakeMeter, GRID};
use egauge_api::meter::FetchError;
use egauge_api::services::summary::{Period, SummaryEngine, SummaryReport, Tariff};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

const SETTLE: Duration = Duration::from_secs(1);

fn period() -> Period {
    Period {
        start: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
        end: DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap(),
    }
}

fn engine(meter: Arc<FakeMeter>) -> SummaryEngine {
    let tariff = Tariff {
        rate_per_kwh: 1.99,
        currency: "ZAR".to_string(),
    };
    SummaryEngine::new(meter, GRID, tariff, SETTLE)
}

fn usage(report: SummaryReport) -> egauge_api::services::summary::UsageSummary {
    match report {
        SummaryReport::Usage(usage) => usage,
        SummaryReport::Unavailable { error } => panic!("expected usage, got error: {}", error),
    }
}

#[tokio::test(start_paused = true)]
async fn test_usage_from_two_totals_samples() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[(GRID, 1000.0), ("Geyser", 5.0)])),
        Ok(registers(&[(GRID, 2500.0), ("Geyser", 9.0)])),
    ]));

    let summary = usage(engine(meter.clone()).compute(period()).await);

    assert_eq!(summary.energy_used_kwh, 1.5);
    assert_eq!(summary.cost_estimate.amount, 2.99);
    assert_eq!(summary.cost_estimate.tariff_per_kwh, 1.99);
    assert_eq!(summary.cost_estimate.currency, "ZAR");
    assert_eq!(summary.period, period());
    assert_eq!(meter.totals_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_counter_reset_clamps_to_zero() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[(GRID, 500.0)])),
        Ok(registers(&[(GRID, 300.0)])),
    ]));

    let summary = usage(engine(meter).compute(period()).await);

    assert_eq!(summary.energy_used_kwh, 0.0);
    assert_eq!(summary.cost_estimate.amount, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_register_counts_as_zero_usage_not_error() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[("Geyser", 100.0)])),
        Ok(registers(&[("Geyser", 200.0)])),
    ]));

    let report = engine(meter).compute(period()).await;

    assert!(!report.is_error());
    assert_eq!(usage(report).energy_used_kwh, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_sample_is_an_error_marker() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Err(FetchError::Status(500)),
        Ok(registers(&[(GRID, 2500.0)])),
    ]));

    let report = engine(meter.clone()).compute(period()).await;

    assert_eq!(report, SummaryReport::unavailable());
    // Both samples are still taken; there is no early exit or retry.
    assert_eq!(meter.totals_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_second_sample_is_an_error_marker() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[(GRID, 1000.0)])),
        Err(FetchError::Transport("connection refused".into())),
    ]));

    let report = engine(meter).compute(period()).await;

    assert!(report.is_error());
}

#[tokio::test(start_paused = true)]
async fn test_empty_sample_is_an_error_marker() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[(GRID, 1000.0)])),
        Ok(registers(&[])),
    ]));

    assert!(engine(meter).compute(period()).await.is_error());
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_settling_interval() {
    let meter = Arc::new(FakeMeter::new());
    let started = Instant::now();

    engine(meter).compute(period()).await;

    assert!(started.elapsed() >= SETTLE);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_summaries_do_not_serialize_on_the_wait() {
    let meter = Arc::new(FakeMeter::new());
    let engine = engine(meter.clone());
    let started = Instant::now();

    let (a, b) = tokio::join!(engine.compute(period()), engine.compute(period()));

    assert!(!a.is_error());
    assert!(!b.is_error());
    assert!(started.elapsed() < SETTLE * 2);
    assert_eq!(meter.totals_reads(), 4);
}

#[tokio::test]
async fn test_zero_settle_interval_is_allowed() {
    let meter = Arc::new(FakeMeter::new().with_totals(vec![
        Ok(registers(&[(GRID, 0.0)])),
        Ok(registers(&[(GRID, 120.0)])),
    ]));
    let tariff = Tariff {
        rate_per_kwh: 2.0,
        currency: "EUR".to_string(),
    };
    let engine = SummaryEngine::new(meter, GRID, tariff, Duration::ZERO);

    let summary = usage(engine.compute(period()).await);

    assert_eq!(summary.energy_used_kwh, 0.12);
    assert_eq!(summary.cost_estimate.amount, 0.24);
    assert_eq!(summary.cost_estimate.currency, "EUR");
}
