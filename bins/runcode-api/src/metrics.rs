// Prometheus collectors for grading traffic
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use runcode_common::types::TestResult;

lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "runcode_submissions_total",
        "Submissions graded, by language and backend",
        &["language", "backend"]
    )
    .expect("register runcode_submissions_total");
    pub static ref TEST_CASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "runcode_test_cases_total",
        "Result rows returned, by outcome",
        &["result"]
    )
    .expect("register runcode_test_cases_total");
    pub static ref GRADING_DURATION: HistogramVec = register_histogram_vec!(
        "runcode_grading_duration_seconds",
        "Wall time spent grading one submission",
        &["backend"]
    )
    .expect("register runcode_grading_duration_seconds");
}

pub fn record_results(language: &str, backend: &str, results: &[TestResult]) {
    SUBMISSIONS_TOTAL
        .with_label_values(&[language, backend])
        .inc();

    let passed = results.iter().filter(|r| r.passed).count() as u64;
    TEST_CASES_TOTAL.with_label_values(&["passed"]).inc_by(passed);
    TEST_CASES_TOTAL
        .with_label_values(&["failed"])
        .inc_by(results.len() as u64 - passed);
}

/// Text exposition of every registered collector
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}
