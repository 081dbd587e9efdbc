//! Analyzer metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use vscope_models::StageName;

/// Metric name constants.
pub mod names {
    /// Finished runs by outcome (`ok`, `degraded`, `input_error`, `fatal`).
    pub const RUNS_TOTAL: &str = "vscope_runs_total";

    /// Stages that fell back to placeholder data, by stage.
    pub const STAGE_DEGRADED_TOTAL: &str = "vscope_stage_degraded_total";

    /// Synthesis responses that could not be parsed.
    pub const SYNTHESIS_FALLBACK_TOTAL: &str = "vscope_synthesis_fallback_total";

    /// Store writes that failed.
    pub const PERSISTENCE_FAILURES_TOTAL: &str = "vscope_persistence_failures_total";

    /// Wall-clock duration of a run.
    pub const RUN_DURATION_SECONDS: &str = "vscope_run_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_run(outcome: &'static str, duration: Duration) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, "outcome" => outcome).record(duration.as_secs_f64());
}

pub fn record_stage_degraded(stage: StageName) {
    counter!(names::STAGE_DEGRADED_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_synthesis_fallback() {
    counter!(names::SYNTHESIS_FALLBACK_TOTAL).increment(1);
}

pub fn record_persistence_failure() {
    counter!(names::PERSISTENCE_FAILURES_TOTAL).increment(1);
}
