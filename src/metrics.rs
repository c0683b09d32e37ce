// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions (so series show up on /metrics with help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alerts_triggered_total", "Alerts produced by rule evaluation, by severity.");
        describe_counter!(
            "alert_rule_errors_total",
            "Rule evaluations that failed on data access."
        );
        describe_counter!(
            "alert_delivery_failures_total",
            "Notification or alert-log failures."
        );
        describe_counter!(
            "responses_processed_total",
            "Responses analysed and persisted by the pipeline."
        );
        describe_counter!(
            "responses_failed_total",
            "Responses the pipeline failed to persist."
        );
        describe_gauge!(
            "alert_cycle_last_run_ts",
            "Unix ts when the last alert cycle finished."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Recorder that is not installed globally (tests, embedding).
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// `/metrics` in the Prometheus exposition format plus a `/health` probe.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }
}
