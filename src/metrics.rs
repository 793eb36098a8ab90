use anyhow::anyhow;
use axum::{routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::error::UpstreamError;
use crate::scoring::ScoreSource;

pub const REQUESTS_TOTAL: &str = "score_requests_total";
pub const FALLBACK_TOTAL: &str = "score_llm_fallback_total";
pub const LLM_DURATION_MS: &str = "score_llm_duration_ms";
pub const LLM_TIMEOUT_MS: &str = "score_llm_timeout_ms";

// The recorder is process-global; every app() built in one process shares it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once) and publish the configured timeout.
    pub fn init(timeout_ms: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow!("prometheus: install recorder: {e}"))
            })?
            .clone();

        gauge!(LLM_TIMEOUT_MS).set(timeout_ms as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

pub fn record_request(source: ScoreSource) {
    counter!(REQUESTS_TOTAL, "source" => source.as_str()).increment(1);
}

pub fn record_fallback(err: &UpstreamError) {
    counter!(FALLBACK_TOTAL, "reason" => err.reason()).increment(1);
}

pub fn record_llm_duration(ms: f64) {
    histogram!(LLM_DURATION_MS).record(ms);
}
