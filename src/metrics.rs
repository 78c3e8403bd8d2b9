use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

pub const ENV_METRICS_ADDR: &str = "RADAR_METRICS_ADDR";

/// One-time metrics registration (so series show up on the scrape endpoint).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "radar_records_fetched_total",
            "Normalized records returned by sources."
        );
        describe_counter!(
            "radar_source_errors_total",
            "Source fetches that failed or timed out."
        );
        describe_counter!(
            "radar_malformed_records_total",
            "Upstream items skipped during normalization."
        );
        describe_counter!(
            "radar_dedup_dropped_total",
            "Candidates dropped by history or link dedup."
        );
        describe_counter!("radar_selected_total", "Records selected for delivery.");
        describe_counter!("radar_delivery_attempts_total", "Sink delivery attempts.");
        describe_counter!(
            "radar_delivery_failures_total",
            "Runs whose delivery failed after retry."
        );
        describe_counter!(
            "radar_history_save_failures_total",
            "Runs whose history could not be persisted."
        );
        describe_counter!("radar_runs_total", "Pipeline runs by final status.");
        describe_histogram!("radar_fetch_ms", "Source fetch time in milliseconds.");
        describe_gauge!("radar_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener when
/// `RADAR_METRICS_ADDR` is set. Must be called inside a tokio runtime.
pub fn install_exporter_from_env() -> anyhow::Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {ENV_METRICS_ADDR} `{raw}`: {e}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter: {e}"))?;
    ensure_described();
    Ok(Some(addr))
}
