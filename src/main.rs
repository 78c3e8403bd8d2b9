//! AI News Radar: binary entrypoint.
//! Loads config, wires sources and sink, then runs once or on the schedule.

use ai_news_radar::config::{RadarConfig, RunMode};
use ai_news_radar::pipeline::{Pipeline, RunStatus};
use ai_news_radar::scheduler;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_LOG_JSON: &str = "RADAR_LOG_JSON";

/// Compact logs by default, JSON lines with `RADAR_LOG_JSON=1`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_news_radar=info,warn"));

    let json = std::env::var(ENV_LOG_JSON)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Some(addr) = ai_news_radar::metrics::install_exporter_from_env()? {
        tracing::info!(%addr, "prometheus exporter listening");
    }

    let cfg = RadarConfig::load_default()?;
    if cfg.dry_run {
        tracing::info!("running in TEST MODE (no actual push, history untouched)");
    }

    let pipeline = Arc::new(Pipeline::new(
        cfg.pipeline_config(),
        cfg.build_providers()?,
        cfg.build_sink()?,
        cfg.history_store(),
    ));

    match cfg.mode {
        RunMode::Once => {
            let report = pipeline.run().await;
            if report.status == RunStatus::DeliveryFailed {
                anyhow::bail!("radar run ended with status {}", report.status.as_str());
            }
        }
        RunMode::Schedule => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "ctrl-c handler failed, running until killed");
                    std::future::pending::<()>().await;
                }
            };
            scheduler::run_until(cfg.scheduler_config(), pipeline, shutdown).await;
        }
    }
    Ok(())
}
