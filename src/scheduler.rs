// src/scheduler.rs
use crate::pipeline::Pipeline;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }
}

/// Spawn the periodic runner. The first run starts immediately; a run that
/// overshoots the interval delays the next tick instead of bursting.
/// Runs never overlap: each tick awaits the previous run.
pub fn spawn_scheduler(cfg: SchedulerCfg, pipeline: Arc<Pipeline>) -> JoinHandle<()> {
    tokio::spawn(run_until(cfg, pipeline, std::future::pending()))
}

/// Run on the schedule until `shutdown` resolves (e.g. Ctrl-C). Shutdown is
/// only observed between runs; an in-flight run always completes.
pub async fn run_until<F>(cfg: SchedulerCfg, pipeline: Arc<Pipeline>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_secs = cfg.interval.as_secs(), "scheduler started");
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, scheduler stopped");
                return;
            }
            _ = ticker.tick() => {}
        }
        let report = pipeline.run().await;
        if !report.status.is_success() {
            tracing::warn!(status = report.status.as_str(), "scheduled run did not succeed");
        }
    }
}
