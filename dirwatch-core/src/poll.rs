//! Drives the pipeline: once, or repeatedly on a fixed interval, always under
//! the single-instance guard.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::ingest::{CycleReport, Pipeline};
use crate::lock::InstanceGuard;

/// What a run did, for exit-code mapping and reporting.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub cycles: usize,
    pub last_report: Option<CycleReport>,
    /// Another instance held the lock; nothing was scanned.
    pub skipped: bool,
}

fn acquire(config: &WatchConfig) -> Result<Option<InstanceGuard>, WatchError> {
    match InstanceGuard::acquire(&config.lock_path) {
        Ok(guard) => Ok(Some(guard)),
        Err(WatchError::AlreadyRunning(path)) => {
            warn!(lock = %path.display(), "Another instance is already running; exiting");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Runs exactly one cycle.
pub async fn run_once(config: &WatchConfig, pipeline: &mut Pipeline<'_>) -> Result<RunSummary, WatchError> {
    let Some(_guard) = acquire(config)? else {
        return Ok(RunSummary {
            skipped: true,
            ..RunSummary::default()
        });
    };
    let report = pipeline.run_cycle(config).await?;
    Ok(RunSummary {
        cycles: 1,
        last_report: Some(report),
        skipped: false,
    })
}

/// Runs cycles every `interval` until the lock file disappears or `shutdown`
/// resolves. Shutdown is only observed between cycles. A failing cycle ends
/// the loop with its error.
pub async fn run_forever<F>(
    config: &WatchConfig,
    interval: Duration,
    pipeline: &mut Pipeline<'_>,
    shutdown: F,
) -> Result<RunSummary, WatchError>
where
    F: Future<Output = ()>,
{
    let Some(guard) = acquire(config)? else {
        return Ok(RunSummary {
            skipped: true,
            ..RunSummary::default()
        });
    };
    tokio::pin!(shutdown);

    let mut summary = RunSummary::default();
    info!(interval_secs = interval.as_secs_f64(), "[POLL] Starting continuous watch");
    loop {
        if !guard.is_held() {
            info!(lock = %guard.path().display(), "[POLL] Lock file removed; stopping");
            break;
        }

        let report = pipeline.run_cycle(config).await.map_err(|e| {
            error!(error = %e, cycles = summary.cycles, "[POLL] Cycle failed; stopping");
            e
        })?;
        summary.cycles += 1;
        summary.last_report = Some(report);
        debug!(cycle = summary.cycles, "[POLL] Sleeping until next cycle");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("[POLL] Shutdown requested; stopping");
                break;
            }
        }
    }
    Ok(summary)
}

/// Picks one-shot or continuous mode from the configured poll interval.
pub async fn run(config: &WatchConfig, pipeline: &mut Pipeline<'_>) -> Result<RunSummary, WatchError> {
    match config.effective_poll_interval() {
        None => run_once(config, pipeline).await,
        Some(interval) => run_forever(config, interval, pipeline, shutdown_signal()).await,
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
