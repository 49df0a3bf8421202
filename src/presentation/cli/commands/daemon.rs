//! The `run` command: background sampling tasks and the evaluation loop they feed.

use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::format::format_duration;
use crate::application::services::{
    CpuMonitor, DecisionService, SessionMonitor, SharedCalibrator, TickOutcome,
    run_calibration_check,
};
use crate::domain::ports::clock::Clock;
use crate::domain::ports::notifier::ThresholdNotifier;
use crate::domain::value_objects::{CpuMode, EffectiveConfig};

/// Cadence of each periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub sampling: Duration,
    pub evaluation: Duration,
    pub calibration_check: Duration,
}

/// Everything the daemon loops share.
pub struct Daemon {
    pub cpu: Arc<CpuMonitor>,
    pub sessions: Arc<SessionMonitor>,
    pub calibrator: SharedCalibrator,
    pub notifier: Arc<dyn ThresholdNotifier>,
    pub clock: Arc<dyn Clock>,
    pub decision: DecisionService,
}

/// Run `tick` every `period` until `token` is cancelled. The first tick
/// fires at `start`.
async fn every<F, Fut>(start: Instant, period: Duration, token: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = interval.tick() => tick().await,
        }
    }
}

/// Run the sampling, calibration-check and decision loops until `token`
/// is cancelled.
///
/// Each loop observes the token at its tick boundary; in-flight work is
/// not completed after cancellation.
///
/// # Errors
///
/// Returns an error if a background task panicked.
pub async fn run_daemon(
    daemon: Daemon,
    intervals: Intervals,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let Daemon {
        cpu,
        sessions,
        calibrator,
        notifier,
        clock,
        mut decision,
    } = daemon;
    let now = Instant::now();

    let cpu_task = {
        let cpu = Arc::clone(&cpu);
        tokio::spawn(every(now, intervals.sampling, token.clone(), move || {
            let cpu = Arc::clone(&cpu);
            async move {
                cpu.sample().await;
            }
        }))
    };

    let session_task = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(every(now, intervals.sampling, token.clone(), move || {
            let sessions = Arc::clone(&sessions);
            async move {
                sessions.sample().await;
            }
        }))
    };

    let calibration_task = {
        let cpu = Arc::clone(&cpu);
        let calibrator = Arc::clone(&calibrator);
        let notifier = Arc::clone(&notifier);
        let clock = Arc::clone(&clock);
        tokio::spawn(every(now, intervals.calibration_check, token.clone(), move || {
            let cpu = Arc::clone(&cpu);
            let calibrator = Arc::clone(&calibrator);
            let notifier = Arc::clone(&notifier);
            let now = clock.now();
            async move {
                run_calibration_check(&calibrator, &cpu, notifier.as_ref(), now).await;
            }
        }))
    };

    tracing::info!("Entering evaluation loop");
    let mut evaluation = tokio::time::interval_at(now + intervals.evaluation, intervals.evaluation);
    evaluation.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = evaluation.tick() => log_outcome(&decision.run_once().await),
        }
    }

    tracing::info!("Stop requested, waiting for background tasks");
    let (cpu_result, session_result, calibration_result) =
        tokio::join!(cpu_task, session_task, calibration_task);
    cpu_result?;
    session_result?;
    calibration_result?;
    tracing::info!("idlewatch stopped");
    Ok(())
}

fn log_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::NotIdle {
            threshold,
            cpu,
            sessions,
        } => {
            tracing::debug!("Not idle (threshold {threshold:.0}%): cpu {cpu}, sessions {sessions}");
        }
        TickOutcome::ShutdownRequested {
            delivered: false, ..
        } => {
            tracing::warn!("Shutdown not delivered, will retry on next tick");
        }
        TickOutcome::ShutdownRequested { .. } | TickOutcome::Learning { .. } => {}
    }
}

/// Resolve when SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down gracefully"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down gracefully"),
    }
}

/// Log the configuration and the calibration status once at startup.
pub fn log_startup_report(
    config: &EffectiveConfig,
    calibrator: &SharedCalibrator,
    now: DateTime<Utc>,
    dry_run: bool,
) {
    tracing::info!("idlewatch {} starting", env!("CARGO_PKG_VERSION"));
    if dry_run {
        tracing::info!("Dry-run: no shutdown will be performed");
    }
    tracing::info!(
        "CPU window {} min, user window {} min",
        config.cpu_check_minutes,
        config.user_check_minutes
    );

    let calibrator = calibrator.read().unwrap_or_else(PoisonError::into_inner);
    match config.mode {
        CpuMode::Manual => {
            tracing::info!(
                "Mode: manual, cpu_threshold = {:.0}% (set in config)",
                config.cpu_threshold
            );
        }
        CpuMode::Auto => {
            tracing::info!("Mode: auto, cpu_threshold is not set");
            let timings = calibrator.timings();
            match calibrator.current_threshold() {
                None => {
                    tracing::info!(
                        "Learning phase: {} remaining, shutdown evaluation paused",
                        format_duration(calibrator.learning_time_remaining(now))
                    );
                    tracing::info!(
                        "Initial calibration after {} of data",
                        format_duration(timings.initial_lookback)
                    );
                }
                Some(threshold) => {
                    tracing::info!(
                        "Calibrated threshold: {threshold:.0}% (idle baseline {:.2}%)",
                        calibrator.state().idle_baseline
                    );
                    tracing::info!(
                        "Recalibration every {} days using {} of data, next ~{}",
                        timings.recalibration_interval.num_days(),
                        format_duration(timings.recalibration_lookback),
                        calibrator.next_calibration_at().format("%Y-%m-%d")
                    );
                }
            }
        }
    }
}
