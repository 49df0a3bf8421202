use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use idlewatch::application::config::{AppConfig, DEFAULT_CONFIG_PATH, FileConfigSource};
use idlewatch::application::services::{Calibrator, CpuMonitor, DecisionService, SessionMonitor};
use idlewatch::domain::ports::clock::Clock;
use idlewatch::domain::ports::notifier::ThresholdNotifier;
use idlewatch::domain::ports::shutdown::ShutdownSink;
use idlewatch::infrastructure::clock::SystemClock;
use idlewatch::infrastructure::notifications::{
    CompositeNotifier, LogNotifier, SystemdRestartNotifier,
};
use idlewatch::infrastructure::os::{DryRunShutdown, SystemShutdown};
use idlewatch::infrastructure::persistence::JsonStateStore;
use idlewatch::infrastructure::sensors::{ProcStatCpuSensor, WhoSessionSensor};
use idlewatch::presentation::cli::app::{Cli, Commands};
use idlewatch::presentation::cli::commands::daemon::{
    Daemon, Intervals, log_startup_report, run_daemon, shutdown_signal,
};
use idlewatch::presentation::cli::commands::status::run_status;

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config_path: PathBuf, config: AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let effective = config.effective();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Manual DI: main.rs is the only place that knows concrete types
    let cpu = Arc::new(CpuMonitor::new(
        Arc::new(ProcStatCpuSensor::new()),
        Arc::clone(&clock),
        effective.cpu_retention(),
    ));
    let sessions = Arc::new(SessionMonitor::new(
        Arc::new(WhoSessionSensor::new()),
        Arc::clone(&clock),
        effective.session_retention(),
    ));

    let store = JsonStateStore::new(&config.state_path().to_string_lossy());
    let calibrator = Arc::new(RwLock::new(Calibrator::open(
        Arc::new(store),
        effective.calibration,
        clock.now(),
    )));

    let mut notifiers: Vec<Box<dyn ThresholdNotifier>> = vec![Box::new(LogNotifier::new())];
    if let Some(unit) = config.restart_unit() {
        notifiers.push(Box::new(SystemdRestartNotifier::new(unit)));
    }
    let notifier: Arc<dyn ThresholdNotifier> = Arc::new(CompositeNotifier::new(notifiers));

    let sink: Arc<dyn ShutdownSink> = if dry_run {
        Arc::new(DryRunShutdown::new())
    } else {
        Arc::new(SystemShutdown::new())
    };

    log_startup_report(&effective, &calibrator, clock.now(), dry_run);

    let decision = DecisionService::new(
        Arc::clone(&cpu),
        Arc::clone(&sessions),
        Arc::clone(&calibrator),
        Arc::new(FileConfigSource::new(config_path)),
        sink,
        Arc::clone(&clock),
        effective,
    );

    let intervals = Intervals {
        sampling: config.sampling_interval(),
        evaluation: config.evaluation_interval(),
        calibration_check: config.calibration_check_interval(),
    };

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    run_daemon(
        Daemon {
            cpu,
            sessions,
            calibrator,
            notifier,
            clock,
            decision,
        },
        intervals,
        token,
    )
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    // Without a configuration no threshold or window can be chosen safely
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("Cannot start without a valid config ({})", config_path.display()))?;

    match cli.command {
        Some(Commands::Status { json }) => run_status(&config, &config.state_path(), json)?,
        Some(Commands::Run { dry_run }) => run(config_path, config, dry_run).await?,
        None => run(config_path, config, false).await?,
    }

    Ok(())
}
