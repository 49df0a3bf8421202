#![allow(clippy::expect_used)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use idlewatch::application::services::{
    Calibrator, CpuMonitor, DecisionService, SessionMonitor, SharedCalibrator, TickOutcome,
    run_calibration_check,
};
use idlewatch::domain::entities::{CalibrationOutcome, CpuCounters};
use idlewatch::domain::ports::{
    Clock, CollectionError, ConfigError, ConfigSource, CpuSensor, NotificationError,
    SessionSensor, ShutdownError, ShutdownSink, ThresholdNotifier,
};
use idlewatch::domain::rules::IdleVerdict;
use idlewatch::domain::value_objects::{CalibrationTimings, CpuMode, EffectiveConfig};
use idlewatch::infrastructure::clock::ManualClock;
use idlewatch::infrastructure::os::DryRunShutdown;
use idlewatch::infrastructure::persistence::InMemoryStore;

fn boot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 8, 0, 0)
        .single()
        .expect("valid date")
}

/// Counters that advance by `usage` busy ticks out of 100 on every read.
struct DialCpu {
    usage: Mutex<u64>,
    counters: Mutex<CpuCounters>,
}

impl DialCpu {
    fn new(usage: u64) -> Self {
        Self {
            usage: Mutex::new(usage),
            counters: Mutex::new(CpuCounters::default()),
        }
    }

    fn set(&self, usage: u64) {
        *self.usage.lock().expect("lock") = usage;
    }
}

impl CpuSensor for DialCpu {
    fn read_counters(&self) -> Result<CpuCounters, CollectionError> {
        let usage = *self.usage.lock().expect("lock");
        let mut counters = self.counters.lock().expect("lock");
        counters.busy_ticks += usage;
        counters.idle_ticks += 100 - usage;
        Ok(*counters)
    }
}

#[derive(Default)]
struct Logins(Mutex<BTreeSet<String>>);

impl Logins {
    fn login(&self, user: &str) {
        self.0.lock().expect("lock").insert(user.to_string());
    }
}

#[async_trait]
impl SessionSensor for Logins {
    async fn active_sessions(&self) -> Result<BTreeSet<String>, CollectionError> {
        Ok(self.0.lock().expect("lock").clone())
    }
}

struct FixedConfig(EffectiveConfig);

impl ConfigSource for FixedConfig {
    fn load(&self) -> Result<EffectiveConfig, ConfigError> {
        Ok(self.0)
    }
}

#[derive(Default)]
struct CountingSink(Mutex<Vec<String>>);

impl CountingSink {
    fn calls(&self) -> usize {
        self.0.lock().expect("lock").len()
    }
}

#[async_trait]
impl ShutdownSink for CountingSink {
    async fn shutdown(&self, reason: &str) -> Result<(), ShutdownError> {
        self.0.lock().expect("lock").push(reason.to_string());
        Ok(())
    }
}

struct Silent;

#[async_trait]
impl ThresholdNotifier for Silent {
    async fn threshold_applied(
        &self,
        _outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// A whole daemon wired to fakes, driven minute by minute.
struct Vm {
    clock: Arc<ManualClock>,
    cpu_dial: Arc<DialCpu>,
    logins: Arc<Logins>,
    cpu: Arc<CpuMonitor>,
    sessions: Arc<SessionMonitor>,
    calibrator: SharedCalibrator,
    sink: Arc<CountingSink>,
    decision: DecisionService,
}

impl Vm {
    fn boot(config: EffectiveConfig, usage: u64) -> Self {
        Self::boot_with_sink(config, usage, Arc::new(CountingSink::default()), None)
    }

    fn boot_with_sink(
        config: EffectiveConfig,
        usage: u64,
        sink: Arc<CountingSink>,
        other_sink: Option<Arc<dyn ShutdownSink>>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(boot()));
        let cpu_dial = Arc::new(DialCpu::new(usage));
        let logins = Arc::new(Logins::default());
        let cpu = Arc::new(
            CpuMonitor::new(cpu_dial.clone(), clock.clone(), config.cpu_retention())
                .with_sample_gap(Duration::ZERO),
        );
        let sessions = Arc::new(SessionMonitor::new(
            logins.clone(),
            clock.clone(),
            config.session_retention(),
        ));
        let sink_port: Arc<dyn ShutdownSink> = match other_sink {
            Some(other) => other,
            None => sink.clone(),
        };
        let calibrator = Arc::new(RwLock::new(Calibrator::open(
            Arc::new(InMemoryStore::new()),
            config.calibration,
            boot(),
        )));
        let decision = DecisionService::new(
            cpu.clone(),
            sessions.clone(),
            calibrator.clone(),
            Arc::new(FixedConfig(config)),
            sink_port,
            clock.clone(),
            config,
        );
        Self {
            clock,
            cpu_dial,
            logins,
            cpu,
            sessions,
            calibrator,
            sink,
            decision,
        }
    }

    /// One CPU and one session sample per minute, through the sensors.
    async fn run_for(&self, minutes: i64) {
        for _ in 0..minutes {
            self.clock.advance(TimeDelta::minutes(1));
            assert!(self.cpu.sample().await.is_some());
            assert!(self.sessions.sample().await.is_some());
        }
    }
}

fn manual(threshold: f64) -> EffectiveConfig {
    EffectiveConfig {
        cpu_threshold: threshold,
        mode: CpuMode::Manual,
        ..EffectiveConfig::default()
    }
}

#[tokio::test]
async fn idle_vm_is_shut_down_once_per_qualifying_tick() {
    let mut vm = Vm::boot(manual(25.0), 10);
    vm.run_for(60).await;

    let outcome = vm.decision.run_once().await;
    assert_eq!(
        outcome,
        TickOutcome::ShutdownRequested {
            threshold: 25.0,
            delivered: true
        }
    );
    assert_eq!(vm.sink.calls(), 1);

    vm.run_for(1).await;
    assert!(vm.decision.run_once().await.shutdown_requested());
    assert_eq!(vm.sink.calls(), 2);
    assert_eq!(
        vm.sink.0.lock().expect("lock")[0],
        "VM idle: CPU below 25% for 60 min and no active sessions for 60 min"
    );
}

#[tokio::test]
async fn a_login_keeps_the_vm_running() {
    let mut vm = Vm::boot(manual(25.0), 10);
    vm.run_for(60).await;
    vm.logins.login("alice");
    vm.run_for(1).await;

    match vm.decision.run_once().await {
        TickOutcome::NotIdle { cpu, sessions, .. } => {
            assert!(cpu.is_idle());
            assert!(matches!(sessions, IdleVerdict::Busy { .. }));
        }
        other => panic!("expected NotIdle, got {other:?}"),
    }
    assert_eq!(vm.sink.calls(), 0);
}

#[tokio::test]
async fn one_busy_minute_blocks_shutdown_until_it_leaves_the_window() {
    let mut vm = Vm::boot(manual(25.0), 10);
    vm.run_for(30).await;
    vm.cpu_dial.set(80);
    vm.run_for(1).await;
    vm.cpu_dial.set(10);
    vm.run_for(29).await;

    assert!(!vm.decision.run_once().await.shutdown_requested());

    vm.run_for(31).await;
    assert!(vm.decision.run_once().await.shutdown_requested());
    assert_eq!(vm.sink.calls(), 1);
}

#[tokio::test]
async fn learning_vm_is_never_shut_down() {
    let mut vm = Vm::boot(EffectiveConfig::default(), 0);
    vm.run_for(120).await;

    match vm.decision.run_once().await {
        TickOutcome::Learning { remaining } => {
            assert_eq!(remaining, TimeDelta::hours(22));
        }
        other => panic!("expected Learning, got {other:?}"),
    }
    assert_eq!(vm.sink.calls(), 0);
}

#[tokio::test]
async fn calibrated_threshold_takes_effect_on_next_tick() {
    let config = EffectiveConfig {
        calibration: CalibrationTimings {
            initial_lookback: TimeDelta::hours(2),
            ..CalibrationTimings::default()
        },
        ..EffectiveConfig::default()
    };
    let mut vm = Vm::boot(config, 1);
    vm.run_for(120).await;

    let outcome = run_calibration_check(&vm.calibrator, &vm.cpu, &Silent, vm.clock.now())
        .await
        .expect("calibration due and data sufficient");
    assert!((outcome.threshold - 5.0).abs() < f64::EPSILON);

    assert_eq!(
        vm.decision.run_once().await,
        TickOutcome::ShutdownRequested {
            threshold: 5.0,
            delivered: true
        }
    );
}

#[tokio::test]
async fn dry_run_reports_delivery_without_powering_off() {
    let counting = Arc::new(CountingSink::default());
    let mut vm = Vm::boot_with_sink(
        manual(25.0),
        10,
        counting,
        Some(Arc::new(DryRunShutdown::new())),
    );
    vm.run_for(60).await;

    assert_eq!(
        vm.decision.run_once().await,
        TickOutcome::ShutdownRequested {
            threshold: 25.0,
            delivered: true
        }
    );
    assert_eq!(vm.sink.calls(), 0);
}
