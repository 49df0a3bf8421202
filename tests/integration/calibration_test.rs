#![allow(clippy::expect_used)]

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use idlewatch::application::services::{Calibrator, CpuMonitor, run_calibration_check};
use idlewatch::domain::entities::{CalibrationOutcome, CalibrationPhase, CpuCounters, CpuSample};
use idlewatch::domain::ports::{
    CalibrationStore, Clock, CollectionError, CpuSensor, NotificationError, ThresholdNotifier,
};
use idlewatch::domain::value_objects::CalibrationTimings;
use idlewatch::infrastructure::clock::ManualClock;
use idlewatch::infrastructure::persistence::JsonStateStore;

fn first_boot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0)
        .single()
        .expect("valid date")
}

struct Offline;

impl CpuSensor for Offline {
    fn read_counters(&self) -> Result<CpuCounters, CollectionError> {
        Err(CollectionError::CpuUnavailable("offline".into()))
    }
}

struct Quiet;

#[async_trait]
impl ThresholdNotifier for Quiet {
    async fn threshold_applied(
        &self,
        _outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

fn state_store(dir: &tempfile::TempDir) -> Arc<JsonStateStore> {
    let path = dir.path().join("state").join("calibration.json");
    Arc::new(JsonStateStore::new(path.to_str().expect("utf-8 path")))
}

fn open(dir: &tempfile::TempDir, now: DateTime<Utc>) -> RwLock<Calibrator> {
    RwLock::new(Calibrator::open(
        state_store(dir),
        CalibrationTimings::default(),
        now,
    ))
}

/// One sample every five minutes from `first_boot` to `until`.
fn flat_history(clock: &Arc<ManualClock>, until: DateTime<Utc>, usage: f64) -> CpuMonitor {
    let cpu = CpuMonitor::new(Arc::new(Offline), clock.clone(), TimeDelta::hours(72));
    let mut at = first_boot();
    while at <= until {
        assert!(cpu.record(CpuSample::new(at, usage)));
        at += TimeDelta::minutes(5);
    }
    cpu
}

#[tokio::test]
async fn calibration_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calibrator = open(&dir, first_boot());
    assert!(state_store(&dir).path().exists());

    let now = first_boot() + TimeDelta::hours(24);
    let clock = Arc::new(ManualClock::new(now));
    let cpu = flat_history(&clock, clock.now(), 2.0);

    let outcome = run_calibration_check(&calibrator, &cpu, &Quiet, now)
        .await
        .expect("initial calibration");
    assert!((outcome.threshold - 5.0).abs() < f64::EPSILON);
    drop(calibrator);

    let reopened = Calibrator::open(
        state_store(&dir),
        CalibrationTimings::default(),
        now + TimeDelta::hours(1),
    );
    assert!(!reopened.is_learning());
    assert_eq!(reopened.phase(), CalibrationPhase::Calibrated);
    assert_eq!(reopened.current_threshold(), Some(5.0));
    assert_eq!(reopened.state().start_time, first_boot());
    assert_eq!(reopened.state().last_calibration_time, Some(now));
    assert_eq!(reopened.next_calibration_at(), now + TimeDelta::days(7));
}

#[test]
fn restart_during_learning_keeps_the_original_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    drop(open(&dir, first_boot()));

    let later = first_boot() + TimeDelta::hours(10);
    let calibrator = Calibrator::open(state_store(&dir), CalibrationTimings::default(), later);
    assert!(calibrator.is_learning());
    assert_eq!(calibrator.state().start_time, first_boot());
    assert_eq!(
        calibrator.learning_time_remaining(later),
        TimeDelta::hours(14)
    );
}

#[tokio::test]
async fn quietest_stable_period_sets_the_threshold() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calibrator = open(&dir, first_boot());

    let now = first_boot() + TimeDelta::hours(24);
    let clock = Arc::new(ManualClock::new(now));
    // Steady 6% for the first twelve hours, steady 1% after.
    let cpu = CpuMonitor::new(Arc::new(Offline), clock.clone(), TimeDelta::hours(72));
    let mut at = first_boot() + TimeDelta::minutes(5);
    while at <= now {
        let usage = if at < first_boot() + TimeDelta::hours(12) {
            6.0
        } else {
            1.0
        };
        assert!(cpu.record(CpuSample::new(at, usage)));
        at += TimeDelta::minutes(5);
    }

    let outcome = run_calibration_check(&calibrator, &cpu, &Quiet, now)
        .await
        .expect("calibrated");
    assert!((outcome.idle_baseline - 1.0).abs() < 1e-9);
    assert!((outcome.threshold - 5.0).abs() < f64::EPSILON);
    assert!((outcome.stability_bound - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn insufficient_history_leaves_disk_state_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calibrator = open(&dir, first_boot());
    let path = state_store(&dir).path().to_path_buf();
    let before = std::fs::read_to_string(&path).expect("state written at first start");

    let now = first_boot() + TimeDelta::hours(24);
    let clock = Arc::new(ManualClock::new(now));
    let cpu = CpuMonitor::new(Arc::new(Offline), clock, TimeDelta::hours(72));
    for minutes in 0..5 {
        assert!(cpu.record(CpuSample::new(
            now - TimeDelta::minutes(10 - minutes),
            2.0
        )));
    }

    assert!(run_calibration_check(&calibrator, &cpu, &Quiet, now).await.is_none());
    assert_eq!(
        std::fs::read_to_string(&path).expect("state still present"),
        before
    );
    assert!(calibrator.read().expect("lock").is_learning());
}

#[test]
fn corrupt_state_file_restarts_learning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = state_store(&dir);
    std::fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
    std::fs::write(store.path(), "{ not json").expect("write");

    let now = first_boot() + TimeDelta::days(3);
    let calibrator = Calibrator::open(store.clone(), CalibrationTimings::default(), now);
    assert!(calibrator.is_learning());
    assert_eq!(calibrator.state().start_time, now);

    let rewritten = store.load().expect("valid json").expect("state present");
    assert!(!rewritten.initial_done);
    assert_eq!(rewritten.start_time, now);
}

#[tokio::test]
async fn noisy_week_keeps_the_previous_threshold() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calibrator = open(&dir, first_boot());

    let day_one = first_boot() + TimeDelta::hours(24);
    let clock = Arc::new(ManualClock::new(day_one));
    let quiet = flat_history(&clock, day_one, 2.0);
    run_calibration_check(&calibrator, &quiet, &Quiet, day_one)
        .await
        .expect("initial calibration");

    // Swings of 0% / 20% never settle under any stability bound.
    let week_later = day_one + TimeDelta::days(7);
    clock.set(week_later);
    let noisy = CpuMonitor::new(Arc::new(Offline), clock.clone(), TimeDelta::hours(72));
    let mut at = week_later - TimeDelta::hours(72) + TimeDelta::minutes(5);
    let mut flip = false;
    while at <= week_later {
        assert!(noisy.record(CpuSample::new(at, if flip { 20.0 } else { 0.0 })));
        flip = !flip;
        at += TimeDelta::minutes(5);
    }

    assert!(
        run_calibration_check(&calibrator, &noisy, &Quiet, week_later)
            .await
            .is_none()
    );

    let reopened = Calibrator::open(state_store(&dir), CalibrationTimings::default(), week_later);
    assert_eq!(reopened.current_threshold(), Some(5.0));
    assert_eq!(reopened.state().last_calibration_time, Some(day_one));
}
