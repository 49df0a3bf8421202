//! Rolling sample buffers fed by the sensors.
//!
//! Each monitor owns its buffer behind its own lock: the sampling task takes
//! the write lock only to append and prune, every other caller reads a copy.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::TimeDelta;

use crate::domain::entities::sample::{CpuSample, SessionSample, Timestamped};
use crate::domain::entities::sample_buffer::SampleBuffer;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::sensor::{CollectionError, CpuSensor, SessionSensor};

/// Gap between the two counter reads that make up one CPU measurement.
pub const DEFAULT_SAMPLE_GAP: Duration = Duration::from_millis(100);

fn read_buffer<S>(lock: &RwLock<SampleBuffer<S>>) -> RwLockReadGuard<'_, SampleBuffer<S>> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_buffer<S>(lock: &RwLock<SampleBuffer<S>>) -> RwLockWriteGuard<'_, SampleBuffer<S>> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn append<S: Timestamped + Clone>(lock: &RwLock<SampleBuffer<S>>, sample: S, metric: &str) -> bool {
    match write_buffer(lock).push(sample) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "{metric} sample at {} dropped: older than newest sample {}",
                e.rejected.to_rfc3339(),
                e.newest.to_rfc3339()
            );
            false
        }
    }
}

/// Rolling history of CPU busy percentage.
pub struct CpuMonitor {
    sensor: Arc<dyn CpuSensor>,
    clock: Arc<dyn Clock>,
    buffer: RwLock<SampleBuffer<CpuSample>>,
    sample_gap: Duration,
}

impl CpuMonitor {
    #[must_use]
    pub fn new(sensor: Arc<dyn CpuSensor>, clock: Arc<dyn Clock>, retention: TimeDelta) -> Self {
        Self {
            sensor,
            clock,
            buffer: RwLock::new(SampleBuffer::new(retention)),
            sample_gap: DEFAULT_SAMPLE_GAP,
        }
    }

    #[must_use]
    pub fn with_sample_gap(mut self, sample_gap: Duration) -> Self {
        self.sample_gap = sample_gap;
        self
    }

    /// Take one measurement and record it.
    ///
    /// Sensor failures are logged and the tick is skipped; the buffer is left as is.
    pub async fn sample(&self) -> Option<CpuSample> {
        let usage = match self.measure().await {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!("CPU sample skipped: {e}");
                return None;
            }
        };
        let sample = CpuSample::new(self.clock.now(), usage);
        tracing::trace!("CPU usage {usage:.2}%");
        self.record(sample).then_some(sample)
    }

    async fn measure(&self) -> Result<f64, CollectionError> {
        let before = self.sensor.read_counters()?;
        tokio::time::sleep(self.sample_gap).await;
        let after = self.sensor.read_counters()?;
        Ok(after.busy_percent_since(&before))
    }

    /// Append an already-taken sample and prune expired history.
    pub fn record(&self, sample: CpuSample) -> bool {
        append(&self.buffer, sample, "CPU")
    }

    /// Most recent usage, `0.0` before the first sample.
    #[must_use]
    pub fn current_usage(&self) -> f64 {
        read_buffer(&self.buffer)
            .latest()
            .map_or(0.0, |s| s.usage_percent)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CpuSample> {
        read_buffer(&self.buffer).snapshot()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read_buffer(&self.buffer).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        read_buffer(&self.buffer).is_empty()
    }
}

/// Rolling history of active sessions.
pub struct SessionMonitor {
    sensor: Arc<dyn SessionSensor>,
    clock: Arc<dyn Clock>,
    buffer: RwLock<SampleBuffer<SessionSample>>,
}

impl SessionMonitor {
    #[must_use]
    pub fn new(
        sensor: Arc<dyn SessionSensor>,
        clock: Arc<dyn Clock>,
        retention: TimeDelta,
    ) -> Self {
        Self {
            sensor,
            clock,
            buffer: RwLock::new(SampleBuffer::new(retention)),
        }
    }

    /// Query the active sessions once and record the result.
    ///
    /// Sensor failures are logged and the tick is skipped; the buffer is left as is.
    pub async fn sample(&self) -> Option<usize> {
        let sessions = match self.sensor.active_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Session sample skipped: {e}");
                return None;
            }
        };
        let sample = SessionSample::new(self.clock.now(), sessions);
        let count = sample.count();
        if count > 0 {
            tracing::trace!("{count} active session(s): {:?}", sample.sessions);
        }
        self.record(sample).then_some(count)
    }

    pub fn record(&self, sample: SessionSample) -> bool {
        append(&self.buffer, sample, "Session")
    }

    /// Most recent session count, `0` before the first sample.
    #[must_use]
    pub fn current_count(&self) -> usize {
        read_buffer(&self.buffer)
            .latest()
            .map_or(0, SessionSample::count)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionSample> {
        read_buffer(&self.buffer).snapshot()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read_buffer(&self.buffer).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        read_buffer(&self.buffer).is_empty()
    }
}
