use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

use super::sample::Timestamped;

/// Rolling, time-ordered window of samples for one metric.
///
/// Timestamps are non-decreasing and nothing older than the retention
/// horizon (relative to the newest sample) is kept. Pruning is a prefix
/// trim, so its cost is proportional to the number of evicted entries.
#[derive(Debug, Clone)]
pub struct SampleBuffer<S> {
    samples: VecDeque<S>,
    retention: TimeDelta,
}

/// A sample was rejected because it predates the newest retained one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfOrder {
    pub newest: DateTime<Utc>,
    pub rejected: DateTime<Utc>,
}

impl<S: Timestamped + Clone> SampleBuffer<S> {
    #[must_use]
    pub const fn new(retention: TimeDelta) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
        }
    }

    #[must_use]
    pub const fn retention(&self) -> TimeDelta {
        self.retention
    }

    /// Append `sample`, then evict everything at or before `sample.timestamp() - retention`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrder` (and leaves the buffer untouched) if the sample is
    /// older than the newest retained one, e.g. after a wall-clock step back.
    pub fn push(&mut self, sample: S) -> Result<(), OutOfOrder> {
        let now = sample.timestamp();
        if let Some(newest) = self.samples.back().map(Timestamped::timestamp) {
            if now < newest {
                return Err(OutOfOrder {
                    newest,
                    rejected: now,
                });
            }
        }
        self.samples.push_back(sample);
        self.prune(now);
        Ok(())
    }

    /// Evict every sample whose timestamp is not strictly after `now - retention`.
    ///
    /// A horizon before the earliest representable time evicts nothing.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return;
        };
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp() <= cutoff)
        {
            self.samples.pop_front();
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<&S> {
        self.samples.back()
    }

    /// Owned copy of all retained samples, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<S> {
        self.samples.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::sample::CpuSample;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid date")
            + TimeDelta::minutes(minutes)
    }

    #[test]
    fn empty_buffer_has_no_latest() {
        let buffer: SampleBuffer<CpuSample> = SampleBuffer::new(TimeDelta::hours(2));
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn push_keeps_samples_within_retention() {
        let mut buffer = SampleBuffer::new(TimeDelta::minutes(10));
        for minute in 0..30 {
            buffer
                .push(CpuSample::new(at(minute), 1.0))
                .expect("in order");
        }
        let now = at(29);
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert!(snapshot.iter().all(|s| s.timestamp > now - TimeDelta::minutes(10)));
        assert!(snapshot.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn sample_exactly_at_horizon_is_evicted() {
        let mut buffer = SampleBuffer::new(TimeDelta::minutes(5));
        buffer.push(CpuSample::new(at(0), 1.0)).expect("in order");
        buffer.push(CpuSample::new(at(5), 2.0)).expect("in order");
        assert_eq!(buffer.len(), 1);
        assert!((buffer.latest().expect("latest").usage_percent - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retention_beyond_representable_time_keeps_everything() {
        let mut buffer = SampleBuffer::new(TimeDelta::MAX);
        buffer.push(CpuSample::new(at(0), 1.0)).expect("in order");
        buffer.push(CpuSample::new(at(60), 2.0)).expect("in order");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn equal_timestamps_are_accepted() {
        let mut buffer = SampleBuffer::new(TimeDelta::minutes(5));
        buffer.push(CpuSample::new(at(1), 1.0)).expect("first");
        buffer.push(CpuSample::new(at(1), 2.0)).expect("same instant");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn out_of_order_sample_is_rejected_without_mutation() {
        let mut buffer = SampleBuffer::new(TimeDelta::minutes(5));
        buffer.push(CpuSample::new(at(3), 1.0)).expect("first");
        let err = buffer
            .push(CpuSample::new(at(2), 9.0))
            .expect_err("older sample");
        assert_eq!(err.newest, at(3));
        assert_eq!(err.rejected, at(2));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn snapshot_is_independent_of_buffer() {
        let mut buffer = SampleBuffer::new(TimeDelta::minutes(5));
        buffer.push(CpuSample::new(at(0), 1.0)).expect("first");
        let snapshot = buffer.snapshot();
        buffer.push(CpuSample::new(at(1), 2.0)).expect("second");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 2);
    }
}
