use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::entities::sample::{CpuSample, SessionSample, Timestamped};

/// Answer to "has the condition held for the whole window?".
#[derive(Debug, Clone, PartialEq)]
pub enum IdleVerdict {
    /// Every sample in the window satisfied the condition.
    Idle { samples: usize },
    /// At least one sample in the window broke the condition.
    Busy { at: DateTime<Utc>, reason: String },
    /// Too few samples to decide; treated as not idle.
    InsufficientData { found: usize, required: usize },
}

impl IdleVerdict {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }
}

impl std::fmt::Display for IdleVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle { samples } => write!(f, "idle ({samples} samples)"),
            Self::Busy { at, reason } => write!(f, "busy: {reason} at {}", at.to_rfc3339()),
            Self::InsufficientData { found, required } => {
                write!(f, "insufficient samples ({found}/{required})")
            }
        }
    }
}

/// Minimum number of samples needed to judge a window of `window_minutes`:
/// roughly one per two minutes, never fewer than one.
#[must_use]
pub fn required_samples(window_minutes: u32) -> usize {
    usize::try_from(window_minutes / 2).unwrap_or(usize::MAX).max(1)
}

/// Suffix of `samples` (sorted oldest first) strictly newer than `now - window_minutes`.
#[must_use]
pub fn samples_within<S: Timestamped>(
    samples: &[S],
    now: DateTime<Utc>,
    window_minutes: u32,
) -> &[S] {
    let Some(cutoff) = now.checked_sub_signed(TimeDelta::minutes(i64::from(window_minutes)))
    else {
        return samples;
    };
    let start = samples.partition_point(|s| s.timestamp() <= cutoff);
    &samples[start..]
}

fn evaluate<S: Timestamped>(
    samples: &[S],
    now: DateTime<Utc>,
    window_minutes: u32,
    violation: impl Fn(&S) -> Option<String>,
) -> IdleVerdict {
    let window = samples_within(samples, now, window_minutes);
    let required = required_samples(window_minutes);
    if window.len() < required {
        return IdleVerdict::InsufficientData {
            found: window.len(),
            required,
        };
    }
    for sample in window {
        if let Some(reason) = violation(sample) {
            return IdleVerdict::Busy {
                at: sample.timestamp(),
                reason,
            };
        }
    }
    IdleVerdict::Idle {
        samples: window.len(),
    }
}

/// Idle iff every CPU sample of the last `window_minutes` is strictly below `threshold`.
#[must_use]
pub fn cpu_below_threshold(
    samples: &[CpuSample],
    threshold: f64,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> IdleVerdict {
    evaluate(samples, now, window_minutes, |s| {
        (s.usage_percent >= threshold).then(|| {
            format!(
                "cpu {:.2}% >= threshold {threshold:.0}%",
                s.usage_percent
            )
        })
    })
}

/// Idle iff no session was active in any sample of the last `window_minutes`.
#[must_use]
pub fn no_active_sessions(
    samples: &[SessionSample],
    window_minutes: u32,
    now: DateTime<Utc>,
) -> IdleVerdict {
    evaluate(samples, now, window_minutes, |s| {
        (s.count() > 0).then(|| {
            let names: Vec<&str> = s.sessions.iter().map(String::as_str).collect();
            format!("{} active session(s): {}", s.count(), names.join(", "))
        })
    })
}
