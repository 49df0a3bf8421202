use std::path::PathBuf;

use crate::domain::entities::sample::CpuCounters;
use crate::domain::ports::sensor::{CollectionError, CpuSensor};

const PROC_STAT: &str = "/proc/stat";

/// Aggregate CPU counters from the `cpu` line of `/proc/stat`.
pub struct ProcStatCpuSensor {
    path: PathBuf,
}

impl ProcStatCpuSensor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(PROC_STAT))
    }

    /// Read from another file with the same layout.
    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Default for ProcStatCpuSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSensor for ProcStatCpuSensor {
    fn read_counters(&self) -> Result<CpuCounters, CollectionError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            CollectionError::CpuUnavailable(format!("failed to read {}: {e}", self.path.display()))
        })?;
        parse_proc_stat(&content)
    }
}

/// Busy = user + nice + system, idle = idle + iowait. `iowait` is optional
/// on very old kernels.
///
/// # Errors
///
/// Returns `CollectionError::CpuUnavailable` if the aggregate line is
/// missing, too short, or holds a non-numeric field.
pub fn parse_proc_stat(content: &str) -> Result<CpuCounters, CollectionError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CollectionError::CpuUnavailable("cpu line not found in /proc/stat".into()))?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .take(5)
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CollectionError::CpuUnavailable(format!("malformed cpu line: {e}")))?;

    let [user, nice, system, idle, rest @ ..] = fields.as_slice() else {
        return Err(CollectionError::CpuUnavailable(
            "unexpected /proc/stat format".into(),
        ));
    };
    let iowait = rest.first().copied().unwrap_or(0);

    Ok(CpuCounters::new(
        user.saturating_add(*nice).saturating_add(*system),
        idle.saturating_add(iowait),
    ))
}
