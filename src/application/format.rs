use chrono::TimeDelta;

/// Human-readable duration such as `23h 14m`, truncated to the minute.
/// Negative durations read as `0m`.
#[must_use]
pub fn format_duration(duration: TimeDelta) -> String {
    let minutes = duration.num_minutes().max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}
