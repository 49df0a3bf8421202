use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::application::config::AppConfig;
use crate::application::format::format_duration;
use crate::domain::entities::calibration::CalibrationState;
use crate::domain::ports::store::CalibrationStore;
use crate::domain::value_objects::{CpuMode, EffectiveConfig};
use crate::infrastructure::persistence::JsonStateStore;
use crate::presentation::cli::formatters::status_fmt::{
    colorize_phase, format_timestamp, print_field, print_section_header,
};

/// Label / value pairs describing the calibration status. Read-only: the
/// state file is never created here.
#[must_use]
pub fn status_fields(
    config: &EffectiveConfig,
    state: Option<&CalibrationState>,
    now: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let mut fields = vec![("Mode", config.mode.to_string())];

    if config.mode == CpuMode::Manual {
        fields.push(("Threshold", format!("{:.0}% (set in config)", config.cpu_threshold)));
    }

    let Some(state) = state else {
        fields.push(("Phase", "not started".to_string()));
        return fields;
    };

    let timings = &config.calibration;
    fields.push(("Phase", state.phase().to_string()));
    fields.push(("Started", format_timestamp(Some(state.start_time))));
    if state.initial_done {
        if config.mode == CpuMode::Auto {
            fields.push(("Threshold", format!("{:.0}% (active)", state.current_threshold)));
        } else {
            fields.push(("Calibrated value", format!("{:.0}%", state.current_threshold)));
        }
        fields.push(("Idle baseline", format!("{:.1}%", state.idle_baseline)));
    } else {
        fields.push((
            "Learning left",
            format_duration(state.learning_time_remaining(timings, now)),
        ));
    }
    fields.push(("Last calibration", format_timestamp(state.last_calibration_time)));
    fields.push((
        "Next calibration",
        format!("~{}", state.next_calibration_at(timings).format("%Y-%m-%d %H:%M UTC")),
    ));
    fields
}

/// # Errors
///
/// Returns an error if the state file cannot be read or decoded, or JSON
/// serialization fails.
pub fn run_status(config: &AppConfig, state_path: &Path, json: bool) -> anyhow::Result<()> {
    let store = JsonStateStore::new(&state_path.to_string_lossy());
    let state = store
        .load()
        .with_context(|| format!("Failed to read calibration state {}", state_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("{}", "idlewatch status".bold().cyan());
    println!("{}", "━".repeat(50));

    print_section_header("\nCalibration");
    for (label, value) in status_fields(&config.effective(), state.as_ref(), Utc::now()) {
        match (label, &state) {
            ("Phase", Some(s)) => print_field(label, &colorize_phase(s.phase()).to_string()),
            _ => print_field(label, &value),
        }
    }
    print_field("State file", &state_path.display().to_string());
    Ok(())
}
