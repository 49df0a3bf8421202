use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::domain::entities::calibration::CalibrationPhase;

#[must_use]
pub fn colorize_phase(phase: CalibrationPhase) -> ColoredString {
    match phase {
        CalibrationPhase::Learning => phase.to_string().yellow().bold(),
        CalibrationPhase::Calibrated => phase.to_string().green().bold(),
    }
}

#[must_use]
pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "never".to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

pub fn print_section_header(title: &str) {
    println!("{}", title.bold().cyan());
    let display_width = title.chars().count();
    println!("{}", "─".repeat(display_width).cyan());
}

pub fn print_field(label: &str, value: &str) {
    println!("  {label:<18}: {value}");
}
