//! Spinners and colored status text.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Braille dots animation
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Spinner shown while an operation runs, or `None` when quiet.
pub fn spinner(message: impl Into<String>, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    Some(pb)
}

/// Stop a spinner started with [`spinner`].
pub fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

/// `[n/5]` prefix for a setup step.
pub fn step_prefix(number: Option<u8>, total: u8) -> String {
    match number {
        Some(n) => format!("[{}/{}]", n, total).dimmed().to_string(),
        None => String::new(),
    }
}

pub fn success(message: &str) -> String {
    format!("{} {}", "✓".green(), message)
}

pub fn failure(message: &str) -> String {
    format!("{} {}", "✗".red(), message)
}

/// Color an RSSI value by link quality.
pub fn rssi(value: Option<i16>) -> String {
    match value {
        Some(v) if v >= -60 => format!("{} dBm", v).green().to_string(),
        Some(v) if v >= -80 => format!("{} dBm", v).yellow().to_string(),
        Some(v) => format!("{} dBm", v).red().to_string(),
        None => "-".dimmed().to_string(),
    }
}
