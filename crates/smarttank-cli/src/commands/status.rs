//! Status command implementation.

use anyhow::{Context, Result};
use time::format_description::well_known::Rfc3339;

use smarttank_store::StoredSetting;
use smarttank_types::keys;

use super::open_store;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::style;

pub fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.entries().context("Failed to read saved values")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&as_json(&entries))?),
        OutputFormat::Text => print!("{}", format_status(&entries)),
    }
    Ok(())
}

fn as_json(entries: &[StoredSetting]) -> serde_json::Value {
    entries
        .iter()
        .map(|e| (e.key.clone(), serde_json::Value::String(e.value.clone())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn value<'a>(entries: &'a [StoredSetting], key: &str) -> Option<&'a StoredSetting> {
    entries.iter().find(|e| e.key == key)
}

fn format_status(entries: &[StoredSetting]) -> String {
    if entries.is_empty() {
        return "No device set up yet. Run 'smarttank setup' to start.\n".to_string();
    }

    let mut out = String::new();
    let done = value(entries, keys::DEVICE_SETUP_DONE).is_some_and(|e| e.value == "true");
    if done {
        out.push_str(&format!("{}\n\n", style::success("Setup complete")));
    } else {
        out.push_str(&format!("{}\n\n", style::failure("Setup not finished")));
    }

    let width = entries.iter().map(|e| e.key.len()).max().unwrap_or(0);
    for entry in entries {
        let updated = entry
            .updated_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_string());
        out.push_str(&format!(
            "{:<width$}  {:<20}  {}\n",
            entry.key, entry.value, updated
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn setting(key: &str, value: &str) -> StoredSetting {
        StoredSetting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_empty_status() {
        assert!(format_status(&[]).contains("No device set up yet"));
    }

    #[test]
    fn test_status_lists_values() {
        let entries = vec![
            setting(keys::DEVICE_SETUP_DONE, "true"),
            setting(keys::TANK_HEIGHT, "120"),
        ];
        let text = format_status(&entries);
        assert!(text.contains("Setup complete"));
        assert!(text.contains("tank_height"));
        assert!(text.contains("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn test_unfinished_setup() {
        let text = format_status(&[setting(keys::TANK_HEIGHT, "120")]);
        assert!(text.contains("Setup not finished"));
    }

    #[test]
    fn test_json_is_flat_object() {
        let json = as_json(&[setting(keys::DEVICE_COST, "20")]);
        assert_eq!(json, serde_json::json!({"device_cost": "20"}));
    }
}
