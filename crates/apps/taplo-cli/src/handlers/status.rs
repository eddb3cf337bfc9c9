use anyhow::Result;
use chrono::{DateTime, Local};
use taplo_core::InstallPaths;
use taplo_core::installer::{assets, now_epoch};

use crate::lifecycle::load_plugin;
use crate::ui::Layout;

pub fn handle_status(paths: &InstallPaths) -> Result<()> {
    let layout = Layout::new();
    let (plugin, config) = load_plugin(paths)?;
    let installer = plugin.installer();
    let metadata = installer.installed_metadata();

    layout.header_dashboard("taplo-ext status");

    layout.section_timeline("sv", "Server");
    layout.row_labeled(
        "◆",
        "Installed",
        if installer.server_installed() { "yes" } else { "no" },
    );
    layout.row_labeled(
        "◆",
        "Version",
        if metadata.version.is_empty() { "-" } else { metadata.version.as_str() },
    );
    layout.row_labeled("◆", "Requested", &config.settings.server_version);
    layout.row_labeled(
        "◷",
        "Next check",
        &format_next_check(metadata.timestamp, now_epoch()),
    );
    let asset = assets::current_asset_name().unwrap_or("unsupported platform");
    layout.row_labeled("◫", "Asset", asset);
    layout.section_end();

    layout.section_timeline("st", "Storage");
    layout.row_labeled("◫", "Binary", &paths.server_file().display().to_string());
    layout.row_labeled("◫", "Settings", &paths.config_file().display().to_string());
    layout.row_labeled("◫", "Logs", &paths.log_dir().display().to_string());
    layout.section_end();

    Ok(())
}

/// When the next "latest" check may run, in local time.
fn format_next_check(timestamp: i64, now: i64) -> String {
    if timestamp <= now {
        return "due now".to_string();
    }
    match DateTime::from_timestamp(timestamp, 0) {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_check_in_the_past_is_due() {
        assert_eq!(format_next_check(0, 1_700_000_000), "due now");
        assert_eq!(format_next_check(1_700_000_000, 1_700_000_000), "due now");
    }

    #[test]
    fn next_check_in_the_future_is_a_date() {
        let formatted = format_next_check(1_700_000_000 + 3600, 1_700_000_000);
        assert!(formatted.starts_with("2023-11-1"), "{formatted}");
        assert_eq!(format_next_check(i64::MAX, 0), "never");
    }
}
