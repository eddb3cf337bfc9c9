use anyhow::Result;
use taplo_core::{ConfigManager, InstallPaths};

use crate::ui::Layout;

pub fn handle_config(paths: &InstallPaths, server_version: Option<String>) -> Result<()> {
    let layout = Layout::new();
    let mut config = ConfigManager::new(paths.config_file())?;

    if let Some(version) = server_version {
        if version.trim().is_empty() {
            layout.error("Server version cannot be empty");
            return Ok(());
        }
        config.set_server_version(&version)?;
        layout.success(&format!("Set server_version = {}", config.settings.server_version));
        return Ok(());
    }

    let settings = &config.settings;
    layout.header_dashboard("configuration");
    layout.section_timeline("cf", "Current Settings");
    layout.row_labeled("◆", "server_version", &settings.server_version);
    layout.row_labeled("◆", "command", &settings.command.join(" "));
    layout.row_labeled(
        "◫",
        "cache_path",
        &settings.initialization_options.cache_path,
    );
    for (key, value) in &settings.env {
        layout.row_labeled("◇", &format!("env.{}", key), value);
    }
    layout.section_end();
    layout.info(&format!("Edit {} for other settings", paths.config_file().display()));

    Ok(())
}
