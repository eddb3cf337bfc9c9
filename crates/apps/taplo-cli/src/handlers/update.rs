use anyhow::Result;
use taplo_core::InstallPaths;

use crate::lifecycle::{ServerStatus, ensure_server, load_plugin};
use crate::ui::Layout;

pub fn handle_update(paths: &InstallPaths, force: bool) -> Result<()> {
    let layout = Layout::new();
    let (plugin, config) = load_plugin(paths)?;

    if force && config.settings.tracks_latest() {
        plugin.installer().reset_check_window()?;
    }

    if ensure_server(&plugin, &layout)? == ServerStatus::Current {
        let version = plugin.installer().installed_metadata().version;
        layout.success(&format!("taplo {} is up to date", version));
    }
    Ok(())
}
