use anyhow::{Result, anyhow};
use taplo_core::env::PACKAGE_NAME;
use taplo_core::installer::PackageEvents;
use taplo_core::{InstallPaths, ServerPlugin};

use crate::lifecycle::load_plugin;
use crate::ui::Layout;

/// Removal requested from the command line.
struct Uninstalling;

impl PackageEvents for Uninstalling {
    fn is_removing(&self, package: &str) -> bool {
        package == PACKAGE_NAME
    }
}

pub fn handle_uninstall(paths: &InstallPaths) -> Result<()> {
    let layout = Layout::new();
    let server_path = paths.server_path();

    if !server_path.exists() {
        layout.info("Nothing to remove");
        return Ok(());
    }

    let (plugin, _) = load_plugin(paths)?;
    if let Some(removal) = plugin.cleanup(Some(&Uninstalling)) {
        layout.info(&format!("Removing {}...", server_path.display()));
        removal
            .join()
            .map_err(|_| anyhow!("Removal of {} panicked", server_path.display()))?;
    }

    if server_path.exists() {
        layout.warning(&format!("Could not remove {}", server_path.display()));
    } else {
        layout.success("Removed the taplo server");
    }
    Ok(())
}
