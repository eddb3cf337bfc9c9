//! Glue between the command handlers and the server plugin.

use crate::ui::Layout;
use anyhow::{Result, bail};
use lsp_types::Url;
use std::sync::Arc;
use taplo_core::installer::ReleaseFeed;
use taplo_core::{ConfigManager, InstallPaths, LspSession, ServerPlugin, TaploPlugin};

/// Loads the settings file and hands it to a fresh plugin.
pub fn load_plugin(paths: &InstallPaths) -> Result<(TaploPlugin, ConfigManager)> {
    let config = ConfigManager::new(paths.config_file())?;
    let mut plugin = TaploPlugin::new(paths.clone())?;
    plugin.configure(config.settings.clone());
    Ok((plugin, config))
}

/// What [`ensure_server`] did to the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Current,
    Installed,
    /// The install failed and the previously installed binary is kept.
    UpdateFailed,
}

/// Runs the update check and installs when it asks for it.
///
/// A failed update of an existing install only warns; the old binary keeps working.
pub fn ensure_server<F: ReleaseFeed>(
    plugin: &TaploPlugin<F>,
    layout: &Layout,
) -> Result<ServerStatus> {
    let check = plugin.needs_update();
    let mut status = ServerStatus::Current;

    if check.needed {
        let version = check.state.target_version.as_deref().unwrap_or_default();
        layout.info(&format!("Installing taplo {}...", version));

        match plugin.install_or_update(&check.state) {
            Ok(()) => {
                layout.success(&format!("Installed taplo {}", version));
                status = ServerStatus::Installed;
            }
            Err(e) if plugin.installer().server_installed() => {
                log::warn!("Update to {} failed: {}", version, e);
                layout.warning("Update failed, keeping the installed server");
                status = ServerStatus::UpdateFailed;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !plugin.installer().server_installed() {
        bail!(
            "taplo is not installed at {} and no release could be resolved",
            plugin.paths().server_file().display()
        );
    }
    Ok(status)
}

/// Prepares the cache directory, starts the server and completes the handshake.
pub async fn start_session(plugin: &TaploPlugin) -> Result<Arc<LspSession>> {
    let cache_path = plugin.on_session_pre_start(&plugin.variables())?;
    let (program, args) = plugin.server_command()?;

    let session = LspSession::spawn(&program, &args, &plugin.server_env())?;
    let root_uri = std::env::current_dir()
        .ok()
        .and_then(|dir| Url::from_directory_path(dir).ok());

    if let Err(e) = session
        .initialize(root_uri, plugin.initialization_options(&cache_path))
        .await
    {
        let _ = session.shutdown().await;
        return Err(e.into());
    }
    Ok(Arc::new(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use taplo_core::installer::{Installer, UpdateMetadata, VersionResolution};
    use taplo_core::{AppError, AppResult, Settings};
    use tempfile::TempDir;

    /// Announces a newer release whose download always fails.
    struct BrokenDownloads;

    impl ReleaseFeed for BrokenDownloads {
        fn latest_version(&self) -> VersionResolution {
            VersionResolution::Resolved("1.0.0".to_string())
        }

        fn download(&self, _version: &str, _asset: &str) -> AppResult<Box<dyn Read + Send>> {
            Err(AppError::Internal("connection reset".into()))
        }
    }

    fn plugin(dir: &TempDir) -> TaploPlugin<BrokenDownloads> {
        let installer = Installer::new(InstallPaths::new(dir.path()), BrokenDownloads)
            .with_target("linux", "x64");
        let mut plugin = TaploPlugin::with_installer(installer);
        plugin.configure(Settings::default());
        plugin
    }

    #[test]
    fn failed_update_keeps_installed_server() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin(&dir);
        let paths = plugin.paths().clone();
        std::fs::create_dir_all(paths.server_path()).unwrap();
        std::fs::write(paths.server_file(), b"old").unwrap();
        UpdateMetadata {
            timestamp: 0,
            version: "0.9.0".into(),
        }
        .save(&paths.metadata_file())
        .unwrap();

        let status = ensure_server(&plugin, &Layout::new()).unwrap();
        assert_eq!(status, ServerStatus::UpdateFailed);
        assert_eq!(std::fs::read(paths.server_file()).unwrap(), b"old");
    }

    #[test]
    fn failed_first_install_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_server(&plugin(&dir), &Layout::new()).is_err());
    }
}
