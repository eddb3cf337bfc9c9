//! Download and update of the taplo server binary.
//!
//! The update check is rate limited through [`UpdateMetadata`]: a successful
//! check or install pushes the next allowed check a week ahead, a failed one
//! six hours ahead. Only install-time failures are reported as errors.

pub mod assets;
pub mod cleanup;
pub mod feed;
pub mod metadata;

use crate::config::LATEST;
use crate::env::InstallPaths;
use crate::error::{AppError, AppResult};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

pub use assets::asset_name;
pub use cleanup::PackageEvents;
pub use feed::{GithubReleases, ReleaseFeed, VersionResolution};
pub use metadata::{now_epoch, UpdateMetadata};

/// Size of the buffer used to copy the decompressed server binary to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Version resolved by an update check, consumed by the following install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateState {
    pub target_version: Option<String>,
}

impl UpdateState {
    pub fn resolved(version: &str) -> Self {
        let version = version.trim();
        Self {
            target_version: (!version.is_empty()).then(|| version.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCheck {
    pub needed: bool,
    pub state: UpdateState,
}

impl UpdateCheck {
    fn skip() -> Self {
        Self::default()
    }
}

pub struct Installer<F: ReleaseFeed> {
    paths: InstallPaths,
    feed: F,
    platform: String,
    arch: String,
}

impl<F: ReleaseFeed> Installer<F> {
    pub fn new(paths: InstallPaths, feed: F) -> Self {
        Self {
            paths,
            feed,
            platform: crate::os::platform().to_string(),
            arch: crate::os::arch().to_string(),
        }
    }

    /// Installs assets for `platform`/`arch` instead of the running host.
    pub fn with_target(mut self, platform: &str, arch: &str) -> Self {
        self.platform = platform.to_string();
        self.arch = arch.to_string();
        self
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    pub fn server_installed(&self) -> bool {
        self.paths.server_file().is_file()
    }

    /// Recorded state of the installation; an absent binary counts as never installed.
    pub fn installed_metadata(&self) -> UpdateMetadata {
        if !self.server_installed() {
            return UpdateMetadata::never_installed();
        }
        UpdateMetadata::load(&self.paths.metadata_file())
    }

    /// Decides whether `desired` (a release tag or `"latest"`) requires an install.
    ///
    /// Never fails: feed errors are turned into a backoff and reported as "no update".
    pub fn needs_update(&self, desired: &str) -> UpdateCheck {
        let desired = desired.trim();
        let installed = self.installed_metadata();

        if desired != LATEST {
            return UpdateCheck {
                needed: desired != installed.version,
                state: UpdateState::resolved(desired),
            };
        }

        let now = now_epoch();
        if !installed.check_due(now) {
            log::debug!(
                "Skipping release check until {} (installed {})",
                installed.timestamp,
                installed.version
            );
            return UpdateCheck::skip();
        }

        match self.feed.latest_version() {
            VersionResolution::Resolved(latest) if latest == installed.version => {
                log::info!("Server {} is up to date", latest);
                self.record_attempt(true, &installed.version, now);
                UpdateCheck {
                    needed: false,
                    state: UpdateState::resolved(&latest),
                }
            }
            VersionResolution::Resolved(latest) => {
                log::info!(
                    "Server update available: {:?} -> {}",
                    installed.version,
                    latest
                );
                UpdateCheck {
                    needed: true,
                    state: UpdateState::resolved(&latest),
                }
            }
            VersionResolution::Unresolved(reason) => {
                log::warn!("Could not resolve latest server version: {}", reason);
                self.record_attempt(false, &installed.version, now);
                UpdateCheck::skip()
            }
        }
    }

    fn record_attempt(&self, success: bool, version: &str, now: i64) {
        let result = std::fs::create_dir_all(self.paths.server_path())
            .map_err(|e| AppError::io(self.paths.server_path(), e))
            .and_then(|_| {
                UpdateMetadata::after_attempt(success, version, now)
                    .save(&self.paths.metadata_file())
            });
        if let Err(e) = result {
            log::warn!("Failed to record update metadata: {}", e);
        }
    }

    /// Makes the next "latest" check query the feed regardless of the recorded window.
    pub fn reset_check_window(&self) -> AppResult<()> {
        if !self.server_installed() {
            return Ok(());
        }
        let metadata = UpdateMetadata {
            timestamp: 0,
            ..self.installed_metadata()
        };
        metadata.save(&self.paths.metadata_file())
    }

    /// Downloads and unpacks the version resolved in `state`.
    pub fn install_or_update(&self, state: &UpdateState) -> AppResult<()> {
        let version = state
            .target_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(AppError::VersionUnresolved)?;

        let server_path = self.paths.server_path();
        std::fs::create_dir_all(&server_path).map_err(|e| AppError::io(&server_path, e))?;

        let asset = asset_name(&self.platform, &self.arch)?;
        let archive = self.feed.download(version, asset)?;

        let server_file = self.paths.server_file();
        let written = unpack_gzip(archive, &server_file)?;
        crate::os::set_executable(&server_file).map_err(|e| AppError::io(&server_file, e))?;

        UpdateMetadata::after_attempt(true, version, now_epoch())
            .save(&self.paths.metadata_file())?;

        log::info!(
            "Installed taplo {} ({} bytes) at {:?}",
            version,
            written,
            server_file
        );
        Ok(())
    }
}

/// Decompresses a gzip stream into `dest`, overwriting it. Returns the bytes written.
pub fn unpack_gzip<R: Read>(reader: R, dest: &Path) -> AppResult<u64> {
    let mut archive = GzDecoder::new(reader);
    let mut out = File::create(dest).map_err(|e| AppError::io(dest, e))?;
    let mut block = vec![0u8; DOWNLOAD_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = match archive.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AppError::io(dest, e)),
        };
        out.write_all(&block[..n])
            .map_err(|e| AppError::io(dest, e))?;
        total += n as u64;
    }

    out.flush().map_err(|e| AppError::io(dest, e))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn unpack_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("taplo");
        std::fs::write(&dest, b"an older and longer binary").unwrap();

        let written = unpack_gzip(gzip(b"new").as_slice(), &dest).unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn unpack_spans_multiple_chunks() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("taplo");
        let payload: Vec<u8> = (0..DOWNLOAD_CHUNK_SIZE + 1234)
            .map(|i| (i % 251) as u8)
            .collect();

        let written = unpack_gzip(gzip(&payload).as_slice(), &dest).unwrap();
        assert_eq!(written as usize, payload.len());
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn unpack_rejects_non_gzip_input() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("taplo");
        assert!(unpack_gzip(&b"<html>not found</html>"[..], &dest).is_err());
    }

    #[test]
    fn resolved_state_ignores_blank_versions() {
        assert_eq!(UpdateState::resolved("  ").target_version, None);
        assert_eq!(
            UpdateState::resolved("0.9.3").target_version.as_deref(),
            Some("0.9.3")
        );
    }
}
