use crate::config::write_atomic;
use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Seconds until the next "latest" check after a successful check or install.
pub const SUCCESS_CHECK_DELAY: i64 = 7 * 24 * 60 * 60;
/// Seconds until the next "latest" check after a failed check.
pub const FAILURE_CHECK_DELAY: i64 = 6 * 60 * 60;

/// Update cookie stored next to the server binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMetadata {
    /// Earliest epoch second at which the release feed may be queried again.
    pub timestamp: i64,
    /// Installed server version, empty when nothing is installed.
    pub version: String,
}

impl UpdateMetadata {
    /// State of an installation that never happened.
    pub fn never_installed() -> Self {
        Self::default()
    }

    /// Reads the cookie at `path`.
    ///
    /// A missing, unreadable or malformed file yields [`UpdateMetadata::never_installed`].
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("No update metadata at {:?}: {}", path, e);
                return Self::never_installed();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Discarding malformed update metadata at {:?}: {}", path, e);
            Self::never_installed()
        })
    }

    /// Builds the cookie for an attempt finished at `now`.
    pub fn after_attempt(success: bool, version: &str, now: i64) -> Self {
        let delay = if success {
            SUCCESS_CHECK_DELAY
        } else {
            FAILURE_CHECK_DELAY
        };
        Self {
            timestamp: now + delay,
            version: version.to_string(),
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let content = serde_json::to_vec(self)?;
        write_atomic(path, &content)
    }

    /// Whether the release feed may be queried at `now`.
    pub fn check_due(&self, now: i64) -> bool {
        now >= self.timestamp
    }
}

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_is_never_installed() {
        let dir = TempDir::new().unwrap();
        let metadata = UpdateMetadata::load(&dir.path().join("update.json"));
        assert_eq!(metadata, UpdateMetadata::never_installed());
        assert!(metadata.check_due(0));
    }

    #[test]
    fn load_malformed_files_is_never_installed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("update.json");

        for content in [
            "",
            "not json",
            "[]",
            "{\"timestamp\": 5}",
            "{\"version\": \"0.9.0\"}",
            "{\"timestamp\": \"soon\", \"version\": \"0.9.0\"}",
            "{\"timestamp\": 5, \"version\": 7}",
        ] {
            std::fs::write(&path, content).unwrap();
            assert_eq!(
                UpdateMetadata::load(&path),
                UpdateMetadata::never_installed(),
                "content: {content}"
            );
        }
    }

    #[test]
    fn save_then_load_uses_plain_json_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("update.json");
        let metadata = UpdateMetadata::after_attempt(true, "0.9.3", 1_000);
        metadata.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["timestamp"], 1_000 + SUCCESS_CHECK_DELAY);
        assert_eq!(raw["version"], "0.9.3");
        assert_eq!(UpdateMetadata::load(&path), metadata);
    }

    #[test]
    fn failure_backs_off_six_hours() {
        let metadata = UpdateMetadata::after_attempt(false, "0.8.0", 100);
        assert_eq!(metadata.timestamp, 100 + 6 * 3600);
        assert!(!metadata.check_due(100));
        assert!(metadata.check_due(100 + 6 * 3600));
    }
}
