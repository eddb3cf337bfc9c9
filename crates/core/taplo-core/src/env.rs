use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Environment variable to override the default storage directory.
const ENV_DATA_DIR: &str = "TAPLO_EXT_HOME";

/// Directory name of the package inside the storage directory.
pub const PACKAGE_NAME: &str = "taplo-ext";

/// Returns the storage directory shared by the config, logs and the server package.
///
/// Checks for `TAPLO_EXT_HOME` first. If not set, falls back to `~/.taplo-ext`
/// (or equivalent on Windows).
pub fn get_base_dir() -> AppResult<PathBuf> {
    if let Ok(env_path) = std::env::var(ENV_DATA_DIR) {
        let path = PathBuf::from(env_path);
        if !path.is_absolute() {
            return Err(AppError::Config(format!(
                "Environment variable {} must be an absolute path, got: {:?}",
                ENV_DATA_DIR, path
            )));
        }
        return Ok(path);
    }

    match dirs::home_dir() {
        Some(home) => Ok(home.join(format!(".{}", PACKAGE_NAME))),
        None => Err(AppError::Config(format!(
            "Cannot determine home directory. Please set {} environment variable.",
            ENV_DATA_DIR
        ))),
    }
}

/// Filesystem locations of one server installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    storage_path: PathBuf,
}

impl InstallPaths {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    /// Paths rooted at [`get_base_dir`].
    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(get_base_dir()?))
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Directory holding the server binary and its update metadata.
    pub fn server_path(&self) -> PathBuf {
        self.storage_path.join(PACKAGE_NAME)
    }

    pub fn server_file(&self) -> PathBuf {
        self.server_path().join(crate::os::SERVER_BINARY_NAME)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.server_path().join("update.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.storage_path.join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.storage_path.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_get_base_dir_env_override() {
        let test_path = if cfg!(windows) {
            r"C:\temp\taplo_ext_test"
        } else {
            "/tmp/taplo_ext_test"
        };
        unsafe { env::set_var(ENV_DATA_DIR, test_path) };

        let result = get_base_dir();
        assert!(result.is_ok(), "get_base_dir() failed: {:?}", result);
        assert_eq!(result.unwrap(), PathBuf::from(test_path));

        unsafe { env::set_var(ENV_DATA_DIR, "relative/path") };
        assert!(get_base_dir().is_err());

        unsafe { env::remove_var(ENV_DATA_DIR) };
    }

    #[test]
    fn install_paths_layout() {
        let paths = InstallPaths::new("/data");
        assert_eq!(paths.server_path(), PathBuf::from("/data").join(PACKAGE_NAME));
        assert_eq!(
            paths.metadata_file(),
            PathBuf::from("/data").join(PACKAGE_NAME).join("update.json")
        );
        assert!(
            paths
                .server_file()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("taplo")
        );
    }
}
