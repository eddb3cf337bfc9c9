use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sentinel `server_version` value that tracks the newest published release.
pub const LATEST: &str = "latest";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InitializationOptions {
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

impl Default for InitializationOptions {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_server_version")]
    pub server_version: String,
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    #[serde(default)]
    pub initialization_options: InitializationOptions,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_server_version() -> String {
    LATEST.to_string()
}

fn default_command() -> Vec<String> {
    vec![
        "${server_file}".to_string(),
        "lsp".to_string(),
        "stdio".to_string(),
    ]
}

fn default_cache_path() -> String {
    "${server_path}/cache".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_version: default_server_version(),
            command: default_command(),
            initialization_options: InitializationOptions::default(),
            env: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn tracks_latest(&self) -> bool {
        self.server_version.trim() == LATEST
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    pub settings: Settings,
}

impl ConfigManager {
    /// Loads `config_path`, writing the defaults there first if it does not exist yet.
    pub fn new(config_path: impl Into<PathBuf>) -> AppResult<Self> {
        let config_path = config_path.into();
        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| AppError::io(&config_path, e))?;
            toml::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable settings in {:?}: {}", config_path, e);
                Settings::default()
            })
        } else {
            let settings = Settings::default();
            if let Err(e) = Self::save_to_path(&settings, &config_path) {
                log::warn!("Failed to save default settings: {}", e);
            }
            settings
        };

        Ok(Self {
            config_path,
            settings,
        })
    }

    pub fn save(&self) -> AppResult<()> {
        Self::save_to_path(&self.settings, &self.config_path)
    }

    fn save_to_path(settings: &Settings, path: &Path) -> AppResult<()> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| AppError::Config(e.to_string()))?;
        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        write_atomic(path, content.as_bytes())
    }

    pub fn set_server_version(&mut self, version: &str) -> AppResult<()> {
        self.settings.server_version = version.trim().to_string();
        self.save()
    }
}

/// Writes `content` to a temp file next to `path`, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> AppResult<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| AppError::io(parent, e))?;
    std::fs::write(temp.path(), content).map_err(|e| AppError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| AppError::io(path, e.error))?;
    Ok(())
}

/// Replaces `${name}` and `$name` occurrences with values from `variables`.
///
/// Unknown variables are kept verbatim.
pub fn expand_variables(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(inner) = after.strip_prefix('{') {
            if let Some(end) = inner.find('}') {
                let name = &inner[..end];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &inner[end + 1..];
                continue;
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len > 0 {
                let name = &after[..len];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
                rest = &after[len..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_created_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.settings.server_version, LATEST);
        assert!(manager.settings.tracks_latest());
        assert!(path.exists());
    }

    #[test]
    fn server_version_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        {
            let mut manager = ConfigManager::new(&path).unwrap();
            manager.set_server_version(" 0.9.3 ").unwrap();
        }
        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.settings.server_version, "0.9.3");
        assert!(!manager.settings.tracks_latest());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_version = \"0.8.0\"\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.settings.server_version, "0.8.0");
        assert_eq!(manager.settings.command, default_command());
        assert_eq!(
            manager.settings.initialization_options.cache_path,
            "${server_path}/cache"
        );
    }

    #[test]
    fn garbage_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_version = [").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.settings, Settings::default());
    }

    #[test]
    fn expands_braced_and_bare_variables() {
        let mut vars = BTreeMap::new();
        vars.insert("server_path".to_string(), "/opt/taplo".to_string());
        vars.insert("home".to_string(), "/home/me".to_string());

        assert_eq!(
            expand_variables("${server_path}/cache", &vars),
            "/opt/taplo/cache"
        );
        assert_eq!(expand_variables("$home/x", &vars), "/home/me/x");
        assert_eq!(expand_variables("${unknown}/$nope", &vars), "${unknown}/$nope");
        assert_eq!(expand_variables("cost: 5$", &vars), "cost: 5$");
        assert_eq!(expand_variables("${open", &vars), "${open");
    }
}
