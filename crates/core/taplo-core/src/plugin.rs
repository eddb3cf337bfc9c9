use crate::config::{expand_variables, Settings};
use crate::env::{InstallPaths, PACKAGE_NAME};
use crate::error::{AppError, AppResult};
use crate::installer::cleanup::{schedule_removal, CLEANUP_DELAY};
use crate::installer::{GithubReleases, Installer, PackageEvents, ReleaseFeed, UpdateCheck, UpdateState};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::thread::JoinHandle;

/// Lifecycle hooks the host drives for a managed language server.
pub trait ServerPlugin {
    fn name(&self) -> &str;

    fn configure(&mut self, settings: Settings);

    fn needs_update(&self) -> UpdateCheck;

    fn install_or_update(&self, state: &UpdateState) -> AppResult<()>;

    /// Runs right before the server process is spawned. Returns the prepared cache directory.
    fn on_session_pre_start(&self, variables: &BTreeMap<String, String>) -> AppResult<PathBuf>;

    /// Schedules removal of everything the plugin installed, when the package is being removed.
    fn cleanup(&self, events: Option<&dyn PackageEvents>) -> Option<JoinHandle<()>>;
}

pub struct TaploPlugin<F: ReleaseFeed = GithubReleases> {
    settings: Settings,
    installer: Installer<F>,
}

impl TaploPlugin<GithubReleases> {
    pub fn new(paths: InstallPaths) -> AppResult<Self> {
        Ok(Self::with_feed(paths, GithubReleases::taplo()?))
    }
}

impl<F: ReleaseFeed> TaploPlugin<F> {
    pub fn with_feed(paths: InstallPaths, feed: F) -> Self {
        Self::with_installer(Installer::new(paths, feed))
    }

    pub fn with_installer(installer: Installer<F>) -> Self {
        Self {
            settings: Settings::default(),
            installer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn installer(&self) -> &Installer<F> {
        &self.installer
    }

    pub fn paths(&self) -> &InstallPaths {
        self.installer.paths()
    }

    /// Variables contributed by this plugin on top of the host's own.
    pub fn additional_variables(&self) -> BTreeMap<String, String> {
        let paths = self.paths();
        BTreeMap::from([
            (
                "server_file".to_string(),
                paths.server_file().to_string_lossy().into_owned(),
            ),
            (
                "server_path".to_string(),
                paths.server_path().to_string_lossy().into_owned(),
            ),
        ])
    }

    /// Host variables plus [`Self::additional_variables`].
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::from([
            (
                "storage_path".to_string(),
                self.paths().storage_path().to_string_lossy().into_owned(),
            ),
            ("platform".to_string(), crate::os::platform().to_string()),
            ("arch".to_string(), crate::os::arch().to_string()),
        ]);
        if let Some(home) = dirs::home_dir() {
            variables.insert("home".to_string(), home.to_string_lossy().into_owned());
        }
        variables.extend(self.additional_variables());
        variables
    }

    /// Server command line with variables expanded.
    pub fn server_command(&self) -> AppResult<(String, Vec<String>)> {
        let variables = self.variables();
        let mut parts = self
            .settings
            .command
            .iter()
            .map(|part| expand_variables(part, &variables));
        let program = parts
            .next()
            .ok_or_else(|| AppError::Config("Server command is empty".into()))?;
        Ok((program, parts.collect()))
    }

    /// Extra environment for the server process, values expanded like the command.
    pub fn server_env(&self) -> BTreeMap<String, String> {
        let variables = self.variables();
        self.settings
            .env
            .iter()
            .map(|(key, value)| (key.clone(), expand_variables(value, &variables)))
            .collect()
    }

    pub fn initialization_options(&self, cache_path: &Path) -> Value {
        json!({ "cachePath": cache_path.to_string_lossy() })
    }
}

impl<F: ReleaseFeed> ServerPlugin for TaploPlugin<F> {
    fn name(&self) -> &str {
        PACKAGE_NAME
    }

    fn configure(&mut self, settings: Settings) {
        log::debug!("Configured server version {:?}", settings.server_version);
        self.settings = settings;
    }

    fn needs_update(&self) -> UpdateCheck {
        self.installer.needs_update(&self.settings.server_version)
    }

    fn install_or_update(&self, state: &UpdateState) -> AppResult<()> {
        self.installer.install_or_update(state)
    }

    fn on_session_pre_start(&self, variables: &BTreeMap<String, String>) -> AppResult<PathBuf> {
        let mut all = variables.clone();
        all.extend(self.additional_variables());

        let expanded = expand_variables(&self.settings.initialization_options.cache_path, &all);
        let cache_path = normalize_path(Path::new(&expanded));
        // taplo does not create its cache directory on its own
        std::fs::create_dir_all(&cache_path).map_err(|e| AppError::io(&cache_path, e))?;
        Ok(cache_path)
    }

    fn cleanup(&self, events: Option<&dyn PackageEvents>) -> Option<JoinHandle<()>> {
        let events = events?;
        if !events.is_removing(self.name()) {
            return None;
        }
        Some(schedule_removal(&self.paths().server_path(), CLEANUP_DELAY))
    }
}

/// Lexically resolves `.` and `..` components.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
