use crate::error::AppResult;
use reqwest::blocking::Client;
use std::io::Read;

pub const TAPLO_REPO: &str = "https://github.com/tamasfe/taplo";

/// Outcome of asking the release feed for its newest version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionResolution {
    Resolved(String),
    Unresolved(String),
}

/// Remote source of server releases.
pub trait ReleaseFeed {
    /// Resolves the version behind the feed's "latest" alias.
    fn latest_version(&self) -> VersionResolution;

    /// Opens the compressed `asset` published for `version`.
    fn download(&self, version: &str, asset: &str) -> AppResult<Box<dyn Read + Send>>;
}

/// GitHub releases of a repository, addressed by its web URL.
pub struct GithubReleases {
    repo_url: String,
    client: Client,
}

impl GithubReleases {
    pub fn new(repo_url: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("taplo-ext/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            repo_url: repo_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn taplo() -> AppResult<Self> {
        Self::new(TAPLO_REPO)
    }

    pub fn latest_url(&self) -> String {
        format!("{}/releases/latest", self.repo_url)
    }

    pub fn download_url(&self, version: &str, asset: &str) -> String {
        format!("{}/releases/download/{}/{}", self.repo_url, version, asset)
    }
}

impl ReleaseFeed for GithubReleases {
    fn latest_version(&self) -> VersionResolution {
        let url = self.latest_url();
        log::info!("Checking {} for the latest server release", url);

        let response = match self.client.head(&url).send() {
            Ok(response) => response,
            Err(e) => return VersionResolution::Unresolved(format!("request failed: {}", e)),
        };

        if !response.status().is_success() {
            return VersionResolution::Unresolved(format!(
                "release feed returned {}",
                response.status()
            ));
        }

        match version_from_url(response.url().as_str()) {
            Some(version) => VersionResolution::Resolved(version),
            None => VersionResolution::Unresolved(format!(
                "no version in redirect target {}",
                response.url()
            )),
        }
    }

    fn download(&self, version: &str, asset: &str) -> AppResult<Box<dyn Read + Send>> {
        let url = self.download_url(version, asset);
        log::info!("Downloading {}", url);
        let response = self.client.get(&url).send()?.error_for_status()?;
        Ok(Box::new(response))
    }
}

/// Extracts the release tag from the final URL of the "latest" redirect.
///
/// The tag is the last path segment, ignoring trailing slashes. A URL still
/// ending in `latest` means no redirect happened.
pub fn version_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let (_, segment) = trimmed.rsplit_once('/')?;
    if segment.is_empty() || segment == "latest" || segment.contains(':') {
        return None;
    }
    Some(segment.to_string())
}
