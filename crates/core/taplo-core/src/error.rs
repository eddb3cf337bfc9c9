use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Generic IO error: {0}")]
    IoGeneric(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No release asset for platform '{platform}' and architecture '{arch}'")]
    UnsupportedPlatform { platform: String, arch: String },

    #[error("Server version to install has not been resolved")]
    VersionUnresolved,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Language server session is closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
