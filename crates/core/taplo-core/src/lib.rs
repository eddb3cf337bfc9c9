pub mod config;
pub mod env;
pub mod error;
pub mod installer;
pub mod os;
pub mod plugin;
pub mod protocol;
pub mod relay;
pub mod session;

pub use config::{ConfigManager, Settings};
pub use env::InstallPaths;
pub use error::{AppError, AppResult};
pub use plugin::{ServerPlugin, TaploPlugin};
pub use session::{LspSession, Session};
