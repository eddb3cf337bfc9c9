pub mod config;
pub mod relay;
pub mod status;
pub mod uninstall;
pub mod update;
