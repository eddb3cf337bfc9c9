use anyhow::Result;
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use std::path::Path;

/// Starts file logging under `log_dir`; warnings and errors are echoed to stderr.
///
/// The returned handle must stay alive for the lifetime of the process.
pub fn init(log_dir: &Path) -> Result<LoggerHandle> {
    std::fs::create_dir_all(log_dir)?;

    let handle = Logger::try_with_env_or_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename("taplo-ext")
                .suffix("log"),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .format(flexi_logger::opt_format)
        .start()?;

    log::debug!("taplo-ext v{} logging to {}", env!("CARGO_PKG_VERSION"), log_dir.display());
    Ok(handle)
}
