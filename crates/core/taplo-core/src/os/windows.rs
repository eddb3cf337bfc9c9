use std::path::{Path, PathBuf};

pub const SERVER_BINARY_NAME: &str = "taplo.exe";

pub fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Prefixes `path` with `\\?\` so recursive deletion is not limited by MAX_PATH.
pub fn long_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.starts_with(r"\\?\") {
        return path.to_path_buf();
    }
    PathBuf::from(format!(r"\\?\{}", raw))
}
