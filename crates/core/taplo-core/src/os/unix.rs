use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const SERVER_BINARY_NAME: &str = "taplo";

/// Marks `path` as executable (0755). Extraction from the gzip asset loses the mode bits.
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

pub fn long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}
