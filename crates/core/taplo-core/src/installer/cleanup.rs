use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

/// Grace period before deleting, so in-flight handles on the server binary can close.
pub const CLEANUP_DELAY: Duration = Duration::from_secs(1);

/// Package manager integration that reports package removals.
pub trait PackageEvents {
    /// True when `package` is being uninstalled (as opposed to upgraded or disabled).
    fn is_removing(&self, package: &str) -> bool;
}

/// Removes `dir` recursively on a background thread after `delay`.
///
/// Failures are logged and otherwise ignored.
pub fn schedule_removal(dir: &Path, delay: Duration) -> JoinHandle<()> {
    let target: PathBuf = crate::os::long_path(dir);
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        if !target.is_dir() {
            return;
        }
        match std::fs::remove_dir_all(&target) {
            Ok(()) => log::info!("Removed server directory {:?}", target),
            Err(e) => log::debug!("Could not fully remove {:?}: {}", target, e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn removes_directory_tree() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("pkg");
        std::fs::create_dir_all(target.join("cache/nested")).unwrap();
        std::fs::write(target.join("taplo"), b"bin").unwrap();

        schedule_removal(&target, Duration::ZERO).join().unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn missing_directory_is_ignored() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("absent");
        schedule_removal(&target, Duration::ZERO).join().unwrap();
        assert!(!target.exists());
    }
}
