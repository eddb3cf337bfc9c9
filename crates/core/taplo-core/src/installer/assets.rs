use crate::error::{AppError, AppResult};

/// Release asset for every supported `platform-arch` pair.
const RELEASE_ASSETS: [(&str, &str); 8] = [
    ("linux-arm64", "taplo-linux-aarch64.gz"),
    ("linux-x32", "taplo-linux-x86.gz"),
    ("linux-x64", "taplo-linux-x86_64.gz"),
    ("osx-arm64", "taplo-darwin-aarch64.gz"),
    ("osx-x64", "taplo-darwin-x86_64.gz"),
    ("windows-arm64", "taplo-windows-aarch64.gz"),
    ("windows-x32", "taplo-windows-x86.gz"),
    ("windows-x64", "taplo-windows-x86_64.gz"),
];

/// Looks up the gzip asset published for `platform` and `arch`.
pub fn asset_name(platform: &str, arch: &str) -> AppResult<&'static str> {
    let key = format!("{}-{}", platform, arch);
    RELEASE_ASSETS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, asset)| *asset)
        .ok_or_else(|| AppError::UnsupportedPlatform {
            platform: platform.to_string(),
            arch: arch.to_string(),
        })
}

/// Asset for the running host.
pub fn current_asset_name() -> AppResult<&'static str> {
    asset_name(crate::os::platform(), crate::os::arch())
}

pub fn supported_targets() -> impl Iterator<Item = &'static str> {
    RELEASE_ASSETS.iter().map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_target_has_distinct_asset() {
        let mut seen = HashSet::new();
        for platform in ["linux", "osx", "windows"] {
            for arch in ["x32", "x64", "arm64"] {
                if platform == "osx" && arch == "x32" {
                    continue;
                }
                let asset = asset_name(platform, arch).unwrap();
                assert!(!asset.is_empty());
                assert!(asset.ends_with(".gz"));
                assert!(seen.insert(asset), "duplicate asset {asset}");
            }
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(supported_targets().count(), 8);
    }

    #[test]
    fn unmapped_target_fails() {
        for (platform, arch) in [("osx", "x32"), ("freebsd", "x64"), ("linux", "riscv64"), ("", "")] {
            match asset_name(platform, arch) {
                Err(AppError::UnsupportedPlatform { platform: p, arch: a }) => {
                    assert_eq!(p, platform);
                    assert_eq!(a, arch);
                }
                other => panic!("expected lookup failure, got {other:?}"),
            }
        }
    }
}
