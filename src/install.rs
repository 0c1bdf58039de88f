//! The install pipeline: resolve an artifact, download it into the cache,
//! unpack it into a scratch directory and copy the executables into `bin/`.

use crate::config::Paths;
use crate::download::fetch_to_cache;
use crate::error::{IoContext, KelpError, Result};
use crate::extract::{extract, Extraction};
use crate::github::GitHubClient;
use crate::installer::{install_bare, install_binaries};
use crate::platform::Capabilities;
use crate::selector::select_asset;
use crate::types::{file_name_from_url, Asset, Package};
use std::fs;
use std::path::{Path, PathBuf};

/// Host, directories and API client every install needs.
pub struct Installer<'a> {
    pub caps: &'a Capabilities,
    pub paths: &'a Paths,
    pub github: &'a GitHubClient,
}

impl<'a> Installer<'a> {
    pub fn new(caps: &'a Capabilities, paths: &'a Paths, github: &'a GitHubClient) -> Self {
        Self { caps, paths, github }
    }

    /// Picks the artifact to download: the URL itself for http packages,
    /// otherwise the best asset of the requested release.
    pub async fn resolve_asset(&self, pkg: &Package, release: &str) -> Result<Asset> {
        if release.starts_with("http") {
            return Ok(Asset::from_url(release));
        }

        let gh_release = self.github.release(&pkg.owner, &pkg.repo, release).await?;
        let label = format!("{}/{}@{}", pkg.owner, pkg.repo, gh_release.tag_name);
        select_asset(self.caps, &label, &gh_release.assets).cloned()
    }

    /// Installs `pkg` at `release` and returns the installed binary paths.
    pub async fn install(&self, pkg: &Package, release: &str) -> Result<Vec<PathBuf>> {
        tracing::info!("Installing {}:{}...", pkg.full_name(), release);
        self.paths.ensure_dirs()?;

        let asset = self.resolve_asset(pkg, release).await?;
        let file_name = if asset.name.is_empty() {
            file_name_from_url(&asset.browser_download_url).to_string()
        } else {
            asset.name.clone()
        };
        if file_name.is_empty() {
            return Err(KelpError::Config(format!(
                "cannot derive a file name from {}",
                asset.browser_download_url
            )));
        }

        let cached = fetch_to_cache(
            self.github,
            &asset.browser_download_url,
            &self.paths.cached_artifact(&file_name),
        )
        .await?;

        // removed on drop, whichever way this function returns
        let scratch = tempfile::Builder::new()
            .prefix("kelp")
            .tempdir()
            .at(std::env::temp_dir())?;

        let installed: Vec<PathBuf> = match extract(&cached, scratch.path()) {
            Ok(Extraction::Bare) => {
                install_bare(self.caps, &cached, &self.paths.bin, pkg.binary_name())?
                    .into_iter()
                    .collect()
            }
            Ok(Extraction::Unpacked(_)) => {
                install_binaries(self.caps, scratch.path(), &self.paths.bin)?
            }
            Err(e) => {
                if matches!(e, KelpError::Extract { .. }) {
                    tracing::warn!("Dropping unusable cached artifact {}", cached.display());
                    evict(&cached);
                }
                return Err(e);
            }
        };

        if installed.is_empty() {
            return Err(KelpError::NoExecutable {
                artifact: file_name,
                content_type: self.caps.executable_content_type.to_string(),
            });
        }

        for path in &installed {
            println!("Installed {}", path.display());
        }
        Ok(installed)
    }
}

/// Removes a cached artifact. A failure is logged and the extraction error
/// is what the caller sees.
fn evict(cached: &Path) {
    if let Err(e) = fs::remove_file(cached) {
        tracing::warn!("Could not remove cached artifact {}: {}", cached.display(), e);
    }
}

/// Deletes `bin/<name>` if present. Returns whether a file was removed.
pub fn remove_binary(paths: &Paths, name: &str) -> Result<bool> {
    let path = paths.installed_binary(name);
    if !path.is_file() {
        return Ok(false);
    }
    tracing::info!("Removing binary {}...", path.display());
    fs::remove_file(&path).at(&path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::sniff::fixtures::elf64;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        paths: Paths,
        caps: Capabilities,
        github: GitHubClient,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::new(tmp.path().join("kelp"), None);
        paths.ensure_dirs().unwrap();
        Fixture {
            _tmp: tmp,
            paths,
            caps: Capabilities::from_parts("linux", "x86_64").unwrap(),
            // never contacted: every test pre-seeds the cache
            github: GitHubClient::new(Settings {
                api_url: "http://127.0.0.1:9".to_string(),
                token: None,
            }),
        }
    }

    fn tar_gz(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data.as_slice()).unwrap();
        }
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&builder.into_inner().unwrap()).unwrap();
        enc.finish().unwrap()
    }

    #[tokio::test]
    async fn test_http_package_installs_from_cached_archive() {
        let fx = fixture();
        let url = "https://example.com/releases/v1.2.0/tool_linux_amd64.tar.gz";
        fs::write(
            fx.paths.cached_artifact("tool_linux_amd64.tar.gz"),
            tar_gz(&[
                ("tool_1.2.0/tool", elf64(2, 1)),
                ("tool_1.2.0/LICENSE", b"MIT".to_vec()),
            ]),
        )
        .unwrap();

        let pkg = Package::new("acme", "tool", url);
        let installer = Installer::new(&fx.caps, &fx.paths, &fx.github);
        let installed = installer.install(&pkg, url).await.unwrap();

        assert_eq!(installed, vec![fx.paths.bin.join("tool")]);
        assert!(!fx.paths.bin.join("LICENSE").exists());
    }

    #[tokio::test]
    async fn test_bare_binary_uses_binary_alias() {
        let fx = fixture();
        let url = "https://example.com/dl/direnv.linux-amd64";
        fs::write(fx.paths.cached_artifact("direnv.linux-amd64"), elf64(2, 1)).unwrap();

        let mut pkg = Package::new("direnv", "direnv", url);
        pkg.binary_alias = "de".to_string();
        let installer = Installer::new(&fx.caps, &fx.paths, &fx.github);
        let installed = installer.install(&pkg, url).await.unwrap();

        assert_eq!(installed, vec![fx.paths.bin.join("de")]);
    }

    #[tokio::test]
    async fn test_archive_without_executables_fails() {
        let fx = fixture();
        let url = "https://example.com/dl/docs_linux.tar.gz";
        fs::write(
            fx.paths.cached_artifact("docs_linux.tar.gz"),
            tar_gz(&[("README.md", b"hello".to_vec())]),
        )
        .unwrap();

        let pkg = Package::new("acme", "docs", url);
        let err = Installer::new(&fx.caps, &fx.paths, &fx.github)
            .install(&pkg, url)
            .await
            .unwrap_err();
        assert!(matches!(err, KelpError::NoExecutable { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_cached_archive_is_evicted() {
        let fx = fixture();
        let url = "https://example.com/dl/tool_linux_amd64.tar.gz";
        let cached = fx.paths.cached_artifact("tool_linux_amd64.tar.gz");
        fs::write(&cached, b"<html>bad gateway</html>").unwrap();

        let pkg = Package::new("acme", "tool", url);
        let err = Installer::new(&fx.caps, &fx.paths, &fx.github)
            .install(&pkg, url)
            .await
            .unwrap_err();

        assert!(matches!(err, KelpError::Extract { .. }));
        assert!(!cached.exists());
    }

    #[tokio::test]
    async fn test_dmg_is_rejected_and_kept_in_cache() {
        let fx = fixture();
        let url = "https://example.com/dl/Tool-darwin.dmg";
        let cached = fx.paths.cached_artifact("Tool-darwin.dmg");
        fs::write(&cached, b"koly").unwrap();

        let pkg = Package::new("acme", "tool", url);
        let err = Installer::new(&fx.caps, &fx.paths, &fx.github)
            .install(&pkg, url)
            .await
            .unwrap_err();
        assert!(matches!(err, KelpError::UnsupportedFormat(_)));
        assert!(cached.exists());
    }

    #[test]
    fn test_evict_tolerates_missing_artifact() {
        let fx = fixture();
        let cached = fx.paths.cached_artifact("gone.tar.gz");
        fs::write(&cached, b"x").unwrap();

        evict(&cached);
        assert!(!cached.exists());
        // a second eviction fails inside and is only logged
        evict(&cached);
    }

    #[test]
    fn test_remove_binary() {
        let fx = fixture();
        fs::write(fx.paths.installed_binary("rg"), b"x").unwrap();

        assert!(remove_binary(&fx.paths, "rg").unwrap());
        assert!(!fx.paths.installed_binary("rg").exists());
        assert!(!remove_binary(&fx.paths, "rg").unwrap());
    }
}
