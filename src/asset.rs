//! Pure predicates over a release artifact's download URL.
//!
//! Artifact naming is not standardized, so every check is a case-insensitive
//! substring or suffix test on the URL.

use crate::platform::{Capabilities, OsFamily};
use crate::types::{file_name_from_url, Asset};

pub const DOWNLOADABLE_EXTENSIONS: &[&str] =
    &[".zip", ".tar", ".gz", ".xz", ".dmg", ".pkg", ".tgz", ".bz2"];

const MAC_TOKENS: &[&str] = &["mac", "macos", "darwin", "osx", "apple"];
const LINUX_TOKENS: &[&str] = &["linux"];

/// Longest trailing segment still considered a file extension.
const MAX_EXTENSION_LEN: usize = 8;

impl Asset {
    fn url_lower(&self) -> String {
        self.browser_download_url.to_lowercase()
    }

    pub fn is_downloadable_archive(&self) -> bool {
        let url = self.url_lower();
        DOWNLOADABLE_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
    }

    pub fn has_no_extension(&self) -> bool {
        extension(file_name_from_url(&self.browser_download_url)).is_none()
    }

    pub fn matches_os(&self, caps: &Capabilities) -> bool {
        let tokens = match caps.os {
            OsFamily::MacOs => MAC_TOKENS,
            OsFamily::Linux => LINUX_TOKENS,
        };
        let url = self.url_lower();
        tokens.iter().any(|token| url.contains(token))
    }

    pub fn matches_architecture(&self, caps: &Capabilities) -> bool {
        let url = self.url_lower();
        let arch = caps.arch.to_lowercase();

        url.contains(&arch)
            || (arch == "amd64" && url.contains("x86_64"))
            || (arch == "arm64" && url.contains("aarch64"))
    }
}

/// The extension of a file name: the text after the last `.`, provided it is
/// short and purely alphanumeric. `direnv.darwin-arm64` has none.
pub fn extension(file_name: &str) -> Option<&str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
