use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One package record as persisted in the config file.
///
/// Keys are PascalCase on disk. Every field has a default so older or
/// hand-written files keep loading when fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub release: String,
    #[serde(default = "zero_time")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "Binary")]
    pub binary_alias: String,
}

impl Package {
    pub fn new(owner: &str, repo: &str, release: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            release: release.to_string(),
            updated_at: Utc::now(),
            description: String::new(),
            binary_alias: String::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Name of the executable this package puts on PATH.
    pub fn binary_name(&self) -> &str {
        if self.binary_alias.is_empty() {
            &self.repo
        } else {
            &self.binary_alias
        }
    }

    /// Packages pinned to a direct download URL instead of a release tag.
    pub fn is_http(&self) -> bool {
        self.release.starts_with("http")
    }

    pub fn has_zero_timestamp(&self) -> bool {
        self.updated_at == zero_time()
    }
}

/// `0001-01-01T00:00:00Z`, the timestamp of a record that never had one.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(-62_135_596_800, 0).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A downloadable release artifact. Only `browser_download_url` drives
/// selection; the rest is carried along for logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn from_url(url: &str) -> Self {
        Self {
            name: file_name_from_url(url).to_string(),
            browser_download_url: url.to_string(),
            size: 0,
            content_type: None,
            created_at: None,
        }
    }
}

/// Final path segment of a URL, without query string or fragment.
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
