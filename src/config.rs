use crate::error::{IoContext, KelpError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = ".kelp";
pub const BIN_DIR_NAME: &str = "bin";
pub const CACHE_DIR_NAME: &str = "cache";
pub const CONFIG_FILE_NAME: &str = "kelp.json";

pub const HOME_ENV: &str = "KELP_HOME";
pub const CONFIG_ENV: &str = "KELP_CONFIG";
pub const API_URL_ENV: &str = "KELP_GITHUB_API_URL";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Managed directories and the registry file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub bin: PathBuf,
    pub cache: PathBuf,
    pub config_file: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>, config_file: Option<PathBuf>) -> Self {
        let root = root.into();
        let config_file = config_file.unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
        Self {
            bin: root.join(BIN_DIR_NAME),
            cache: root.join(CACHE_DIR_NAME),
            root,
            config_file,
        }
    }

    /// Resolves paths from `$KELP_HOME` (falling back to `~/.kelp`) and an
    /// optional config override coming from `--config` or `$KELP_CONFIG`.
    pub fn resolve(config_override: Option<PathBuf>) -> Result<Self> {
        let root = match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => dirs::home_dir()
                .ok_or_else(|| KelpError::Config("Could not determine home directory".into()))?
                .join(APP_DIR_NAME),
        };
        let paths = Self::new(root, config_override);
        tracing::debug!("Kelp root: {}", paths.root.display());
        tracing::debug!("Config file: {}", paths.config_file.display());
        Ok(paths)
    }

    /// Creates root, `bin/` and `cache/`. Returns the directories it had to
    /// create.
    pub fn ensure_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in [&self.root, &self.cache, &self.bin] {
            if !dir.is_dir() {
                fs::create_dir_all(dir).at(dir)?;
                created.push(dir.clone());
            }
        }
        Ok(created)
    }

    pub fn cached_artifact(&self, file_name: &str) -> PathBuf {
        self.cache.join(file_name)
    }

    pub fn installed_binary(&self, name: &str) -> PathBuf {
        self.bin.join(name)
    }

    pub fn is_managed(&self, path: &Path) -> bool {
        path.starts_with(&self.bin)
    }
}

/// Release API access settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let token = std::env::var(TOKEN_ENV).ok().filter(|v| !v.is_empty());
        Self { api_url, token }
    }
}
