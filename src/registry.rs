//! The JSON-backed list of installed packages.
//!
//! The config file is the single source of truth. It is read whole and
//! rewritten whole; there is no locking, so two concurrent invocations race
//! and the last save wins.

use crate::error::{IoContext, KelpError, Result};
use crate::types::Package;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub path: PathBuf,
    pub packages: Vec<Package>,
}

/// Field changes requested by `set`. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageUpdate {
    pub release: Option<String>,
    pub description: Option<String>,
    pub binary_alias: Option<String>,
}

impl Registry {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            packages: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KelpError::Config(format!(
                "config file {} does not exist, run `kelp init` first",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).at(path)?;
        let packages: Option<Vec<Package>> = serde_json::from_str(&content).map_err(|e| {
            KelpError::Config(format!("could not parse {}: {}", path.display(), e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            packages: packages.unwrap_or_default(),
        })
    }

    /// Writes the full registry to a sibling temp file and renames it over the
    /// config, so a failed save leaves the previous file intact.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).at(&dir)?;

        let content = serde_json::to_string_pretty(&self.packages)
            .map_err(|e| KelpError::Config(format!("could not serialize config: {}", e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).at(&dir)?;
        tmp.write_all(content.as_bytes()).at(tmp.path())?;
        tmp.write_all(b"\n").at(tmp.path())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).at(tmp.path())?;
        }

        tmp.persist(&self.path)
            .map_err(|e| KelpError::io(&self.path, e.error))?;
        tracing::info!("Config saved to {}", self.path.display());
        Ok(())
    }

    /// Resolves `owner/repo` exactly, or a bare `repo` when exactly one record
    /// carries that repo name.
    pub fn find_index(&self, query: &str) -> Result<usize> {
        if let Some((owner, repo)) = query.split_once('/') {
            return self
                .packages
                .iter()
                .position(|p| p.owner == owner && p.repo == repo)
                .ok_or_else(|| KelpError::PackageNotFound(query.to_string()));
        }

        let matches: Vec<usize> = self
            .packages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.repo == query)
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => Err(KelpError::PackageNotFound(query.to_string())),
            [index] => Ok(*index),
            many => Err(KelpError::AmbiguousPackage {
                query: query.to_string(),
                candidates: many.iter().map(|i| self.packages[*i].full_name()).collect(),
            }),
        }
    }

    pub fn find(&self, query: &str) -> Result<&Package> {
        let index = self.find_index(query)?;
        Ok(&self.packages[index])
    }

    pub fn add(&mut self, owner: &str, repo: &str, release: &str) -> Result<&Package> {
        if self
            .packages
            .iter()
            .any(|p| p.owner == owner && p.repo == repo)
        {
            return Err(KelpError::PackageExists {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }

        self.packages.push(Package::new(owner, repo, release));
        tracing::info!("Added {}/{} at {}", owner, repo, release);
        Ok(&self.packages[self.packages.len() - 1])
    }

    pub fn remove(&mut self, query: &str) -> Result<Package> {
        let index = self.find_index(query)?;
        let removed = self.packages.remove(index);
        tracing::info!("Package {} removed", removed.full_name());
        Ok(removed)
    }

    /// Applies `update` in place. `UpdatedAt` is refreshed only when some
    /// field actually changes; returns whether anything did.
    pub fn set(&mut self, query: &str, update: &PackageUpdate) -> Result<bool> {
        let index = self.find_index(query)?;
        let pkg = &mut self.packages[index];

        let mut changed = false;
        for (field, value) in [
            (&mut pkg.release, &update.release),
            (&mut pkg.description, &update.description),
            (&mut pkg.binary_alias, &update.binary_alias),
        ] {
            if let Some(value) = value {
                if *field != *value {
                    *field = value.clone();
                    changed = true;
                }
            }
        }

        if changed {
            pkg.updated_at = Utc::now();
            tracing::info!("Updated {}", pkg.full_name());
        } else {
            tracing::debug!("No changes for {}", pkg.full_name());
        }
        Ok(changed)
    }

    /// Records sorted by `UpdatedAt`, oldest first. The stored order is left
    /// untouched.
    pub fn list(&self) -> Vec<&Package> {
        let mut view: Vec<&Package> = self.packages.iter().collect();
        view.sort_by_key(|p| p.updated_at);
        view
    }
}
