//! Command implementations behind the CLI.
//!
//! Each command loads the registry, does its work and saves only when
//! something changed. Errors bubble up to `main`.

use crate::config::Paths;
use crate::error::{IoContext, KelpError, Result};
use crate::github::{project_url, GitHubClient};
use crate::install::{remove_binary, Installer};
use crate::platform::{Capabilities, OsFamily};
use crate::registry::{PackageUpdate, Registry};
use crate::types::Package;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::Command;

const SEED_OWNER: &str = "crhuber";
const SEED_REPO: &str = "kelp";
const SEED_DESCRIPTION: &str = "Simple homebrew alternative";
const DATE_FORMAT: &str = "%b %-d %Y";

/// Everything a command needs from the process environment.
pub struct Context {
    pub caps: &'static Capabilities,
    pub paths: Paths,
    pub github: GitHubClient,
}

impl Context {
    fn registry(&self) -> Result<Registry> {
        Registry::load(&self.paths.config_file)
    }

    fn installer(&self) -> Installer<'_> {
        Installer::new(self.caps, &self.paths, &self.github)
    }
}

/// Splits `owner/repo`. Both halves must be non-empty and the repo must not
/// contain another `/`.
pub fn parse_project(project: &str) -> Result<(&str, &str)> {
    match project.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(KelpError::InvalidPackageSpec(project.to_string())),
    }
}

pub async fn add(ctx: &Context, project: &str, release: &str, install: bool) -> Result<()> {
    let (owner, repo) = parse_project(project)?;
    let mut registry = ctx.registry()?;
    if registry.find_index(project).is_ok() {
        return Err(KelpError::PackageExists {
            owner: owner.to_string(),
            repo: repo.to_string(),
        });
    }

    let release = if release == "latest" {
        tracing::info!("Resolving latest release of {}...", project);
        ctx.github.latest_tag(owner, repo).await?
    } else {
        release.to_string()
    };

    let pkg = registry.add(owner, repo, &release)?.clone();
    registry.save()?;
    println!("Package {} added at {}", pkg.full_name(), pkg.release);

    if install {
        ctx.installer().install(&pkg, &pkg.release).await?;
    }
    Ok(())
}

pub async fn install(ctx: &Context, project: &str) -> Result<()> {
    let registry = ctx.registry()?;
    let pkg = registry.find(project)?;
    ctx.installer().install(pkg, &pkg.release).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The configured release already is the latest one.
    UpToDate,
    Updated { previous: String },
    Declined,
}

/// Moves the package's release to `latest` if `confirm(latest, current)`
/// agrees. The registry is modified in memory only.
pub fn apply_update(
    registry: &mut Registry,
    project: &str,
    latest: &str,
    confirm: &mut dyn FnMut(&str, &str) -> bool,
) -> Result<UpdateOutcome> {
    let pkg = registry.find(project)?;
    if pkg.is_http() {
        return Err(KelpError::HttpPackageUpdate(pkg.full_name()));
    }
    if pkg.release == latest {
        return Ok(UpdateOutcome::UpToDate);
    }

    let previous = pkg.release.clone();
    if !confirm(latest, &previous) {
        return Ok(UpdateOutcome::Declined);
    }

    let update = PackageUpdate {
        release: Some(latest.to_string()),
        ..Default::default()
    };
    registry.set(project, &update)?;
    Ok(UpdateOutcome::Updated { previous })
}

pub async fn update(
    ctx: &Context,
    project: &str,
    install: bool,
    confirm: &mut dyn FnMut(&str, &str) -> bool,
) -> Result<()> {
    let mut registry = ctx.registry()?;
    let pkg = registry.find(project)?.clone();
    if pkg.is_http() {
        return Err(KelpError::HttpPackageUpdate(pkg.full_name()));
    }

    let latest = ctx.github.latest_tag(&pkg.owner, &pkg.repo).await?;
    match apply_update(&mut registry, project, &latest, confirm)? {
        UpdateOutcome::UpToDate => {
            println!(
                "Kelp configured release {} already matches latest release {} for {}",
                pkg.release,
                latest,
                pkg.full_name()
            );
        }
        UpdateOutcome::Updated { previous } => {
            registry.save()?;
            println!("Updated {} from {} to {}", pkg.full_name(), previous, latest);
        }
        UpdateOutcome::Declined => {
            println!("{} left at {}", pkg.full_name(), pkg.release);
            return Ok(());
        }
    }

    if install {
        ctx.installer().install(&pkg, &latest).await?;
    }
    Ok(())
}

/// Asks on stdin whether to move from `current` to `latest`.
pub fn prompt_confirm(latest: &str, current: &str) -> bool {
    print!(
        "Latest release {}. Kelp configured release {}. Update config [y/n] ? : ",
        latest, current
    );
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn remove(ctx: &Context, project: &str) -> Result<()> {
    let mut registry = ctx.registry()?;
    let removed = registry.remove(project)?;
    registry.save()?;
    println!("Package {} removed from config", removed.full_name());

    if remove_binary(&ctx.paths, removed.binary_name())? {
        println!("Removed {}", ctx.paths.installed_binary(removed.binary_name()).display());
    }
    Ok(())
}

/// Release column for `list`. Http packages show the version parsed out of
/// their URL.
pub fn display_release(release: &str) -> String {
    if !release.starts_with("http") {
        return release.to_string();
    }
    match version_from_url(release) {
        Some(version) => format!("{} (https)", version),
        None => "unknown (https)".to_string(),
    }
}

fn version_from_url(url: &str) -> Option<String> {
    let re = regex::Regex::new(r"[/v-](\d[\d.]*)").ok()?;
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

pub fn display_date(pkg: &Package) -> String {
    if pkg.has_zero_timestamp() {
        String::new()
    } else {
        pkg.updated_at.format(DATE_FORMAT).to_string()
    }
}

/// Left-aligned columns separated by two spaces, trailing blanks trimmed.
fn render_table(rows: &[[String; 3]]) -> String {
    let mut widths = [0usize; 3];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let line = format!(
            "{:<w0$}  {:<w1$}  {}",
            row[0],
            row[1],
            row[2],
            w0 = widths[0],
            w1 = widths[1]
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn format_list(registry: &Registry) -> String {
    let rows: Vec<[String; 3]> = registry
        .list()
        .into_iter()
        .map(|pkg| [pkg.full_name(), display_release(&pkg.release), display_date(pkg)])
        .collect();
    render_table(&rows)
}

pub fn list(ctx: &Context) -> Result<()> {
    let registry = ctx.registry()?;
    if registry.packages.is_empty() {
        println!("No packages configured, add one with `kelp add owner/repo`");
        return Ok(());
    }
    print!("{}", format_list(&registry));
    Ok(())
}

pub fn describe(pkg: &Package) -> String {
    format!(
        "[{}]\nRelease: {}\nDescription: {}\nUrl: {}\nBinary: {}\nUpdated At: {}\n",
        pkg.full_name(),
        pkg.release,
        pkg.description,
        project_url(&pkg.owner, &pkg.repo),
        pkg.binary_alias,
        display_date(pkg)
    )
}

pub fn get(ctx: &Context, project: &str) -> Result<()> {
    let registry = ctx.registry()?;
    print!("{}", describe(registry.find(project)?));
    Ok(())
}

pub fn set(ctx: &Context, project: &str, update: &PackageUpdate) -> Result<()> {
    let mut registry = ctx.registry()?;
    if registry.set(project, update)? {
        registry.save()?;
        println!("Package {} updated", registry.find(project)?.full_name());
    } else {
        println!("No changes to {}", project);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryStatus {
    Installed(PathBuf),
    /// Found on PATH, but not in the kelp bin directory.
    Unmanaged(PathBuf),
    Missing,
}

impl std::fmt::Display for BinaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryStatus::Installed(_) => write!(f, "Installed"),
            BinaryStatus::Unmanaged(path) => {
                write!(f, "Installed outside kelp ({})", path.display())
            }
            BinaryStatus::Missing => write!(f, "Binary not found"),
        }
    }
}

pub fn binary_status(
    paths: &Paths,
    name: &str,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> BinaryStatus {
    match lookup(name) {
        Some(path) if paths.is_managed(&path) => BinaryStatus::Installed(path),
        Some(path) => BinaryStatus::Unmanaged(path),
        None => BinaryStatus::Missing,
    }
}

pub fn doctor(ctx: &Context) -> Result<()> {
    let registry = ctx.registry()?;
    println!("Checking {} packages...", registry.packages.len());
    for pkg in &registry.packages {
        let status = binary_status(&ctx.paths, pkg.binary_name(), |name| which::which(name).ok());
        println!("{:<40} {}", pkg.full_name(), status);
    }

    let bin = &ctx.paths.bin;
    let on_path = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir == *bin))
        .unwrap_or(false);
    if !on_path {
        tracing::warn!("{} is not on PATH", bin.display());
    }
    Ok(())
}

/// Creates the kelp directories and seeds a config file if none exists.
/// Returns whether the config file was written.
pub fn init_paths(paths: &Paths) -> Result<bool> {
    for dir in paths.ensure_dirs()? {
        println!("Created {}", dir.display());
    }

    if paths.config_file.exists() {
        println!("Config file {} already exists", paths.config_file.display());
        return Ok(false);
    }

    let mut registry = Registry::empty(paths.config_file.clone());
    registry.add(SEED_OWNER, SEED_REPO, "latest")?;
    registry.set(
        &format!("{}/{}", SEED_OWNER, SEED_REPO),
        &PackageUpdate {
            description: Some(SEED_DESCRIPTION.to_string()),
            ..Default::default()
        },
    )?;
    registry.save()?;
    println!("Created config file {}", paths.config_file.display());
    Ok(true)
}

pub fn init(ctx: &Context) -> Result<()> {
    init_paths(&ctx.paths)?;
    println!("Add kelp to your PATH by running:");
    println!("  export PATH={}:$PATH", ctx.paths.bin.display());
    Ok(())
}

fn opener(caps: &Capabilities) -> &'static str {
    match caps.os {
        OsFamily::MacOs => "open",
        OsFamily::Linux => "xdg-open",
    }
}

fn open_target(caps: &Capabilities, target: &str) -> Result<()> {
    let program = opener(caps);
    tracing::info!("Opening {} with {}", target, program);
    let status = Command::new(program).arg(target).status().at(program)?;
    if !status.success() {
        tracing::warn!("{} {} exited with {}", program, target, status);
    }
    Ok(())
}

pub fn browse(ctx: &Context, project: &str) -> Result<()> {
    let registry = ctx.registry()?;
    let pkg = registry.find(project)?;
    open_target(ctx.caps, &project_url(&pkg.owner, &pkg.repo))
}

pub fn inspect(ctx: &Context) -> Result<()> {
    open_target(ctx.caps, &ctx.paths.root.to_string_lossy())
}
