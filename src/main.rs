mod asset;
mod cli;
mod commands;
mod config;
mod download;
mod error;
mod extract;
mod github;
mod install;
mod installer;
mod platform;
mod registry;
mod selector;
mod sniff;
mod types;

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use config::{Paths, Settings};
use github::GitHubClient;
use platform::Capabilities;
use registry::PackageUpdate;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    // Unsupported hosts are rejected before any command touches disk
    let caps = Capabilities::current().context("Sorry, your OS is not yet supported")?;
    tracing::debug!(
        "Host {} {} ({})",
        caps.os,
        caps.arch,
        caps.executable_content_type
    );

    let ctx = Context {
        caps,
        paths: Paths::resolve(cli.config.clone()).context("Could not resolve kelp directories")?,
        github: GitHubClient::new(Settings::from_env()),
    };

    match cli.command {
        Commands::Add {
            project,
            release,
            install,
        } => commands::add(&ctx, &project, &release, install)
            .await
            .with_context(|| format!("Failed to add {}", project))?,

        Commands::Install { project } => commands::install(&ctx, &project)
            .await
            .with_context(|| format!("Failed to install {}", project))?,

        Commands::Update {
            project,
            install,
            yes,
        } => {
            let mut confirm = |latest: &str, current: &str| {
                yes || commands::prompt_confirm(latest, current)
            };
            commands::update(&ctx, &project, install, &mut confirm)
                .await
                .with_context(|| format!("Failed to update {}", project))?
        }

        Commands::Remove { project } => commands::remove(&ctx, &project)
            .with_context(|| format!("Failed to remove {}", project))?,

        Commands::List => commands::list(&ctx).context("Failed to list packages")?,

        Commands::Get { project } => commands::get(&ctx, &project)
            .with_context(|| format!("Failed to get {}", project))?,

        Commands::Set {
            project,
            release,
            description,
            binary,
        } => {
            let update = PackageUpdate {
                release,
                description,
                binary_alias: binary,
            };
            commands::set(&ctx, &project, &update)
                .with_context(|| format!("Failed to set fields of {}", project))?
        }

        Commands::Doctor => commands::doctor(&ctx).context("Doctor check failed")?,

        Commands::Init => commands::init(&ctx).context("Failed to initialize kelp")?,

        Commands::Browse { project } => commands::browse(&ctx, &project)
            .with_context(|| format!("Failed to open the page of {}", project))?,

        Commands::Inspect => commands::inspect(&ctx).context("Failed to open the kelp directory")?,
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
