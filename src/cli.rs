use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // A git tag at HEAD means a release build
    if let Some(tag) = option_env!("KELP_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("KELP_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("KELP_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup to satisfy clap's &'static str
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "kelp")]
#[command(about = "A personal package manager for GitHub Releases binaries")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the kelp config file
    #[arg(short, long, global = true, env = crate::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new package to config
    Add {
        /// GitHub repository in 'owner/repo' form
        project: String,
        /// Release tag or direct download URL; 'latest' resolves to the newest tag
        #[arg(short, long, default_value = "latest")]
        release: String,
        /// Also install the package
        #[arg(short, long)]
        install: bool,
    },

    /// Install a configured package
    Install {
        /// Package as 'owner/repo' or 'repo'
        project: String,
    },

    /// Move a package's release to the latest one
    Update {
        /// Package as 'owner/repo' or 'repo'
        project: String,
        /// Also install the package
        #[arg(short, long)]
        install: bool,
        /// Update without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove a package from config and disk
    #[command(visible_alias = "rm")]
    Remove {
        /// Package as 'owner/repo' or 'repo'
        project: String,
    },

    /// List configured packages
    #[command(visible_alias = "ls")]
    List,

    /// Show package details
    Get {
        /// Package as 'owner/repo' or 'repo'
        project: String,
    },

    /// Set package fields in config
    Set {
        /// Package as 'owner/repo' or 'repo'
        project: String,
        /// Release tag or direct download URL
        #[arg(short, long)]
        release: Option<String>,
        /// Description of the package
        #[arg(short, long)]
        description: Option<String>,
        /// Name of the installed binary when it differs from the repo name
        #[arg(short, long)]
        binary: Option<String>,
    },

    /// Check that configured packages are installed
    Doctor,

    /// Create the kelp directories and config file
    Init,

    /// Open a package's GitHub page
    Browse {
        /// Package as 'owner/repo' or 'repo'
        project: String,
    },

    /// Open the kelp directory
    Inspect,
}
