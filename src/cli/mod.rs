//! Command-line interface for pdm
//!
//! This module defines the CLI structure using clap derive macros. Every
//! command is thin orchestration over the library: resolve the filename,
//! consult the checkout registry, mutate the store under the repository
//! mutex, and publish the registry record change.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::OutputOptions;
use crate::store::VersionedStore;

mod admin;
mod checkin;
mod checkout;
mod files;
mod init;
mod locks;

/// pdm - Check-out/check-in coordination for binary CAD artifacts
///
/// Serializes edits to binary artifacts through advisory per-file
/// checkouts, backed by a Git + LFS repository.
#[derive(Parser, Debug)]
#[command(name = "pdm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./pdm.toml)
    #[arg(long, global = true, env = "PDM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identity used for checkouts and commits
    #[arg(long, global = true, env = "PDM_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write pdm.toml and clone the working copy
    Init {
        /// Base URL of the hosting instance, or a plain repository URL/path
        #[arg(long)]
        url: String,

        /// Project path on the hosting instance (e.g., "shop/parts")
        #[arg(long, default_value = "")]
        project: String,

        /// Access token for clone/fetch/push
        #[arg(long)]
        token: Option<String>,

        /// Branch to track
        #[arg(long, default_value = "main")]
        branch: String,

        /// Working copy location (defaults to the per-user data directory)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Skip TLS certificate verification
        #[arg(long)]
        insecure: bool,
    },

    /// List tracked artifacts with lock and revision state
    Files {
        /// Fetch the remote and reset the working copy first
        #[arg(long)]
        refresh: bool,
    },

    /// Check out an artifact for exclusive editing
    Checkout {
        filename: String,

        /// Why the artifact is being checked out
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Check in modified content, bump the revision, and release the lock
    Checkin {
        filename: String,

        /// Commit message describing the change
        #[arg(short, long)]
        message: String,

        /// Path to the new content (defaults to the working copy file)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Revision bump: "major" or "minor"
        #[arg(long, default_value = "minor")]
        rev: String,

        /// Explicit major revision to jump to (with --rev major)
        #[arg(long)]
        major: Option<String>,
    },

    /// Release a checkout without saving changes
    Cancel { filename: String },

    /// Show current checkouts with their durations
    Locks,

    /// Show the version history of an artifact
    History {
        filename: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Download the latest content of an artifact
    Download {
        filename: String,

        /// Destination path (defaults to the filename in the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Create a named alias for an existing artifact
    Link {
        /// Link name (no extension, e.g., "1234567_ABC123")
        name: String,

        /// Filename of the master artifact
        master: String,
    },

    /// Administrative operations
    #[command(subcommand)]
    Admin(AdminCommands),
}

/// Administrative subcommands
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Force-release another user's checkout
    Unlock { filename: String },

    /// Delete an artifact and its metadata
    Delete { filename: String },

    /// Show recent repository activity
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Everything a command needs: configuration, an initialized store, the
/// resolved user identity, and output options.
pub struct CliContext {
    pub config: Config,
    pub store: VersionedStore,
    pub user: String,
    pub output: OutputOptions,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        if let Commands::Init {
            url,
            project,
            token,
            branch,
            work_dir,
            insecure,
        } = &self.command
        {
            return init::run(
                self.config.as_deref(),
                output,
                init::InitOptions {
                    url: url.clone(),
                    project: project.clone(),
                    token: token.clone(),
                    branch: branch.clone(),
                    work_dir: work_dir.clone(),
                    insecure: *insecure,
                },
            );
        }

        let ctx = self.context(output)?;

        match self.command {
            Commands::Init { .. } => unreachable!("handled above"),
            Commands::Files { refresh } => files::run_files(&ctx, refresh),
            Commands::Checkout { filename, message } => {
                checkout::run_checkout(&ctx, &filename, message)
            }
            Commands::Checkin {
                filename,
                message,
                file,
                rev,
                major,
            } => checkin::run(&ctx, &filename, &message, file.as_deref(), &rev, major.as_deref()),
            Commands::Cancel { filename } => checkout::run_cancel(&ctx, &filename),
            Commands::Locks => locks::run(&ctx),
            Commands::History { filename, limit } => files::run_history(&ctx, &filename, limit),
            Commands::Download { filename, out } => {
                files::run_download(&ctx, &filename, out.as_deref())
            }
            Commands::Link { name, master } => files::run_link(&ctx, &name, &master),
            Commands::Admin(AdminCommands::Unlock { filename }) => {
                admin::run_unlock(&ctx, &filename)
            }
            Commands::Admin(AdminCommands::Delete { filename }) => {
                admin::run_delete(&ctx, &filename)
            }
            Commands::Admin(AdminCommands::Activity { limit }) => {
                admin::run_activity(&ctx, limit)
            }
        }
    }

    fn context(&self, output: OutputOptions) -> Result<CliContext> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_from_dir(&std::env::current_dir()?)?,
        };

        let store = VersionedStore::open(&config)?;
        let user = resolve_user(self.user.as_deref());

        Ok(CliContext {
            config,
            store,
            user,
            output,
        })
    }
}

/// Resolve the acting identity: CLI flag, then PDM_USER, then the OS login
/// name, then "unknown".
pub fn resolve_user(cli_user: Option<&str>) -> String {
    if let Some(user) = non_empty(cli_user) {
        return user.to_string();
    }

    for var in ["PDM_USER", "USER", "USERNAME"] {
        if let Ok(value) = std::env::var(var) {
            if let Some(user) = non_empty(Some(&value)) {
                return user.to_string();
            }
        }
    }

    "unknown".to_string()
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Shared resolution: a logical filename to its tracked path.
fn resolve_path(ctx: &CliContext, filename: &str) -> Result<String> {
    ctx.store
        .find_path(filename)?
        .ok_or_else(|| crate::error::Error::NotFound(filename.to_string()))
}

/// Default config path when none was given: ./pdm.toml.
fn default_config_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(CONFIG_FILE))
}
