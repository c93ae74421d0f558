//! CLI argument definitions using clap
//!
//! Commands:
//! - bbeams-provision [apply]
//! - bbeams-provision plan
//! - bbeams-provision verify
//! - bbeams-provision manifest
//!
//! Connection flags fall back to the environment variables the application
//! stack already reads (`MONGO_HOST`, `MONGO_USER`, ...).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::observability::DEFAULT_LEVEL;

/// Provision the attendance platform's MongoDB collections and indexes
#[derive(Parser, Debug)]
#[command(name = "bbeams-provision")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log filter directive; `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = DEFAULT_LEVEL)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create missing collections and indexes (default)
    Apply,
    /// Show what apply would do, without writing
    Plan,
    /// Fail unless every declared structure exists as declared
    Verify,
    /// Print the manifest; no database access
    Manifest,
}

/// Connection settings; each overrides the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Full connection string; wins over --host
    #[arg(long, env = "MONGO_URI", global = true, hide_env_values = true)]
    pub uri: Option<String>,

    #[arg(long, env = "MONGO_HOST", global = true)]
    pub host: Option<String>,

    #[arg(long = "user", env = "MONGO_USER", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "MONGO_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "MONGO_AUTH_SOURCE", global = true)]
    pub auth_source: Option<String>,

    #[arg(long, env = "MONGO_DB_NAME", global = true)]
    pub database: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// The command to run; apply when none is given
    pub fn resolved_command(&self) -> Command {
        self.command.unwrap_or(Command::Apply)
    }
}
