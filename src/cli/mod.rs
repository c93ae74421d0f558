//! CLI module for bbeams-provision
//!
//! Provides command-line interface for:
//! - apply: create missing collections and indexes
//! - plan: read-only reconciliation
//! - verify: fail unless converged
//! - manifest: print the declared schema

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command, ConnectionArgs};
pub use commands::{execute, run, run_command};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_response, response, write_error, write_response};
