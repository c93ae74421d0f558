//! CLI command implementations
//!
//! Every command runs once on a current-thread runtime and writes exactly
//! one JSON object to stdout. A run id ties its log lines together.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::args::{Cli, Command, ConnectionArgs};
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use crate::initializer::SchemaInitializer;
use crate::manifest::Manifest;
use crate::observability::{self, Event};
use crate::target::{MongoTarget, SchemaTarget};

/// Parse arguments, start logging, run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    observability::init(&cli.log_level)?;
    run_command(&cli)
}

/// Run the selected command and write its response
pub fn run_command(cli: &Cli) -> CliResult<()> {
    let command = cli.resolved_command();
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id, command = ?command);
    let _guard = span.enter();

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
        .and_then(|rt| rt.block_on(connect_and_execute(command, &cli.connection)));

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(&e)?;
            Err(e)
        }
    }
}

async fn connect_and_execute(command: Command, args: &ConnectionArgs) -> CliResult<Value> {
    if command == Command::Manifest {
        return manifest_response(args);
    }

    let config = Config::resolve(args)?;
    info!(
        event = Event::ConfigLoaded.as_str(),
        uri = %config.redacted_uri(),
        database = %config.database,
        "configuration loaded"
    );

    let manifest = Manifest::bbeams_in(&config.database);
    let target = MongoTarget::new(config.client_options().await?, &config.database)?;
    let initializer = SchemaInitializer::new(target);
    initializer.check_connection().await?;
    execute(&initializer, command, &manifest).await
}

/// The manifest for the configured database. Connection settings are not
/// checked.
fn manifest_response(args: &ConnectionArgs) -> CliResult<Value> {
    let config = Config::resolve_offline(args)?;
    let manifest = Manifest::bbeams_in(&config.database);
    manifest.validate()?;
    Ok(serde_json::to_value(&manifest)?)
}

/// Runs a command against an initializer, returning the response data
pub async fn execute<T: SchemaTarget>(
    initializer: &SchemaInitializer<T>,
    command: Command,
    manifest: &Manifest,
) -> CliResult<Value> {
    let data = match command {
        Command::Apply => serde_json::to_value(initializer.apply(manifest).await?)?,
        Command::Plan => serde_json::to_value(initializer.plan(manifest).await?)?,
        Command::Verify => serde_json::to_value(initializer.verify(manifest).await?)?,
        Command::Manifest => serde_json::to_value(manifest)?,
    };
    Ok(data)
}
