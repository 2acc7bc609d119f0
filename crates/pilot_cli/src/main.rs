//! stackpilot CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Configuration error
//! - 3: Missing dependency or credentials
//! - 4: Remote operation failure

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pilot_config::DeployConfig;
use pilot_core::{ErrorCategory, LocalPackager, Orchestrator, PilotError};
use pilot_runner::{AwsCliClient, AwsCliOptions, SystemToolProbe};

mod cli;
mod render;

use cli::Cli;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const CONFIG_ERROR: u8 = 2;
    pub const DEPENDENCY_ERROR: u8 = 3;
    pub const REMOTE_ERROR: u8 = 4;
}

const LOG_TARGETS: [&str; 4] = ["stackpilot", "pilot_config", "pilot_core", "pilot_runner"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let default_filter = std::iter::once("warn".to_string())
        .chain(LOG_TARGETS.iter().map(|t| format!("{}={}", t, level)))
        .collect::<Vec<_>>()
        .join(",");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    match execute(cli).await {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = DeployConfig::load(&cli.config).map_err(PilotError::from)?;
    debug!("Loaded {} ({:?} layout)", config.path().display(), config.layout());

    let mut options = AwsCliOptions::new(&config.shared().region);
    if let Some(profile) = &cli.profile {
        options = options.profile(profile);
    }
    if cli.dry_run {
        options = options.dry_run();
    }

    let mut orchestrator = Orchestrator::new(
        Arc::new(AwsCliClient::new(options)),
        Arc::new(SystemToolProbe),
        Arc::new(LocalPackager::new()),
    );
    if let Some(dir) = &cli.content_dir {
        orchestrator = orchestrator.with_content_dir(dir);
    }

    let run = orchestrator
        .run(&config, cli.action, cli.environment.as_deref())
        .await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&run).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        render::print_run(&run);
    }
    Ok(())
}

/// Map an error to its exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<PilotError>().map(PilotError::category) {
        Some(ErrorCategory::Configuration) => ExitCodes::CONFIG_ERROR,
        Some(ErrorCategory::Dependency) => ExitCodes::DEPENDENCY_ERROR,
        Some(ErrorCategory::RemoteOperation) => ExitCodes::REMOTE_ERROR,
        None => ExitCodes::GENERAL_ERROR,
    }
}
