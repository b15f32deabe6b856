//! vmprobe CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or scenario
//! - 3: Assertion failure
//! - 4: Missing credentials
//! - 5: IaC error (provisioning, output read, teardown, timeout)

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmprobe_harness::{FatalKind, HarnessError};
use vmprobe_iac::IacError;

mod commands;

use commands::{Cli, Commands, Context, ScenarioFailed};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const ASSERTION_FAILURE: u8 = 3;
    pub const CREDENTIALS_ERROR: u8 = 4;
    pub const IAC_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    let ctx = Context {
        json: cli.json,
        dry_run: cli.dry_run,
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &ctx).await,
        Commands::RenderVars(args) => commands::render_vars::execute(args, &ctx).await,
        Commands::Check(args) => commands::check::execute(args, &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so `--json` reports on stdout stay parseable.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "warn,vmprobe=debug"
    } else {
        "warn,vmprobe=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(failed) = e.downcast_ref::<ScenarioFailed>() {
        return match failed.fatal {
            _ if failed.is_assertion_failure() => ExitCodes::ASSERTION_FAILURE,
            Some(FatalKind::Other) => ExitCodes::GENERAL_ERROR,
            _ => ExitCodes::IAC_ERROR,
        };
    }
    if let Some(err) = e.downcast_ref::<HarnessError>() {
        return match err {
            HarnessError::Credentials(_) => ExitCodes::CREDENTIALS_ERROR,
            HarnessError::Scenario(_) | HarnessError::Yaml(_) => ExitCodes::INVALID_ARGS,
            HarnessError::Io(_) | HarnessError::InvalidTransition { .. } => {
                ExitCodes::GENERAL_ERROR
            }
            _ => ExitCodes::IAC_ERROR,
        };
    }
    if e.downcast_ref::<IacError>().is_some() {
        return ExitCodes::IAC_ERROR;
    }
    ExitCodes::GENERAL_ERROR
}
