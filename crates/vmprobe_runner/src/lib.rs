//! # vmprobe_runner
//!
//! Process execution layer for vmprobe.
//!
//! Every call to the infrastructure tool goes through a [`ProcessRunner`],
//! which keeps the lifecycle code independent of how the tool is launched.
//!
//! # Features
//!
//! - **Host Runner**: spawns the tool with `tokio::process`, with timeouts
//! - **Container Mode**: wraps commands in `docker run` / `podman run`
//! - **Dry-Run Mode**: log commands without executing them
//! - **CI Integration**: timestamped, stream-tagged log lines
//! - **Secret Redaction**: credential env values never reach the logs
//! - **Mock Runner**: scripted responses for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use vmprobe_runner::{CliRunner, CliRunnerOptions, CommandSpec, ProcessRunner, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliRunner::new(CliRunnerOptions::default());
//!
//!     let spec = CommandSpec::new("terraform")
//!         .args(["init", "-input=false"])
//!         .workdir("./infra");
//!
//!     let result = runner.run(&spec, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod mock;
pub mod runner;

pub use cli::{CliRunner, CliRunnerOptions, LogHandler, LogLine, LogStream};
pub use config::{CommandSpec, RunConfig};
pub use container::{ContainerConfig, ContainerRuntime, MountConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{ExecutionResult, ProcessRunner};
