//! # vmprobe_harness
//!
//! Declarative infrastructure verification for vmprobe.
//!
//! Provisions a VM through Terraform, checks the outputs it exposes, and
//! tears it down again on every exit path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vmprobe_harness::{Credentials, Expectations, Invocation, Scenario};
//! use vmprobe_runner::{CliRunner, CliRunnerOptions};
//!
//! # async fn run() -> vmprobe_harness::HarnessResult<()> {
//! let credentials = Credentials::from_env()?;
//! let scenario = Scenario::new("micro-vm", "proxmox_env/micro_env")
//!     .with_expectations(Expectations::default().with_status("stopped"));
//!
//! let runner = Arc::new(CliRunner::new(CliRunnerOptions::default()));
//! let report = Invocation::new(scenario, credentials).run(runner).await?;
//!
//! print!("{}", report.render());
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod expect;
pub mod invocation;
pub mod lifecycle;
pub mod params;
pub mod report;
pub mod scenario;

pub use credentials::Credentials;
pub use error::{AssertionFailure, FatalKind, HarnessError, HarnessResult};
pub use expect::{Expectation, Expectations, OutputCheck};
pub use invocation::Invocation;
pub use lifecycle::{
    provisioned_scope, BodyOutcome, Lifecycle, Phase, ScopeOutcome, TeardownOutcome,
};
pub use params::{Disk, Initialization, NetworkDevice, OsType, VmParameters};
pub use report::{CheckResult, FatalError, TestReport};
pub use scenario::{ContainerSettings, Scenario, TerraformSettings};
