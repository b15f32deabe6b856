//! # vmprobe_iac
//!
//! Terraform lifecycle orchestration for vmprobe.
//!
//! This crate wraps the terraform CLI (on the host or in a container) and
//! prepares the isolated working directory each invocation runs in.
//!
//! ## Features
//!
//! - `init`, `apply`, `output` and `destroy` with typed errors
//! - Retryable-error policy for transient provider failures
//! - Per-invocation workspace copies so state files are never shared
//! - JSON var files, credentials passed only through the environment
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vmprobe_iac::{Terraform, TerraformOptions, Workspace};
//! use vmprobe_runner::{CliRunner, CliRunnerOptions};
//!
//! # async fn run() -> vmprobe_iac::IacResult<()> {
//! let workspace = Workspace::isolate(Path::new("./proxmox_env/micro_env"))?;
//! let mut vars = serde_json::Map::new();
//! vars.insert("name_vm".into(), "test".into());
//! let var_file = workspace.write_var_file(&vars)?;
//!
//! let runner = Arc::new(CliRunner::new(CliRunnerOptions::default()));
//! let terraform = Terraform::new(runner, TerraformOptions::new(workspace.path()).var_file(var_file))?;
//!
//! terraform.init_and_apply().await?;
//! println!("vm_id = {}", terraform.output("vm_id").await?);
//! terraform.destroy().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod retry;
pub mod terraform;
pub mod workspace;

pub use error::{IacError, IacResult};
pub use options::{TerraformBinary, TerraformOptions};
pub use retry::{default_retryable_errors, CompiledRetryPolicy, RetryPolicy};
pub use terraform::{Terraform, TerraformResult};
pub use workspace::{validate_bundle, Workspace, VAR_FILE_NAME};
