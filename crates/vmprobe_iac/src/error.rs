//! Error types for IaC module.

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur during IaC operations.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Terraform not available: {0}")]
    TerraformNotAvailable(String),

    #[error("Invalid configuration bundle: {0}")]
    InvalidBundle(String),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform output '{name}' not found: {message}")]
    OutputMissing { name: String, message: String },

    #[error("Terraform output '{name}' unreadable: {message}")]
    OutputParse { name: String, message: String },

    #[error("Terraform destroy failed: {0}")]
    DestroyFailed(String),

    #[error("Invalid retryable error pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Runner error: {0}")]
    Runner(#[from] vmprobe_runner::RunnerError),

    #[error("Workspace copy failed: {0}")]
    Copy(#[from] fs_extra::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IacError {
    /// Whether the error was raised while acquiring infrastructure.
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::InitFailed(_) | Self::ApplyFailed(_) | Self::TerraformNotAvailable(_)
        )
    }

    /// Whether the error was raised while reading outputs.
    pub fn is_output_read(&self) -> bool {
        matches!(self, Self::OutputMissing { .. } | Self::OutputParse { .. })
    }
}
