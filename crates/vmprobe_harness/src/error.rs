//! Error types for the verification harness.

use serde::Serialize;
use thiserror::Error;

use vmprobe_iac::IacError;

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that abort an invocation's validation phase.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Provisioning failed: {0}")]
    Provisioning(#[source] IacError),

    #[error("Output read failed: {0}")]
    OutputRead(#[source] IacError),

    #[error("Teardown failed: {0}")]
    Teardown(#[source] IacError),

    #[error("Invocation exceeded its {0} second budget")]
    Timeout(u64),

    #[error("Missing credentials: {0}")]
    Credentials(String),

    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("IaC error: {0}")]
    Iac(#[from] IacError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Classify a lifecycle error raised by the Terraform wrapper.
    pub fn from_iac(err: IacError) -> Self {
        if err.is_provisioning() {
            Self::Provisioning(err)
        } else if err.is_output_read() {
            Self::OutputRead(err)
        } else if matches!(err, IacError::DestroyFailed(_)) {
            Self::Teardown(err)
        } else {
            Self::Iac(err)
        }
    }

    /// Kind label used in reports.
    pub fn kind(&self) -> FatalKind {
        match self {
            Self::Provisioning(_) => FatalKind::Provisioning,
            Self::OutputRead(_) => FatalKind::OutputRead,
            Self::Timeout(_) => FatalKind::Timeout,
            _ => FatalKind::Other,
        }
    }
}

/// Category of the error that ended validation early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalKind {
    Provisioning,
    OutputRead,
    Timeout,
    Other,
}

/// An output that was read successfully but did not match.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: expected {expected}, got {actual:?}")]
pub struct AssertionFailure {
    pub field: String,
    pub expected: String,
    pub actual: String,
}
