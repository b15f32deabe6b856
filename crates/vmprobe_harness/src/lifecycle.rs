//! Scoped acquisition of provisioned infrastructure.
//!
//! [`provisioned_scope`] runs `init` + `apply`, hands the applied workspace
//! to a body, and then runs `destroy` exactly once, whether the body
//! returned, failed, timed out or panicked.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

use vmprobe_iac::{IacError, Terraform};

use crate::error::{HarnessError, HarnessResult};

/// Lifecycle phase of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Provisioned,
    Validated,
    Destroyed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Provisioned => "provisioned",
            Self::Validated => "validated",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{}", name)
    }
}

impl Phase {
    fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Provisioned)
                | (Self::NotStarted, Self::Destroyed)
                | (Self::Provisioned, Self::Validated)
                | (Self::Provisioned, Self::Destroyed)
                | (Self::Validated, Self::Destroyed)
        )
    }
}

/// Records the phases an invocation passes through.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    history: Arc<Mutex<Vec<Phase>>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            history: Arc::new(Mutex::new(vec![Phase::NotStarted])),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.history
            .lock()
            .last()
            .copied()
            .unwrap_or(Phase::NotStarted)
    }

    pub fn history(&self) -> Vec<Phase> {
        self.history.lock().clone()
    }

    pub fn advance(&self, next: Phase) -> HarnessResult<()> {
        let mut history = self.history.lock();
        let current = history.last().copied().unwrap_or(Phase::NotStarted);
        if !current.can_advance_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        info!("Lifecycle: {} -> {}", current, next);
        history.push(next);
        Ok(())
    }
}

/// How the release step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TeardownOutcome {
    Clean { attempts: u32 },
    Failed { message: String },
}

impl TeardownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean { .. })
    }
}

/// What the body of a provisioned scope produced.
///
/// The scope records [`Phase::Validated`] only for a passing body.
#[derive(Debug)]
pub struct BodyOutcome<T> {
    pub value: T,
    pub passed: bool,
}

impl<T> BodyOutcome<T> {
    pub fn passed(value: T) -> Self {
        Self {
            value,
            passed: true,
        }
    }

    pub fn failed(value: T) -> Self {
        Self {
            value,
            passed: false,
        }
    }
}

/// Result of a provisioned scope.
#[derive(Debug)]
pub struct ScopeOutcome<T> {
    /// Outcome of acquisition plus the body
    pub result: HarnessResult<T>,
    pub teardown: TeardownOutcome,
}

/// Provision, run `body`, and always destroy.
///
/// `timeout` bounds acquisition plus the body; teardown runs outside the
/// budget. A panic in the body is re-raised after teardown. A body that
/// returns a failed outcome goes straight from provisioned to destroyed.
pub async fn provisioned_scope<T, F, Fut>(
    terraform: Arc<Terraform>,
    lifecycle: &Lifecycle,
    timeout: Option<Duration>,
    body: F,
) -> ScopeOutcome<T>
where
    F: FnOnce(Arc<Terraform>) -> Fut,
    Fut: Future<Output = HarnessResult<BodyOutcome<T>>>,
{
    let acquire_and_run = {
        let terraform = terraform.clone();
        let lifecycle = lifecycle.clone();
        async move {
            terraform
                .init_and_apply()
                .await
                .map_err(HarnessError::Provisioning)?;
            lifecycle.advance(Phase::Provisioned)?;

            let outcome = body(terraform).await?;
            if outcome.passed {
                lifecycle.advance(Phase::Validated)?;
            }
            Ok(outcome.value)
        }
    };

    let bounded = async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, acquire_and_run)
                .await
                .unwrap_or_else(|_| Err(HarnessError::Timeout(limit.as_secs()))),
            None => acquire_and_run.await,
        }
    };

    let guarded = AssertUnwindSafe(bounded).catch_unwind().await;

    let teardown = release(&terraform).await;
    if let Err(e) = lifecycle.advance(Phase::Destroyed) {
        error!("{}", e);
    }

    match guarded {
        Ok(result) => ScopeOutcome { result, teardown },
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn release(terraform: &Terraform) -> TeardownOutcome {
    match terraform.destroy().await {
        Ok(result) => {
            info!("Teardown complete after {} attempt(s)", result.attempts);
            TeardownOutcome::Clean {
                attempts: result.attempts,
            }
        }
        Err(e) => {
            let e = match e {
                IacError::DestroyFailed(_) => HarnessError::Teardown(e),
                other => HarnessError::Teardown(IacError::DestroyFailed(other.to_string())),
            };
            error!("{}", e);
            TeardownOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(Phase::Provisioned).unwrap();
        lifecycle.advance(Phase::Validated).unwrap();
        lifecycle.advance(Phase::Destroyed).unwrap();

        assert_eq!(
            lifecycle.history(),
            vec![
                Phase::NotStarted,
                Phase::Provisioned,
                Phase::Validated,
                Phase::Destroyed
            ]
        );
    }

    #[test]
    fn test_failure_shortcut() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(Phase::Provisioned).unwrap();
        lifecycle.advance(Phase::Destroyed).unwrap();
        assert_eq!(lifecycle.current(), Phase::Destroyed);
    }

    #[test]
    fn test_rejects_illegal_transitions() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(Phase::Validated).is_err());

        lifecycle.advance(Phase::Destroyed).unwrap();
        assert!(lifecycle.advance(Phase::Destroyed).is_err());
        assert!(lifecycle.advance(Phase::Provisioned).is_err());
    }
}
