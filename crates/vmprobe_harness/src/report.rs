//! Invocation results.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AssertionFailure, FatalKind, HarnessError};
use crate::expect::OutputCheck;
use crate::lifecycle::{Phase, TeardownOutcome};

/// Outcome of a single output check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

impl CheckResult {
    /// Evaluate a check against the value read back.
    pub fn evaluate(check: &OutputCheck, actual: &str) -> Self {
        Self {
            field: check.output.clone(),
            expected: check.expectation.to_string(),
            actual: actual.to_string(),
            passed: check.expectation.check(&check.output, actual).is_ok(),
        }
    }

    pub fn failure(&self) -> Option<AssertionFailure> {
        (!self.passed).then(|| AssertionFailure {
            field: self.field.clone(),
            expected: self.expected.clone(),
            actual: self.actual.clone(),
        })
    }
}

/// The error that ended validation early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalError {
    pub kind: FatalKind,
    pub message: String,
}

impl From<&HarnessError> for FatalError {
    fn from(err: &HarnessError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Full result of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub scenario: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<Phase>,
    pub checks: Vec<CheckResult>,
    pub fatal: Option<FatalError>,
    pub teardown: TeardownOutcome,
    /// Whether a failed teardown fails the run
    pub require_clean_teardown: bool,
}

impl TestReport {
    /// Conjunction of all checks, no fatal error, and (if required) a clean teardown.
    pub fn passed(&self) -> bool {
        self.fatal.is_none()
            && self.checks.iter().all(|c| c.passed)
            && (!self.require_clean_teardown || self.teardown.is_clean())
    }

    pub fn failures(&self) -> Vec<AssertionFailure> {
        self.checks.iter().filter_map(CheckResult::failure).collect()
    }

    pub fn check(&self, field: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.field == field)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "🧪 {} ({})", self.scenario, self.run_id);
        let phases: Vec<String> = self.phases.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "   Lifecycle: {}", phases.join(" → "));

        for check in &self.checks {
            if check.passed {
                let _ = writeln!(out, "   ✅ {} = {:?}", check.field, check.actual);
            } else {
                let _ = writeln!(
                    out,
                    "   ❌ {}: expected {}, got {:?}",
                    check.field, check.expected, check.actual
                );
            }
        }

        if let Some(fatal) = &self.fatal {
            let _ = writeln!(out, "   ❌ {}", fatal.message);
        }

        match &self.teardown {
            TeardownOutcome::Clean { attempts } => {
                let _ = writeln!(out, "   🧹 Teardown clean ({} attempt(s))", attempts);
            }
            TeardownOutcome::Failed { message } => {
                let marker = if self.require_clean_teardown { "❌" } else { "⚠️ " };
                let _ = writeln!(out, "   {} {}", marker, message);
            }
        }

        let _ = writeln!(
            out,
            "{} in {}ms",
            if self.passed() { "✅ PASSED" } else { "❌ FAILED" },
            self.duration_ms()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(checks: Vec<CheckResult>, teardown: TeardownOutcome) -> TestReport {
        TestReport {
            scenario: "unit".to_string(),
            run_id: "r1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            phases: vec![Phase::NotStarted, Phase::Provisioned, Phase::Destroyed],
            checks,
            fatal: None,
            teardown,
            require_clean_teardown: false,
        }
    }

    fn check(field: &str, passed: bool) -> CheckResult {
        CheckResult {
            field: field.to_string(),
            expected: "\"stopped\"".to_string(),
            actual: if passed { "stopped" } else { "running" }.to_string(),
            passed,
        }
    }

    #[test]
    fn test_passed_is_conjunction() {
        let clean = TeardownOutcome::Clean { attempts: 1 };
        assert!(report(vec![check("status", true)], clean.clone()).passed());
        assert!(!report(vec![check("vm_id", true), check("status", false)], clean).passed());
    }

    #[test]
    fn test_teardown_failure_policy() {
        let failed = TeardownOutcome::Failed {
            message: "Teardown failed".to_string(),
        };
        let mut r = report(vec![check("status", true)], failed);
        assert!(r.passed());

        r.require_clean_teardown = true;
        assert!(!r.passed());
    }

    #[test]
    fn test_fatal_fails_run() {
        let mut r = report(vec![], TeardownOutcome::Clean { attempts: 1 });
        r.fatal = Some(FatalError {
            kind: FatalKind::Provisioning,
            message: "apply failed".to_string(),
        });
        assert!(!r.passed());
        assert!(r.render().contains("apply failed"));
    }

    #[test]
    fn test_failures_and_render() {
        let r = report(
            vec![check("name", true), check("status", false)],
            TeardownOutcome::Clean { attempts: 1 },
        );

        let failures = r.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "status");
        assert_eq!(failures[0].actual, "running");

        let text = r.render();
        assert!(text.contains("❌ status"));
        assert!(text.contains("FAILED"));
    }
}
