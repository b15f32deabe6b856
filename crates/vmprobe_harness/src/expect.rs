//! Expected output values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AssertionFailure;

/// What an output must look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Any non-blank value
    NonEmpty,
    /// Exactly this value
    Equals(String),
}

impl Expectation {
    pub fn check(&self, field: &str, actual: &str) -> Result<(), AssertionFailure> {
        let ok = match self {
            Self::NonEmpty => !actual.trim().is_empty(),
            Self::Equals(expected) => actual == expected,
        };
        if ok {
            Ok(())
        } else {
            Err(AssertionFailure {
                field: field.to_string(),
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonEmpty => write!(f, "<non-empty>"),
            Self::Equals(value) => write!(f, "{:?}", value),
        }
    }
}

/// One output to read and the expectation it must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCheck {
    pub output: String,
    pub expectation: Expectation,
    /// Read only after the settle wait
    pub after_settle: bool,
}

/// Expected results of a provisioning run.
///
/// `vm_id` is read straight after apply; every other output is read after
/// the settle wait so eventually-consistent status has time to converge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectations {
    pub vm_id_non_empty: bool,
    /// Expected `name` output. Not derived from `name_vm`: the two are
    /// configured independently.
    pub name: Option<String>,
    pub status: Option<String>,
    /// Further outputs that must equal the given values
    pub outputs: BTreeMap<String, String>,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            vm_id_non_empty: true,
            name: Some("test-vm".to_string()),
            status: Some("stopped".to_string()),
            outputs: BTreeMap::new(),
        }
    }
}

impl Expectations {
    /// No expectations at all.
    pub fn none() -> Self {
        Self {
            vm_id_non_empty: false,
            name: None,
            status: None,
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(output.into(), value.into());
        self
    }

    /// Checks in the order they are read.
    pub fn checks(&self) -> Vec<OutputCheck> {
        let mut checks = Vec::new();
        if self.vm_id_non_empty {
            checks.push(OutputCheck {
                output: "vm_id".to_string(),
                expectation: Expectation::NonEmpty,
                after_settle: false,
            });
        }
        let named = [("name", &self.name), ("status", &self.status)];
        for (output, expected) in named {
            if let Some(value) = expected {
                checks.push(OutputCheck {
                    output: output.to_string(),
                    expectation: Expectation::Equals(value.clone()),
                    after_settle: true,
                });
            }
        }
        for (output, value) in &self.outputs {
            checks.push(OutputCheck {
                output: output.clone(),
                expectation: Expectation::Equals(value.clone()),
                after_settle: true,
            });
        }
        checks
    }
}
