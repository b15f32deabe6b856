//! Retryable error policy for transient provider failures.
//!
//! A failed `init`, `apply` or `destroy` is re-run only when its output
//! matches one of the configured patterns. The interval between attempts
//! is fixed.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IacError, IacResult};

/// Patterns for errors known to be transient, with a human description.
pub fn default_retryable_errors() -> BTreeMap<String, String> {
    [
        (
            ".*read: connection reset by peer.*",
            "Failed to reach the provider API due to a connection reset.",
        ),
        (
            ".*TLS handshake timeout.*",
            "Failed to reach the provider API due to a TLS handshake timeout.",
        ),
        (
            ".*Client.Timeout exceeded while awaiting headers.*",
            "Failed to reach the provider API due to a client timeout.",
        ),
        (
            ".*(?i)Failed to install provider.*",
            "Failed to download a provider plugin from the registry.",
        ),
        (
            ".*Failed to query available provider packages.*",
            "Failed to query the provider registry.",
        ),
        (
            ".*registry service is unreachable.*",
            "Failed to reach the provider registry.",
        ),
        (
            ".*timeout while waiting for plugin to start.*",
            "Provider plugin did not start in time.",
        ),
        (
            ".*429 Too Many Requests.*",
            "Provider API rate limit reached.",
        ),
        (
            ".*(502 Bad Gateway|503 Service Unavailable|504 Gateway Timeout).*",
            "Provider API temporarily unavailable.",
        ),
        (
            ".*can't lock file .* got timeout.*",
            "Proxmox node held a configuration lock on the VM.",
        ),
        (
            ".*got no worker upid.*",
            "Proxmox task did not start.",
        ),
    ]
    .into_iter()
    .map(|(p, d)| (p.to_string(), d.to_string()))
    .collect()
}

/// Retry configuration applied by the Terraform wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of re-runs after the first attempt
    pub max_retries: u32,
    /// Fixed wait between attempts, in seconds
    pub time_between_retries_seconds: u64,
    /// Regex pattern -> description
    pub patterns: BTreeMap<String, String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            time_between_retries_seconds: 5,
            patterns: default_retryable_errors(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            time_between_retries_seconds: 0,
            patterns: BTreeMap::new(),
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.time_between_retries_seconds = seconds;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, description: impl Into<String>) -> Self {
        self.patterns.insert(pattern.into(), description.into());
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.time_between_retries_seconds)
    }

    /// Compile the patterns, failing on the first invalid one.
    pub fn compile(&self) -> IacResult<CompiledRetryPolicy> {
        let matchers = self
            .patterns
            .iter()
            .map(|(pattern, description)| {
                Regex::new(pattern)
                    .map(|re| (re, description.clone()))
                    .map_err(|source| IacError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<IacResult<Vec<_>>>()?;

        Ok(CompiledRetryPolicy {
            max_retries: self.max_retries,
            interval: self.interval(),
            matchers,
        })
    }
}

/// Retry policy with patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
    matchers: Vec<(Regex, String)>,
}

impl CompiledRetryPolicy {
    /// Description of the first pattern matching any line of `output`.
    pub fn matching(&self, output: &str) -> Option<&str> {
        output.lines().find_map(|line| {
            self.matchers
                .iter()
                .find(|(re, _)| re.is_match(line))
                .map(|(_, description)| description.as_str())
        })
    }
}
