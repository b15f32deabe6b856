//! Provider API credentials.
//!
//! Loaded once at process start and passed explicitly into each
//! invocation. The values only ever reach the terraform child process
//! environment; they are never written to disk or logged.

use std::fmt;

use vmprobe_iac::TerraformOptions;

use crate::error::{HarnessError, HarnessResult};

pub const API_URL_VAR: &str = "PROXMOX_API_URL";
pub const TOKEN_ID_VAR: &str = "PROXMOX_API_TOKEN_ID";
pub const TOKEN_SECRET_VAR: &str = "PROXMOX_API_TOKEN_SECRET";

/// API endpoint and token for the virtualization provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_url: String,
    pub token_id: String,
    pub token_secret: String,
}

impl Credentials {
    pub fn new(
        api_url: impl Into<String>,
        token_id: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> HarnessResult<Self> {
        let creds = Self {
            api_url: api_url.into(),
            token_id: token_id.into(),
            token_secret: token_secret.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HarnessError::Credentials(format!("{} is not set", key)))
        };
        Self::new(get(API_URL_VAR)?, get(TOKEN_ID_VAR)?, get(TOKEN_SECRET_VAR)?)
    }

    fn validate(&self) -> HarnessResult<()> {
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(HarnessError::Credentials(format!(
                "{} must be an http(s) URL",
                API_URL_VAR
            )));
        }
        if self.token_id.trim().is_empty() || self.token_secret.trim().is_empty() {
            return Err(HarnessError::Credentials(
                "API token id and secret must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Inject into terraform's environment.
    pub fn apply_to(&self, options: TerraformOptions) -> TerraformOptions {
        options
            .env(API_URL_VAR, &self.api_url)
            .secret_env(TOKEN_ID_VAR, &self.token_id)
            .secret_env(TOKEN_SECRET_VAR, &self.token_secret)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_url", &self.api_url)
            .field("token_id", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}
