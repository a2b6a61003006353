//! Instance configuration and per-call options

use crate::error::RpcSetupError;
use serde::{Deserialize, Serialize};

/// Default timeout for an invocation, in milliseconds
pub const DEFAULT_TIMEOUT_MS: i64 = 1000;

/// Default number of re-sends after the first attempt
pub const DEFAULT_RETRY_LIMIT: u32 = 0;

/// Configuration of one RPC instance
///
/// Deserializes from `{"defaultInvocationOptions": {"timeout": 1000, "retryLimit": 0}}`;
/// every field may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcConfig {
    pub default_invocation_options: DefaultInvocationOptions,
}

impl RpcConfig {
    pub fn from_json(json: &str) -> Result<Self, RpcSetupError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_default_timeout(mut self, timeout_ms: i64) -> Self {
        self.default_invocation_options.timeout_ms = timeout_ms;
        self
    }

    pub fn with_default_retry_limit(mut self, retry_limit: u32) -> Self {
        self.default_invocation_options.retry_limit = retry_limit;
        self
    }
}

/// Options applied to every invocation unless overridden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultInvocationOptions {
    /// Per-attempt timeout in milliseconds; zero or negative disables it
    #[serde(rename = "timeout")]
    pub timeout_ms: i64,
    pub retry_limit: u32,
}

impl Default for DefaultInvocationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

/// Per-call overrides; unset fields fall back to the instance defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationOptions {
    #[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_limit: Option<u32>,
}

impl InvocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    /// Resolves these overrides against `defaults`
    pub fn merge(&self, defaults: &DefaultInvocationOptions) -> DefaultInvocationOptions {
        DefaultInvocationOptions {
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            retry_limit: self.retry_limit.unwrap_or(defaults.retry_limit),
        }
    }
}
