use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

fn default_max_retries() -> u32 {
    2
}

/// Configuration required to reach the model endpoint. Loadable from the
/// environment or deserialized from a settings file by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LlmSettings {
    /// API key/token (required).
    pub api_key: String,
    /// Optional custom endpoint/base URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model identifier; `gpt-4` when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Proxy URL for plain-HTTP traffic.
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// Proxy URL for HTTPS traffic.
    #[serde(default)]
    pub https_proxy: Option<String>,
}

impl LlmSettings {
    const API_KEY_ENV: &'static str = "PHISH_GUARD_API_KEY";
    const ENDPOINT_ENV: &'static str = "PHISH_GUARD_ENDPOINT";
    const MODEL_ENV: &'static str = "PHISH_GUARD_MODEL";
    const TIMEOUT_ENV: &'static str = "PHISH_GUARD_TIMEOUT_SECS";
    const RETRIES_ENV: &'static str = "PHISH_GUARD_MAX_RETRIES";
    const HTTP_PROXY_ENV: &'static str = "PHISH_GUARD_HTTP_PROXY";
    const HTTPS_PROXY_ENV: &'static str = "PHISH_GUARD_HTTPS_PROXY";

    /// Load settings from environment variables.
    ///
    /// * `PHISH_GUARD_API_KEY`  — API key/token (required).
    /// * `PHISH_GUARD_ENDPOINT` — Optional custom endpoint/base URL.
    /// * `PHISH_GUARD_MODEL`    — Optional model override.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let api_key = vars
            .get(Self::API_KEY_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| {
                format!(
                    "environment variable {} must be set to enable AI analysis",
                    Self::API_KEY_ENV
                )
            })?;
        let non_blank = |key: &str| vars.get(key).cloned().filter(|v| !v.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let max_retries = vars
            .get(Self::RETRIES_ENV)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or_else(default_max_retries);

        Ok(Self {
            api_key,
            endpoint: non_blank(Self::ENDPOINT_ENV),
            model: non_blank(Self::MODEL_ENV),
            timeout_secs,
            max_retries,
            http_proxy: non_blank(Self::HTTP_PROXY_ENV),
            https_proxy: non_blank(Self::HTTPS_PROXY_ENV),
        })
    }
}
