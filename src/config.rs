//! Configuration management for the wallet gateway
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref ENV_VAR_RE: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_urls: Vec<String>,
    /// Expected chain id; startup fails if the node reports another
    pub chain_id: Option<u64>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    pub max_gas_price_gwei: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub max_send_attempts: u32,
    pub retry_delay_ms: u64,
    pub send_timeout_secs: u64,
    pub gas_limit_buffer_percent: u64,
    pub gas_price_buffer_percent: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: 3,
            retry_delay_ms: 500,
            send_timeout_secs: 30,
            gas_limit_buffer_percent: 0,
            gas_price_buffer_percent: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Settings {
    /// Load settings from the file named by `GATEWAY_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("GATEWAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut settings = Self::from_toml_str(&config_str)?;
        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        // Unset variables substitute to empty strings
        settings.chain.rpc_urls.retain(|url| !url.trim().is_empty());

        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = env::var("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!(
                "Chain {} has no RPC URLs configured (is RPC_URL set?)",
                self.chain.name
            );
        }

        if self.transactions.max_send_attempts == 0 {
            anyhow::bail!("transactions.max_send_attempts must be at least 1");
        }

        if self.server.cors_allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - cross-origin requests will be refused");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
