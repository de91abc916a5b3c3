//! Command-line and environment configuration.
//!
//! Everything is read once at startup into a [`ServerConfig`] that is passed by value to the
//! components that need it.

use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use commerce_http_tools::TransportSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const PRODUCTION_BASE_URL: &str = "https://connect.squareup.com";
pub const SANDBOX_BASE_URL: &str = "https://connect.squareupsandbox.com";
pub const VERSION_HEADER: &str = "Square-Version";
pub const DEFAULT_API_VERSION: &str = "2025-04-16";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const MISSING_TOKEN: &str = "missing access token (--access-token or ACCESS_TOKEN)";

/// MCP server for the commerce platform REST API
#[derive(Parser, Debug, Clone)]
#[command(name = "commerce-mcp-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Bearer access token used for every API call
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Use the sandbox environment
    #[arg(long, env = "SANDBOX")]
    pub sandbox: bool,

    /// Use the production environment (the default)
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Reject every endpoint that modifies remote state
    #[arg(long, env = "DISALLOW_WRITES")]
    pub disallow_writes: bool,

    /// Value sent in the API version header
    #[arg(long, env = "API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Override the API base URL (proxies, local testing)
    #[arg(long, env = "API_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (HTTP client default when unset)
    #[arg(long, env = "API_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Load the endpoint registry from this YAML file instead of the built-in one
    #[arg(long, env = "ENDPOINT_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// MCP transport
    #[arg(long, value_enum, env = "MCP_TRANSPORT", default_value_t = TransportMode::Stdio)]
    pub transport: TransportMode,

    /// Listen address for the streamable HTTP transport
    #[arg(long, env = "MCP_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// JSON-RPC over stdin/stdout
    Stdio,
    /// Streamable HTTP at `/mcp`
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiEnvironment {
    Production,
    Sandbox,
}

impl ApiEnvironment {
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub access_token: String,
    pub environment: ApiEnvironment,
    pub base_url: Url,
    pub api_version: String,
    pub timeout: Option<Duration>,
    pub disallow_writes: bool,
    pub registry_path: Option<PathBuf>,
    pub transport: TransportMode,
    pub bind: SocketAddr,
}

impl Cli {
    /// Validate the parsed flags and resolve them into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the access token is missing, both `--sandbox` and
    /// `--production` are set, or the base URL does not parse.
    pub fn into_config(self) -> Result<ServerConfig> {
        if self.sandbox && self.production {
            return Err(ServerError::Config(
                "--sandbox and --production are mutually exclusive".to_string(),
            ));
        }
        let environment = if self.sandbox {
            ApiEnvironment::Sandbox
        } else {
            ApiEnvironment::Production
        };

        let access_token = self
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServerError::Config(MISSING_TOKEN.to_string()))?;

        let raw_base = self
            .base_url
            .unwrap_or_else(|| environment.base_url().to_string());
        let base_url = Url::parse(&raw_base)
            .map_err(|e| ServerError::Config(format!("invalid base URL '{raw_base}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ServerError::Config(format!(
                "invalid base URL '{raw_base}': scheme must be http or https"
            )));
        }

        Ok(ServerConfig {
            access_token,
            environment,
            base_url,
            api_version: self.api_version,
            timeout: self.timeout_secs.map(Duration::from_secs),
            disallow_writes: self.disallow_writes,
            registry_path: self.registry,
            transport: self.transport,
            bind: self.bind,
        })
    }
}

impl ServerConfig {
    #[must_use]
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            bearer_token: self.access_token.clone(),
            version_header: (VERSION_HEADER.to_string(), self.api_version.clone()),
            user_agent: USER_AGENT.to_string(),
            timeout: self.timeout,
        }
    }
}
