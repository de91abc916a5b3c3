//! Startup error types for the MCP server.

use commerce_http_tools::TransportError;
use commerce_registry::RegistryError;
use thiserror::Error;

/// Errors that prevent the server from starting or keep it from serving.
///
/// Tool-call failures never surface here; they are reported to the caller as error envelopes by
/// the [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (missing credential, conflicting flags, bad URLs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint or type registry failed to load
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// HTTP client could not be constructed
    #[error("Transport setup error: {0}")]
    Transport(#[from] TransportError),

    /// Startup errors (listener bind, protocol handshake)
    #[error("Startup error: {0}")]
    Startup(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server startup.
pub type Result<T> = std::result::Result<T, ServerError>;
