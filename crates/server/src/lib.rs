//! MCP server exposing the commerce platform REST API through three generic tools.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mcp;
pub mod serve;

pub use config::{ApiEnvironment, Cli, ServerConfig, TransportMode};
pub use dispatch::{DispatchError, DispatchPolicy, Dispatcher};
pub use error::{Result, ServerError};
pub use mcp::CommerceMcpServer;
