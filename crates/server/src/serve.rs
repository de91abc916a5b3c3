//! Startup wiring and the two MCP transports.

use crate::config::{ServerConfig, TransportMode};
use crate::dispatch::{DispatchPolicy, Dispatcher};
use crate::error::{Result, ServerError};
use crate::mcp::CommerceMcpServer;
use axum::Router;
use axum::routing::get;
use commerce_http_tools::{HttpTransport, redact_url};
use commerce_registry::Registry;
use rmcp::ServiceExt as _;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Load the registry, build the transport and wire up the MCP handler.
///
/// # Errors
///
/// Returns an error if the registry fails to load or validate, or the HTTP client cannot be
/// built.
pub fn build_server(config: &ServerConfig) -> Result<CommerceMcpServer> {
    let registry = match &config.registry_path {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin()?,
    };
    let transport = HttpTransport::new(config.transport_settings())?;

    info!(
        environment = ?config.environment,
        base_url = %redact_url(&config.base_url),
        api_version = %config.api_version,
        disallow_writes = config.disallow_writes,
        "commerce API configured"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(transport),
        DispatchPolicy {
            disallow_writes: config.disallow_writes,
        },
    );
    Ok(CommerceMcpServer::new(dispatcher))
}

/// Serve on the transport selected in `config` until the client disconnects (stdio) or the
/// process receives Ctrl-C (HTTP).
///
/// # Errors
///
/// Returns an error if startup fails or the transport terminates abnormally.
pub async fn run(config: ServerConfig) -> Result<()> {
    let server = build_server(&config)?;
    match config.transport {
        TransportMode::Stdio => serve_stdio(server).await,
        TransportMode::Http => {
            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("shutdown signal received");
                    shutdown.cancel();
                }
            });
            serve_http(server, config.bind, shutdown).await
        }
    }
}

/// # Errors
///
/// Returns an error if the MCP handshake fails or the service task panics.
pub async fn serve_stdio(server: CommerceMcpServer) -> Result<()> {
    info!("serving MCP over stdio");
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ServerError::Startup(format!("stdio handshake failed: {e}")))?;
    let reason = running
        .waiting()
        .await
        .map_err(|e| ServerError::Startup(format!("stdio service terminated: {e}")))?;
    info!(reason = ?reason, "stdio session closed");
    Ok(())
}

/// Serve streamable HTTP at `/mcp` (plus `/health`) until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve_http(
    server: CommerceMcpServer,
    bind: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let service: StreamableHttpService<CommerceMcpServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(server.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                cancellation_token: shutdown.child_token(),
                ..Default::default()
            },
        );

    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "serving MCP over streamable HTTP at /mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
