//! Test fixtures shared by the workspace crates.

use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use serde_json::{Map, Value, json};
use std::net::SocketAddr;
use std::process::Child;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Environment variables read by the server binary. Process-level tests clear all of them so
/// the developer's shell cannot change what the spawned server sees.
pub const SERVER_ENV_VARS: &[&str] = &[
    "ACCESS_TOKEN",
    "SANDBOX",
    "PRODUCTION",
    "DISALLOW_WRITES",
    "API_VERSION",
    "API_BASE_URL",
    "API_TIMEOUT_SECS",
    "ENDPOINT_REGISTRY",
    "MCP_TRANSPORT",
    "MCP_BIND",
    "LOG_LEVEL",
    "LOG_JSON",
];

/// Child process killed when the guard goes out of scope.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status.
///
/// # Errors
///
/// Returns an error if the timeout elapses first.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// Local HTTP server that answers every request with a JSON description of what it received.
///
/// Special routes:
/// - `GET /status/{code}` replies with that status and a JSON error body
/// - `GET /text-error` replies `502` with a plain-text body
pub struct EchoServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl EchoServer {
    /// Bind an ephemeral localhost port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let app = Router::new()
            .route("/status/{code}", get(status_handler))
            .route("/text-error", get(text_error_handler))
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind echo server")?;
        let addr = listener.local_addr().context("echo server local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move { server.await });

        Ok(Self {
            addr,
            shutdown_tx,
            handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the server and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

async fn echo_handler(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_ascii_lowercase(), json!(v)))
        })
        .collect();

    axum::Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn status_handler(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code_name = status
        .canonical_reason()
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
        .replace(' ', "_");
    (
        status,
        axum::Json(json!({
            "errors": [{ "category": "INVALID_REQUEST_ERROR", "code": code_name }]
        })),
    )
}

async fn text_error_handler() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "upstream unavailable")
}
