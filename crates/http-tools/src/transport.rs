//! Single-shot HTTP transport.
//!
//! One [`Transport::send`] is exactly one HTTP call: no retries, no backoff, and no timeout other
//! than the optional one configured in [`TransportSettings`].

use crate::request::{MULTIPART_REQUEST_PART, MultipartBody, PreparedRequest, RequestBody};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Non-2xx response. `body` is the parsed JSON error body when possible, raw text otherwise.
    #[error("API returned {status} {reason}")]
    Http {
        status: u16,
        reason: String,
        body: Value,
    },

    /// Connection, DNS, TLS or timeout failure.
    #[error("HTTP transport error: {0}")]
    Network(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(sanitize_reqwest_error(&value))
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Response body as text. Non-UTF-8 payloads are wrapped as a base64 JSON object.
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: Url,
    pub bearer_token: String,
    /// API version header, e.g. `("Square-Version", "2025-04-16")`.
    pub version_header: (String, String),
    pub user_agent: String,
    /// `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    settings: TransportSettings,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn url_for(&self, path_and_query: &str) -> Result<Url, TransportError> {
        let raw = format!(
            "{}{}",
            self.settings.base_url.as_str().trim_end_matches('/'),
            path_and_query
        );
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path_and_query)?;
        debug!(method = %request.verb, url = %redact_url(&url), "sending API request");

        let (name, value) = &self.settings.version_header;
        let mut builder = self
            .client
            .request(request.verb.as_method(), url)
            .bearer_auth(&self.settings.bearer_token)
            .header(name.as_str(), value.as_str())
            .header(ACCEPT, "application/json");

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(body) => builder.multipart(multipart_form(body)?),
        };

        if let Some(t) = self.settings.timeout {
            builder = builder.timeout(t);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let text = bytes_to_text(&bytes, content_type.as_deref());

        if status.is_success() {
            return Ok(RawResponse {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Err(TransportError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}

fn multipart_form(body: MultipartBody) -> Result<Form, TransportError> {
    let request_part = Part::text(body.request_json)
        .mime_str(mime::APPLICATION_JSON.as_ref())
        .map_err(TransportError::from)?;
    let mut form = Form::new().part(MULTIPART_REQUEST_PART, request_part);

    for file in body.files {
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(file.content_type.as_ref())
            .map_err(TransportError::from)?;
        form = form.part(file.field, part);
    }
    Ok(form)
}

fn bytes_to_text(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        s.to_string()
    } else {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": b64
        })
        .to_string()
    }
}

/// Drop credentials, query and fragment before a URL reaches logs or error text.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
