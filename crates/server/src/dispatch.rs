//! Dispatcher: resolves `(service, method)` against the registries, enforces write-gating,
//! binds the arguments and performs the single transport call.
//!
//! The public entry points never fail. Every [`DispatchError`] is folded into an error
//! envelope `{"error": message, "details": ...}` flagged with `isError`.

use commerce_http_tools::{
    ArgumentBag, BuildError, EndpointDescriptor, Transport, TransportError, build_request,
};
use commerce_registry::{Registry, Service};
use rmcp::model::{CallToolResult, Content};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Reject every endpoint whose descriptor is a write, before any network I/O.
    pub disallow_writes: bool,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown service '{service}'. Available services: {}", .available.join(", "))]
    UnknownService {
        service: String,
        available: Vec<String>,
    },

    #[error(
        "Unknown method '{method}' for service '{service}'. Available methods: {}",
        .available.join(", ")
    )]
    UnknownMethod {
        service: String,
        method: String,
        available: Vec<String>,
    },

    #[error("{service}.{method} modifies data and writes are disabled on this server")]
    WriteDisallowed { service: String, method: String },

    #[error("No type information for {service}.{method}")]
    TypeNotFound {
        service: String,
        method: String,
        type_name: Option<String>,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Structured payload placed under `details` in the error envelope.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::UnknownService { service, available } => json!({
                "service": service,
                "availableServices": available,
            }),
            Self::UnknownMethod {
                service,
                method,
                available,
            } => json!({
                "service": service,
                "method": method,
                "availableMethods": available,
            }),
            Self::WriteDisallowed { service, method } => json!({
                "service": service,
                "method": method,
            }),
            Self::TypeNotFound {
                service,
                method,
                type_name,
            } => json!({
                "service": service,
                "method": method,
                "requestType": type_name,
            }),
            Self::Build(e) => match e {
                BuildError::MissingPathParameter(name) => json!({ "parameter": name }),
                BuildError::InvalidFileField { name, actual } => {
                    json!({ "field": name, "actual": actual })
                }
                BuildError::FileNotFound(path) | BuildError::FileRead { path, .. } => {
                    json!({ "path": path })
                }
            },
            Self::Transport(e) => match e {
                TransportError::Http { status, body, .. } => json!({
                    "status": status,
                    "body": body,
                }),
                TransportError::Network(_) | TransportError::InvalidUrl(_) => Value::Null,
            },
        }
    }

    /// The `{"error", "details"}` envelope as JSON.
    #[must_use]
    pub fn envelope(&self) -> Value {
        json!({
            "error": self.to_string(),
            "details": self.details(),
        })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            registry,
            transport,
            policy,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// `make_api_request`: the raw response body on success, an error envelope otherwise.
    pub async fn execute_call(
        &self,
        service: &str,
        method: &str,
        request: Option<ArgumentBag>,
    ) -> CallToolResult {
        match self.try_execute_call(service, method, request).await {
            Ok(body) => {
                info!(service = %service, method = %method, outcome = "ok", "API call completed");
                CallToolResult::success(vec![Content::text(body)])
            }
            Err(e) => {
                warn!(
                    service = %service,
                    method = %method,
                    outcome = "error",
                    error = %e,
                    "API call failed"
                );
                error_result(&e)
            }
        }
    }

    /// # Errors
    ///
    /// Fails on an unknown service or method, a gated write, a binding error, or a transport
    /// failure. A gated write never reaches the transport.
    pub async fn try_execute_call(
        &self,
        service: &str,
        method: &str,
        request: Option<ArgumentBag>,
    ) -> Result<String, DispatchError> {
        let (svc, descriptor) = self.resolve(service, method)?;

        if self.policy.disallow_writes && descriptor.write {
            return Err(DispatchError::WriteDisallowed {
                service: svc.name().to_string(),
                method: method.to_string(),
            });
        }

        let file_fields = descriptor
            .request_type
            .as_deref()
            .map(|t| self.registry.types().file_fields(t))
            .unwrap_or_default();
        let prepared = build_request(descriptor, request.unwrap_or_default(), &file_fields).await?;
        let response = self.transport.send(prepared).await?;
        Ok(response.body)
    }

    /// `get_type_info`: JSON Schema of the method's request type.
    pub fn describe_type(&self, service: &str, method: &str) -> CallToolResult {
        match self.try_describe_type(service, method) {
            Ok(schema) => text_result(&schema),
            Err(e) => {
                warn!(service = %service, method = %method, error = %e, "type lookup failed");
                error_result(&e)
            }
        }
    }

    /// # Errors
    ///
    /// Fails on an unknown service or method, or when the method has no registered request type.
    pub fn try_describe_type(&self, service: &str, method: &str) -> Result<Value, DispatchError> {
        let (svc, descriptor) = self.resolve(service, method)?;
        let not_found = || DispatchError::TypeNotFound {
            service: svc.name().to_string(),
            method: method.to_string(),
            type_name: descriptor.request_type.clone(),
        };

        let type_name = descriptor.request_type.as_deref().ok_or_else(not_found)?;
        self.registry
            .types()
            .schema_of(type_name)
            .ok_or_else(not_found)
    }

    /// `get_service_info`: `{method: {description}}` for every method of the service.
    pub fn describe_service(&self, service: &str) -> CallToolResult {
        match self.try_describe_service(service) {
            Ok(methods) => text_result(&methods),
            Err(e) => {
                warn!(service = %service, error = %e, "service lookup failed");
                error_result(&e)
            }
        }
    }

    /// # Errors
    ///
    /// Fails on an unknown service.
    pub fn try_describe_service(&self, service: &str) -> Result<Value, DispatchError> {
        let svc = self.resolve_service(service)?;
        let methods: Map<String, Value> = svc
            .methods()
            .map(|(name, d)| (name.to_string(), json!({ "description": d.description })))
            .collect();
        Ok(Value::Object(methods))
    }

    fn resolve_service(&self, service: &str) -> Result<&Service, DispatchError> {
        let endpoints = self.registry.endpoints();
        endpoints
            .resolve_service(service)
            .ok_or_else(|| DispatchError::UnknownService {
                service: service.to_string(),
                available: endpoints
                    .service_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
    }

    fn resolve(
        &self,
        service: &str,
        method: &str,
    ) -> Result<(&Service, &EndpointDescriptor), DispatchError> {
        let svc = self.resolve_service(service)?;
        let descriptor = svc
            .method(method)
            .ok_or_else(|| DispatchError::UnknownMethod {
                service: svc.name().to_string(),
                method: method.to_string(),
                available: svc.method_names().into_iter().map(str::to_string).collect(),
            })?;
        Ok((svc, descriptor))
    }
}

fn text_result(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(format!("{value:#}"))])
}

fn error_result(e: &DispatchError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(e.envelope().to_string())])
}
