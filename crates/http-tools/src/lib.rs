//! Endpoint descriptors, request binding and HTTP transport.
//!
//! This crate is used by:
//! - `commerce-registry` (descriptor model for the declarative endpoint data)
//! - `commerce-mcp-server` (request building + transport behind the dispatcher)
//!
//! It intentionally knows nothing about services, the type registry or the MCP envelope.

pub mod descriptor;
pub mod request;
pub mod transport;

pub use descriptor::{EndpointDescriptor, HttpVerb, PathParam, QueryParam};
pub use request::{
    ArgumentBag, BuildError, FilePart, MultipartBody, PreparedRequest, RequestBody, build_request,
};
pub use transport::{
    HttpTransport, RawResponse, Transport, TransportError, TransportSettings, redact_url,
};
