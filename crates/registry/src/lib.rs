//! Endpoint and type registries.
//!
//! The endpoint registry maps `service → method → endpoint descriptor`; the type registry maps
//! request-type names to their field lists. Both are loaded from one declarative document
//! (compiled in by default, or read from disk) and never change afterwards.

pub mod error;
pub mod model;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use model::{FieldDescriptor, RegistryDocument, ServiceDocument, TypeDefinition};
pub use registry::{EndpointRegistry, Registry, Service};
pub use types::TypeRegistry;
