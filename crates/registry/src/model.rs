//! Declarative registry document.
//!
//! ```yaml
//! services:
//!   Bookings:
//!     description: Appointments for sellers
//!     methods:
//!       retrieve:
//!         verb: GET
//!         path: /v2/bookings/{booking_id}
//!         pathParams: [{ name: booking_id }]
//!         requestType: RetrieveBookingRequest
//! types:
//!   RetrieveBookingRequest:
//!     fields:
//!       - { name: booking_id, type: string, required: true }
//! ```

use commerce_http_tools::EndpointDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryDocument {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDocument>,

    #[serde(default)]
    pub types: BTreeMap<String, TypeDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceDocument {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub methods: BTreeMap<String, EndpointDescriptor>,
}

/// Request type: the fields a caller may put in the argument bag.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypeDefinition {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldDescriptor {
    pub name: String,

    /// JSON Schema type name (`string`, `integer`, `boolean`, `object`, `array`, ...).
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub required: bool,

    /// Value is a local file path uploaded as its own multipart part.
    #[serde(default)]
    pub is_file: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn default_field_type() -> String {
    "string".to_string()
}
