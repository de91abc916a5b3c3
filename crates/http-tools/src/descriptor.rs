//! Static description of one remote HTTP operation.
//!
//! Descriptors are deserialized once from the endpoint registry data and never mutated. The
//! request builder treats them as opaque `(verb, path template, parameter lists)` tuples.

use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}/]+)\}").expect("valid placeholder regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpVerb {
    #[must_use]
    pub fn as_method(self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Delete => Method::DELETE,
            HttpVerb::Patch => Method::PATCH,
        }
    }

    /// Whether a JSON body is ever sent for this verb.
    #[must_use]
    pub fn carries_body(self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }

    /// Default for [`EndpointDescriptor::write`] when the registry data leaves it unset.
    #[must_use]
    pub fn is_mutating(self) -> bool {
        !matches!(self, HttpVerb::Get)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParam {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
}

/// One remote operation: verb, path template and the parameters bound from the argument bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawEndpointDescriptor")]
pub struct EndpointDescriptor {
    pub verb: HttpVerb,

    /// Path template with `{name}` placeholders, e.g. `/v2/bookings/{booking_id}`.
    pub path: String,

    pub description: String,

    pub path_params: Vec<PathParam>,

    pub query_params: Vec<QueryParam>,

    /// Key into the type registry. Used for schema lookups and multipart file discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,

    /// Send `multipart/form-data` (JSON `request` part + file parts) instead of a JSON body.
    pub multipart: bool,

    /// Mutates remote state. Blocked when writes are disallowed.
    pub write: bool,
}

/// Wire shape of [`EndpointDescriptor`]: `write` may be omitted and then follows the verb.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawEndpointDescriptor {
    verb: HttpVerb,
    path: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    path_params: Vec<PathParam>,
    #[serde(default)]
    query_params: Vec<QueryParam>,
    #[serde(default)]
    request_type: Option<String>,
    #[serde(default)]
    multipart: bool,
    #[serde(default)]
    write: Option<bool>,
}

impl From<RawEndpointDescriptor> for EndpointDescriptor {
    fn from(raw: RawEndpointDescriptor) -> Self {
        Self {
            write: raw.write.unwrap_or_else(|| raw.verb.is_mutating()),
            verb: raw.verb,
            path: raw.path,
            description: raw.description,
            path_params: raw.path_params,
            query_params: raw.query_params,
            request_type: raw.request_type,
            multipart: raw.multipart,
        }
    }
}

impl EndpointDescriptor {
    /// Check that the `{placeholder}` set of the path template matches the declared path
    /// parameters exactly, and that no parameter name is declared twice.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first mismatch found.
    pub fn check_placeholders(&self) -> Result<(), String> {
        let in_template = placeholders(&self.path);
        let mut template_set: HashSet<&str> = HashSet::new();
        for name in &in_template {
            if !template_set.insert(name.as_str()) {
                return Err(format!(
                    "placeholder '{{{name}}}' appears more than once in '{}'",
                    self.path
                ));
            }
        }

        let mut declared: HashSet<&str> = HashSet::new();
        for p in &self.path_params {
            if !declared.insert(p.name.as_str()) {
                return Err(format!("path parameter '{}' is declared twice", p.name));
            }
            if !template_set.contains(p.name.as_str()) {
                return Err(format!(
                    "path parameter '{}' has no placeholder in '{}'",
                    p.name, self.path
                ));
            }
        }

        if let Some(missing) = in_template
            .iter()
            .find(|name| !declared.contains(name.as_str()))
        {
            return Err(format!(
                "placeholder '{{{missing}}}' in '{}' has no declared path parameter",
                self.path
            ));
        }

        let mut query_names: HashSet<&str> = HashSet::new();
        for q in &self.query_params {
            if !query_names.insert(q.name.as_str()) {
                return Err(format!("query parameter '{}' is declared twice", q.name));
            }
            if declared.contains(q.name.as_str()) {
                return Err(format!(
                    "'{}' is declared as both a path and a query parameter",
                    q.name
                ));
            }
        }

        Ok(())
    }
}

/// Placeholder names of a path template, in template order.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn default_true() -> bool {
    true
}
