//! Endpoint registry: service name → method name → endpoint descriptor.
//!
//! Built once at startup from a [`RegistryDocument`] and read-only afterwards. Service names are
//! resolved case-insensitively through an index computed at construction; method names are
//! matched exactly.

use crate::error::{RegistryError, Result};
use crate::model::RegistryDocument;
use crate::types::TypeRegistry;
use commerce_http_tools::EndpointDescriptor;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

const BUILTIN_LOCATION: &str = "<builtin>";
const BUILTIN_DOCUMENT: &str = include_str!("../data/endpoints.yaml");

#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    description: String,
    methods: BTreeMap<String, EndpointDescriptor>,
}

impl Service {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn method(&self, method: &str) -> Option<&EndpointDescriptor> {
        self.methods.get(method)
    }

    /// Sorted method names.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &EndpointDescriptor)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    services: BTreeMap<String, Service>,
    /// Lower-cased service name → canonical name.
    index: HashMap<String, String>,
}

impl EndpointRegistry {
    /// Resolve a service name regardless of casing (`bookings`, `Bookings`, `BOOKINGS`).
    #[must_use]
    pub fn resolve_service(&self, name: &str) -> Option<&Service> {
        let canonical = self.index.get(&name.to_ascii_lowercase())?;
        self.services.get(canonical)
    }

    #[must_use]
    pub fn lookup(&self, service: &str, method: &str) -> Option<&EndpointDescriptor> {
        self.resolve_service(service)?.method(method)
    }

    /// Sorted canonical service names.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.services.values().map(|s| s.methods.len()).sum()
    }
}

/// Both registries, loaded and validated together.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    endpoints: EndpointRegistry,
    types: TypeRegistry,
}

impl Registry {
    /// The registry compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded document is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_LOCATION, BUILTIN_DOCUMENT)
    }

    /// Load a registry document from disk (YAML or JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let location = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: location.clone(),
            source,
        })?;
        Self::from_yaml_str(&location, &text)
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not a valid registry document.
    pub fn from_yaml_str(location: &str, text: &str) -> Result<Self> {
        let doc: RegistryDocument =
            serde_yaml::from_str(text).map_err(|source| RegistryError::Parse {
                location: location.to_string(),
                source,
            })?;
        let registry = Self::from_document(doc)?;
        info!(
            location = %location,
            services = registry.endpoints.services.len(),
            endpoints = registry.endpoints.endpoint_count(),
            "endpoint registry loaded"
        );
        Ok(registry)
    }

    /// Validate a document and build the lookup tables.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Invalid`] if:
    /// - two service names differ only by case, or a service has no methods
    /// - a path template and its declared path parameters disagree
    /// - a multipart endpoint has no registered request type with a file field
    pub fn from_document(doc: RegistryDocument) -> Result<Self> {
        let types = TypeRegistry::new(doc.types);

        let mut services = BTreeMap::new();
        let mut index = HashMap::new();

        for (service_name, service_doc) in doc.services {
            let lower = service_name.to_ascii_lowercase();
            if let Some(existing) = index.insert(lower, service_name.clone()) {
                return Err(RegistryError::Invalid(format!(
                    "service names '{existing}' and '{service_name}' differ only by case"
                )));
            }
            if service_doc.methods.is_empty() {
                return Err(RegistryError::Invalid(format!(
                    "service '{service_name}' declares no methods"
                )));
            }

            for (method_name, descriptor) in &service_doc.methods {
                descriptor.check_placeholders().map_err(|e| {
                    RegistryError::Invalid(format!("{service_name}.{method_name}: {e}"))
                })?;
                if descriptor.multipart {
                    check_multipart_type(&types, &service_name, method_name, descriptor)?;
                }
            }

            services.insert(
                service_name.clone(),
                Service {
                    name: service_name,
                    description: service_doc.description,
                    methods: service_doc.methods,
                },
            );
        }

        Ok(Self {
            endpoints: EndpointRegistry { services, index },
            types,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }
}

fn check_multipart_type(
    types: &TypeRegistry,
    service: &str,
    method: &str,
    descriptor: &EndpointDescriptor,
) -> Result<()> {
    let Some(type_name) = descriptor.request_type.as_deref() else {
        return Err(RegistryError::Invalid(format!(
            "{service}.{method}: multipart endpoint has no requestType"
        )));
    };
    if !types.contains(type_name) {
        return Err(RegistryError::Invalid(format!(
            "{service}.{method}: multipart request type '{type_name}' is not registered"
        )));
    }
    if types.file_fields(type_name).is_empty() {
        return Err(RegistryError::Invalid(format!(
            "{service}.{method}: multipart request type '{type_name}' has no file field"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_http_tools::descriptor::placeholders;
    use commerce_http_tools::{HttpVerb, build_request};
    use serde_json::{Map, Value};
    use std::collections::HashSet;

    #[test]
    fn builtin_registry_loads() {
        let registry = Registry::builtin().expect("builtin registry");
        assert!(registry.endpoints().service_names().len() >= 10);
        assert!(registry.endpoints().endpoint_count() >= 50);
    }

    #[test]
    fn every_builtin_path_template_matches_its_path_params() {
        let registry = Registry::builtin().expect("builtin registry");
        for service in registry.endpoints().services() {
            for (method, d) in service.methods() {
                let in_template: HashSet<String> = placeholders(&d.path).into_iter().collect();
                let declared: HashSet<String> =
                    d.path_params.iter().map(|p| p.name.clone()).collect();
                assert_eq!(
                    in_template,
                    declared,
                    "{}.{method} ({})",
                    service.name(),
                    d.path
                );
            }
        }
    }

    /// Every descriptor is servable by the generic request builder: binding it with all path
    /// parameters present always succeeds.
    #[tokio::test]
    async fn every_builtin_descriptor_binds() {
        let registry = Registry::builtin().expect("builtin registry");
        for service in registry.endpoints().services() {
            for (method, d) in service.methods() {
                let mut bag = Map::new();
                for p in &d.path_params {
                    bag.insert(p.name.clone(), Value::String(format!("{}-value", p.name)));
                }
                let file_fields = d
                    .request_type
                    .as_deref()
                    .map(|t| registry.types().file_fields(t))
                    .unwrap_or_default();

                let req = build_request(d, bag, &file_fields)
                    .await
                    .unwrap_or_else(|e| panic!("{}.{method}: {e}", service.name()));
                assert!(!req.path_and_query.contains('{'), "{}", req.path_and_query);
                assert_eq!(req.verb, d.verb);
            }
        }
    }

    #[test]
    fn multipart_endpoints_expose_a_file_field() {
        let registry = Registry::builtin().expect("builtin registry");
        let image = registry
            .endpoints()
            .lookup("Catalog", "createImage")
            .expect("catalog image upload");
        assert!(image.multipart);
        let type_name = image.request_type.as_deref().expect("request type");
        assert_eq!(registry.types().file_fields(type_name), vec!["image_file"]);

        let evidence = registry
            .endpoints()
            .lookup("Disputes", "createEvidenceFile")
            .expect("dispute evidence upload");
        assert!(evidence.multipart);
    }

    #[test]
    fn service_lookup_is_case_insensitive() {
        let registry = Registry::builtin().expect("builtin registry");
        let endpoints = registry.endpoints();
        for name in ["bookings", "Bookings", "BOOKINGS"] {
            let service = endpoints.resolve_service(name).expect("bookings");
            assert_eq!(service.name(), "Bookings");
        }
        assert!(endpoints.resolve_service("bookingz").is_none());
        assert!(endpoints.lookup("bookings", "Retrieve").is_none());
    }

    #[test]
    fn search_endpoints_are_not_writes() {
        let registry = Registry::builtin().expect("builtin registry");
        let search = registry
            .endpoints()
            .lookup("Customers", "search")
            .expect("customers.search");
        assert_eq!(search.verb, HttpVerb::Post);
        assert!(!search.write);

        let create = registry
            .endpoints()
            .lookup("Customers", "create")
            .expect("customers.create");
        assert!(create.write);
    }

    #[test]
    fn mismatched_placeholders_are_rejected() {
        let yaml = r"
services:
  Widgets:
    methods:
      get:
        verb: GET
        path: /v2/widgets/{widget_id}
";
        let err = Registry::from_yaml_str("test", yaml).unwrap_err();
        match err {
            RegistryError::Invalid(msg) => assert!(msg.contains("widget_id"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn case_colliding_services_are_rejected() {
        let yaml = r"
services:
  Widgets:
    methods:
      list: { verb: GET, path: /v2/widgets }
  widgets:
    methods:
      list: { verb: GET, path: /v2/widgets }
";
        let err = Registry::from_yaml_str("test", yaml).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)), "{err}");
    }

    #[test]
    fn multipart_without_file_field_is_rejected() {
        let yaml = r"
services:
  Widgets:
    methods:
      upload:
        verb: POST
        path: /v2/widgets/images
        multipart: true
        requestType: UploadWidgetImageRequest
types:
  UploadWidgetImageRequest:
    fields:
      - { name: idempotency_key, required: true }
";
        let err = Registry::from_yaml_str("test", yaml).unwrap_err();
        match err {
            RegistryError::Invalid(msg) => assert!(msg.contains("no file field"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_document_keys_are_rejected() {
        let err = Registry::from_yaml_str("test", "servicez: {}\n").unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }), "{err}");
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.yaml");
        std::fs::write(
            &path,
            "services:\n  Widgets:\n    methods:\n      list: { verb: GET, path: /v2/widgets }\n",
        )
        .expect("write registry");

        let registry = Registry::load(&path).expect("load");
        assert_eq!(registry.endpoints().service_names(), vec!["Widgets"]);

        let missing = Registry::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, RegistryError::Read { .. }));
    }
}
