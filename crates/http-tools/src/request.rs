//! Request binding: turns an endpoint descriptor plus a flat argument bag into a
//! transport-ready request.
//!
//! The bag is consumed piecewise. Declared path parameters are removed and substituted into the
//! template, declared query parameters are removed and appended as a query string, and whatever
//! remains becomes the body (JSON or multipart).

use crate::descriptor::{EndpointDescriptor, HttpVerb};
use mime::Mime;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Caller-supplied arguments for one call.
pub type ArgumentBag = Map<String, Value>;

/// Name of the JSON part of a multipart body.
pub const MULTIPART_REQUEST_PART: &str = "request";

/// Field kept in the JSON part of a multipart body even if the type registry marks it as a file.
const PRESERVED_JSON_FIELD: &str = "image";

/// Everything except RFC 3986 unreserved characters is percent-encoded.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing required path parameter '{0}'")]
    MissingPathParameter(String),

    #[error("Invalid file field '{name}': expected a file path string, got {actual}")]
    InvalidFileField { name: String, actual: &'static str },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub verb: HttpVerb,
    /// Path with substituted parameters plus the encoded query string, if any.
    pub path_and_query: String,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartBody {
    /// Serialized non-file fields, sent as the `request` part.
    pub request_json: String,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Multipart part name (the argument field name, e.g. `image_file`).
    pub field: String,
    pub file_name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

/// Bind `bag` against `descriptor`.
///
/// `file_fields` lists the request-type fields that carry file uploads; it is only consulted for
/// multipart endpoints.
///
/// # Errors
///
/// Returns an error if a required path parameter is missing, or if a multipart file field is not
/// a string, points at a missing file, or cannot be read. No I/O other than reading upload files
/// happens here.
pub async fn build_request(
    descriptor: &EndpointDescriptor,
    mut bag: ArgumentBag,
    file_fields: &[&str],
) -> Result<PreparedRequest, BuildError> {
    let path = bind_path(descriptor, &mut bag)?;
    let query = bind_query(descriptor, &mut bag);

    let mut path_and_query = path;
    if !query.is_empty() {
        path_and_query.push('?');
        path_and_query.push_str(&encode_query(&query));
    }

    let body = if descriptor.multipart {
        RequestBody::Multipart(build_multipart(bag, file_fields).await?)
    } else {
        json_body(descriptor.verb, bag)
    };

    Ok(PreparedRequest {
        verb: descriptor.verb,
        path_and_query,
        body,
    })
}

/// Remove declared path parameters from `bag` and substitute them into the template.
///
/// # Errors
///
/// Returns [`BuildError::MissingPathParameter`] for an absent required parameter. An absent
/// optional parameter drops its whole segment, so `/items/{id}/versions` binds to
/// `/items/versions` rather than `/items//versions`.
pub fn bind_path(
    descriptor: &EndpointDescriptor,
    bag: &mut ArgumentBag,
) -> Result<String, BuildError> {
    let mut path = descriptor.path.clone();
    if !path.starts_with('/') {
        path = format!("/{path}");
    }

    for param in &descriptor.path_params {
        let value = match bag.remove(&param.name) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        };
        let placeholder = format!("{{{}}}", param.name);
        match value {
            Some(v) => {
                let raw = value_to_string(&v);
                let encoded = utf8_percent_encode(&raw, COMPONENT).to_string();
                path = path.replace(&placeholder, &encoded);
            }
            None if param.required => {
                return Err(BuildError::MissingPathParameter(param.name.clone()));
            }
            None => {
                path = path.replace(&format!("/{placeholder}"), "");
                path = path.replace(&placeholder, "");
            }
        }
    }

    if path.is_empty() {
        path.push('/');
    }
    Ok(path)
}

/// Remove declared query parameters from `bag`, in declaration order. Absent parameters are
/// omitted, never defaulted.
pub fn bind_query(descriptor: &EndpointDescriptor, bag: &mut ArgumentBag) -> Vec<(String, String)> {
    descriptor
        .query_params
        .iter()
        .filter_map(|param| match bag.remove(&param.name) {
            Some(Value::Null) | None => None,
            Some(v) => Some((param.name.clone(), value_to_string(&v))),
        })
        .collect()
}

/// Percent-encode `key=value` pairs and join them with `&`.
#[must_use]
pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, COMPONENT),
                utf8_percent_encode(v, COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn json_body(verb: HttpVerb, bag: ArgumentBag) -> RequestBody {
    if bag.is_empty() {
        return RequestBody::Empty;
    }
    if !verb.carries_body() {
        let dropped: Vec<&str> = bag.keys().map(String::as_str).collect();
        warn!(verb = %verb, fields = ?dropped, "dropping body fields on a request without a body");
        return RequestBody::Empty;
    }
    RequestBody::Json(Value::Object(bag))
}

async fn build_multipart(
    bag: ArgumentBag,
    file_fields: &[&str],
) -> Result<MultipartBody, BuildError> {
    let mut json_fields = Map::new();
    let mut file_values: Vec<(String, Value)> = Vec::new();

    for (key, value) in bag {
        let is_file = key != PRESERVED_JSON_FIELD && file_fields.contains(&key.as_str());
        if is_file {
            file_values.push((key, value));
        } else {
            json_fields.insert(key, value);
        }
    }

    let mut files = Vec::with_capacity(file_values.len());
    for (field, value) in file_values {
        let path = match value {
            Value::Null => continue,
            Value::String(s) => s,
            other => {
                return Err(BuildError::InvalidFileField {
                    name: field,
                    actual: json_type_name(&other),
                });
            }
        };
        files.push(read_file_part(field, &path).await?);
    }

    let request_json = Value::Object(json_fields).to_string();
    Ok(MultipartBody {
        request_json,
        files,
    })
}

async fn read_file_part(field: String, path: &str) -> Result<FilePart, BuildError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => BuildError::FileNotFound(path.to_string()),
        _ => BuildError::FileRead {
            path: path.to_string(),
            source: e,
        },
    })?;

    let p = Path::new(path);
    let file_name = p
        .file_name()
        .map_or_else(|| field.clone(), |n| n.to_string_lossy().into_owned());

    Ok(FilePart {
        field,
        file_name,
        content_type: content_type_for(p),
        bytes,
    })
}

/// Content type for an upload, inferred from the file extension.
#[must_use]
pub fn content_type_for(path: &Path) -> Mime {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{PathParam, QueryParam};
    use serde_json::json;
    use std::collections::HashMap;

    const JPEG: &[u8] = b"\xff\xd8\xff fake jpeg";

    fn bag(v: Value) -> ArgumentBag {
        match v {
            Value::Object(m) => m,
            _ => panic!("bag must be an object"),
        }
    }

    fn endpoint(
        verb: HttpVerb,
        path: &str,
        path_params: &[&str],
        query: &[&str],
    ) -> EndpointDescriptor {
        EndpointDescriptor {
            verb,
            path: path.to_string(),
            description: String::new(),
            path_params: path_params
                .iter()
                .map(|n| PathParam {
                    name: (*n).to_string(),
                    required: true,
                })
                .collect(),
            query_params: query
                .iter()
                .map(|n| QueryParam {
                    name: (*n).to_string(),
                })
                .collect(),
            request_type: None,
            multipart: false,
            write: verb.is_mutating(),
        }
    }

    fn optional_id(path: &str) -> EndpointDescriptor {
        EndpointDescriptor {
            path_params: vec![PathParam {
                name: "id".to_string(),
                required: false,
            }],
            ..endpoint(HttpVerb::Get, path, &[], &[])
        }
    }

    fn image_upload() -> EndpointDescriptor {
        EndpointDescriptor {
            request_type: Some("CreateCatalogImageRequest".to_string()),
            multipart: true,
            ..endpoint(HttpVerb::Post, "/v2/catalog/images", &[], &[])
        }
    }

    #[tokio::test]
    async fn binds_path_query_and_body_for_write_verbs() {
        for verb in [HttpVerb::Post, HttpVerb::Put, HttpVerb::Patch] {
            let d = endpoint(verb, "/v2/items/{id}", &["id"], &["limit"]);
            let args = bag(json!({"id": "abc", "limit": 5, "extra": "x"}));
            let req = build_request(&d, args, &[]).await.expect("build");

            assert_eq!(req.path_and_query, "/v2/items/abc?limit=5");
            assert_eq!(req.body, RequestBody::Json(json!({"extra": "x"})));
        }
    }

    #[tokio::test]
    async fn get_and_delete_never_carry_a_body() {
        for verb in [HttpVerb::Get, HttpVerb::Delete] {
            let d = endpoint(verb, "/v2/items/{id}", &["id"], &["limit"]);
            let args = bag(json!({"id": "abc", "limit": 5, "extra": "x"}));
            let req = build_request(&d, args, &[]).await.expect("build");

            assert_eq!(req.path_and_query, "/v2/items/abc?limit=5");
            assert_eq!(req.body, RequestBody::Empty);
        }
    }

    #[tokio::test]
    async fn empty_remainder_sends_no_body() {
        let d = endpoint(HttpVerb::Post, "/v2/items/{id}/publish", &["id"], &[]);
        let args = bag(json!({"id": "abc"}));
        let req = build_request(&d, args, &[]).await.expect("build");
        assert_eq!(req.body, RequestBody::Empty);
        assert_eq!(req.path_and_query, "/v2/items/abc/publish");
    }

    #[tokio::test]
    async fn missing_required_path_parameter_fails() {
        let d = endpoint(HttpVerb::Get, "/v2/bookings/{id}", &["id"], &[]);
        let err = build_request(&d, bag(json!({})), &[]).await.unwrap_err();
        match err {
            BuildError::MissingPathParameter(name) => assert_eq!(name, "id"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn null_path_parameter_counts_as_missing() {
        let d = endpoint(HttpVerb::Get, "/v2/bookings/{id}", &["id"], &[]);
        let args = bag(json!({"id": null}));
        let err = build_request(&d, args, &[]).await.unwrap_err();
        assert!(matches!(err, BuildError::MissingPathParameter(_)));
    }

    #[test]
    fn absent_optional_path_parameter_drops_its_segment() {
        let d = optional_id("/v2/items/{id}/versions");
        let path = bind_path(&d, &mut bag(json!({}))).expect("bind");
        assert_eq!(path, "/v2/items/versions");

        let d = optional_id("/v2/items/{id}");
        let path = bind_path(&d, &mut bag(json!({"id": null}))).expect("bind");
        assert_eq!(path, "/v2/items");

        let d = optional_id("/{id}");
        let path = bind_path(&d, &mut bag(json!({}))).expect("bind");
        assert_eq!(path, "/");
    }

    #[test]
    fn present_optional_path_parameter_is_bound() {
        let d = optional_id("/v2/items/{id}/versions");
        let path = bind_path(&d, &mut bag(json!({"id": 7}))).expect("bind");
        assert_eq!(path, "/v2/items/7/versions");
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let d = endpoint(HttpVerb::Get, "/v2/customers/{id}", &["id"], &[]);
        let mut b = bag(json!({"id": "a/b c"}));
        let path = bind_path(&d, &mut b).expect("bind");
        assert_eq!(path, "/v2/customers/a%2Fb%20c");
        assert!(b.is_empty());
    }

    #[test]
    fn absent_query_parameters_are_omitted() {
        let query = ["cursor", "limit", "sort_order"];
        let d = endpoint(HttpVerb::Get, "/v2/payments", &[], &query);
        let mut b = bag(json!({"limit": 10, "sort_order": null}));
        let pairs = bind_query(&d, &mut b);
        assert_eq!(pairs, vec![("limit".to_string(), "10".to_string())]);
        assert!(b.is_empty());
    }

    #[test]
    fn query_string_roundtrips_reserved_characters() {
        let pairs = vec![
            ("query".to_string(), "coffee & tea".to_string()),
            ("filter".to_string(), "a=b".to_string()),
            ("note".to_string(), "100% real?".to_string()),
            ("flag".to_string(), "true".to_string()),
        ];
        let encoded = encode_query(&pairs);
        assert!(!encoded.contains(' '));
        assert_eq!(encoded.matches('&').count(), pairs.len() - 1);

        let decoded: Vec<(String, String)> = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(decoded, pairs);
    }

    #[tokio::test]
    async fn multipart_missing_file_fails_before_network() {
        let missing = std::env::temp_dir().join("commerce-missing-upload.png");
        let err = build_request(
            &image_upload(),
            bag(json!({
                "idempotency_key": "k-1",
                "image_file": missing.to_string_lossy(),
            })),
            &["image_file"],
        )
        .await
        .unwrap_err();
        match err {
            BuildError::FileNotFound(path) => assert!(path.ends_with(".png"), "{path}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn multipart_rejects_non_string_file_field() {
        let args = bag(json!({"image_file": 42}));
        let err = build_request(&image_upload(), args, &["image_file"])
            .await
            .unwrap_err();
        match err {
            BuildError::InvalidFileField { name, actual } => {
                assert_eq!(name, "image_file");
                assert_eq!(actual, "number");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn multipart_splits_json_and_file_parts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("Photo.JPG");
        std::fs::write(&file, JPEG).expect("write fixture");

        let req = build_request(
            &image_upload(),
            bag(json!({
                "idempotency_key": "k-1",
                "object_id": "ITEM_1",
                "image": {"type": "IMAGE", "id": "#img"},
                "image_file": file.to_string_lossy(),
            })),
            &["image", "image_file"],
        )
        .await
        .expect("build");

        let RequestBody::Multipart(body) = req.body else {
            panic!("expected multipart body");
        };
        let request: HashMap<String, Value> =
            serde_json::from_str(&body.request_json).expect("json");
        let image = json!({"type": "IMAGE", "id": "#img"});
        assert_eq!(request.get("object_id"), Some(&json!("ITEM_1")));
        assert_eq!(request.get("image"), Some(&image));
        assert!(!request.contains_key("image_file"));

        assert_eq!(body.files.len(), 1);
        let part = &body.files[0];
        assert_eq!(part.field, "image_file");
        assert_eq!(part.file_name, "Photo.JPG");
        assert_eq!(part.content_type, mime::IMAGE_JPEG);
        assert_eq!(part.bytes, JPEG);
    }

    #[tokio::test]
    async fn multipart_without_file_value_sends_json_part_only() {
        let args = bag(json!({"idempotency_key": "k-2"}));
        let req = build_request(&image_upload(), args, &["image_file"])
            .await
            .expect("build");
        let RequestBody::Multipart(body) = req.body else {
            panic!("expected multipart body");
        };
        assert!(body.files.is_empty());
        assert_eq!(body.request_json, r#"{"idempotency_key":"k-2"}"#);
    }

    #[test]
    fn content_type_inference() {
        let pdf = mime::APPLICATION_PDF;
        let octet = mime::APPLICATION_OCTET_STREAM;
        assert_eq!(content_type_for(Path::new("a.jpeg")), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(Path::new("a.png")), mime::IMAGE_PNG);
        assert_eq!(content_type_for(Path::new("a.gif")), mime::IMAGE_GIF);
        assert_eq!(content_type_for(Path::new("evidence.PDF")), pdf);
        assert_eq!(content_type_for(Path::new("notes.txt")), octet);
        assert_eq!(content_type_for(Path::new("no_extension")), octet);
    }
}
