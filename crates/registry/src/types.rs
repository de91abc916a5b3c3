//! Type registry: request-type name → field descriptors.

use crate::model::{FieldDescriptor, TypeDefinition};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDefinition>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new(types: BTreeMap<String, TypeDefinition>) -> Self {
        Self { types }
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    #[must_use]
    pub fn fields_of(&self, type_name: &str) -> Option<&[FieldDescriptor]> {
        self.types.get(type_name).map(|t| t.fields.as_slice())
    }

    /// Names of the file-valued fields of `type_name`. Unknown types have none.
    #[must_use]
    pub fn file_fields(&self, type_name: &str) -> Vec<&str> {
        self.fields_of(type_name)
            .unwrap_or_default()
            .iter()
            .filter(|f| f.is_file)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// JSON Schema describing the request type, or `None` if the type is not registered.
    #[must_use]
    pub fn schema_of(&self, type_name: &str) -> Option<Value> {
        let def = self.types.get(type_name)?;

        let mut properties = Map::new();
        let mut required: Vec<&str> = Vec::new();
        for field in &def.fields {
            let mut prop = json!({ "type": field.field_type });
            if field.is_file {
                prop["format"] = json!("binary");
                prop["description"] = json!("Local file path to upload");
            }
            if !field.description.is_empty() {
                prop["description"] = json!(field.description);
            }
            properties.insert(field.name.clone(), prop);
            if field.required {
                required.push(&field.name);
            }
        }

        let mut schema = json!({
            "type": "object",
            "title": type_name,
            "properties": properties,
        });
        if !def.description.is_empty() {
            schema["description"] = json!(def.description);
        }
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        Some(schema)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
