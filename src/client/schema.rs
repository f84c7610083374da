use std::collections::BTreeMap;

use serde::Serialize;

/// Shape description attached to a request so the service enforces JSON
/// output of a given structure.
///
/// Covers only the shapes this crate asks for: objects, arrays and strings.
/// Serializes to the generative language API's schema dialect, which spells
/// type names in upper case.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    Object,
    Array,
    String,
}

impl ResponseSchema {
    #[must_use]
    pub fn string() -> Self {
        Self {
            schema_type: SchemaType::String,
            properties: None,
            items: None,
            required: None,
        }
    }

    #[must_use]
    pub fn array(items: ResponseSchema) -> Self {
        Self {
            schema_type: SchemaType::Array,
            properties: None,
            items: Some(Box::new(items)),
            required: None,
        }
    }

    #[must_use]
    pub fn object(properties: Vec<(&str, ResponseSchema)>, required: Vec<&str>) -> Self {
        Self {
            schema_type: SchemaType::Object,
            properties: Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.to_string(), schema))
                    .collect(),
            ),
            items: None,
            required: Some(required.into_iter().map(str::to_string).collect()),
        }
    }
}
