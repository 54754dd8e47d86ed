//! JSON Schema advertisement for tool argument schemas.
//!
//! Translation never fails: a schema that cannot be expressed is logged and
//! advertised as an empty object schema so tool listing keeps working.

use serde_json::{Value, json};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::schema::{FieldSchema, JsonObject, ObjectSchema, SchemaNode};

#[derive(Debug, Error, PartialEq)]
enum TranslateError {
    #[error("field key is empty")]
    EmptyKey,
    #[error("field '{0}' is declared more than once")]
    DuplicateKey(String),
    #[error("field '{0}' has a non-finite bound")]
    NonFiniteBound(String),
}

pub fn empty_object_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(JsonObject::new()));
    schema.insert("required".into(), json!([]));
    schema
}

/// Translate an argument schema into `{type:"object", properties, required}`.
pub fn to_json_schema(schema: &ObjectSchema) -> JsonObject {
    match try_translate(schema) {
        Ok(translated) => translated,
        Err(err) => {
            tracing::warn!(%err, "argument schema not translatable; advertising empty object");
            empty_object_schema()
        }
    }
}

fn try_translate(schema: &ObjectSchema) -> Result<JsonObject, TranslateError> {
    let mut seen = HashSet::new();
    let mut properties = JsonObject::new();
    let mut required = Vec::new();
    for field in &schema.fields {
        if field.key.is_empty() {
            return Err(TranslateError::EmptyKey);
        }
        if !seen.insert(field.key.as_str()) {
            return Err(TranslateError::DuplicateKey(field.key.clone()));
        }
        let mut property = translate_node(&field.node, &field.key)?;
        property.insert("description".into(), json!(field.description));
        if let Some(default) = field.node.default_value() {
            property.insert("default".into(), default.clone());
        }
        if is_required(&field.node) {
            required.push(json!(field.key));
        }
        properties.insert(field.key.clone(), Value::Object(property));
    }

    let mut out = JsonObject::new();
    out.insert("type".into(), json!("object"));
    out.insert("properties".into(), Value::Object(properties));
    out.insert("required".into(), Value::Array(required));
    Ok(out)
}

fn translate_node(node: &SchemaNode, key: &str) -> Result<JsonObject, TranslateError> {
    let mut out = JsonObject::new();
    match node.base() {
        SchemaNode::String { .. } => {
            out.insert("type".into(), json!("string"));
        }
        SchemaNode::Number { minimum, maximum } => {
            out.insert("type".into(), json!("number"));
            for (name, bound) in [("minimum", minimum), ("maximum", maximum)] {
                if let Some(bound) = bound {
                    let value = number_value(*bound)
                        .ok_or_else(|| TranslateError::NonFiniteBound(key.to_string()))?;
                    out.insert(name.into(), value);
                }
            }
        }
        SchemaNode::Boolean => {
            out.insert("type".into(), json!("boolean"));
        }
        SchemaNode::Array(items) => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), Value::Object(translate_node(items, key)?));
        }
        SchemaNode::Enum(values) => {
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), json!(values));
        }
        // base() never yields a modifier
        SchemaNode::Optional(inner) | SchemaNode::WithDefault(inner, _) => {
            return translate_node(inner, key);
        }
    }
    Ok(out)
}

/// Integral bounds are advertised as integers (`1`, not `1.0`).
fn number_value(bound: f64) -> Option<Value> {
    if !bound.is_finite() {
        return None;
    }
    if bound.fract() == 0.0 && bound.abs() < i64::MAX as f64 {
        return Some(json!(bound as i64));
    }
    serde_json::Number::from_f64(bound).map(Value::Number)
}

/// A field is required when no layer of its modifier chain is `Optional` or
/// `WithDefault`. Modifiers always wrap the base node, so a chain without one
/// at the top has none at all.
pub fn is_required(node: &SchemaNode) -> bool {
    !matches!(
        node,
        SchemaNode::Optional(_) | SchemaNode::WithDefault(_, _)
    )
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaImportError {
    #[error("expected an object schema")]
    NotAnObject,
    #[error("property '{0}' is not an object")]
    InvalidProperty(String),
    #[error("property '{key}' has unsupported type '{kind}'")]
    UnsupportedType { key: String, kind: String },
}

/// Rebuild an argument schema from advertised JSON Schema.
///
/// Listed in `required` maps to the bare node, a `default` to `WithDefault`,
/// anything else to `Optional`.
pub fn from_json_schema(schema: &JsonObject) -> Result<ObjectSchema, SchemaImportError> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Err(SchemaImportError::NotAnObject);
    }
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(ObjectSchema::default());
    };

    let mut fields = Vec::with_capacity(properties.len());
    for (key, property) in properties {
        let property = property
            .as_object()
            .ok_or_else(|| SchemaImportError::InvalidProperty(key.clone()))?;
        let mut node = import_node(key, property)?;
        if let Some(default) = property.get("default") {
            node = node.with_default(default.clone());
        } else if !required.contains(&key.as_str()) {
            node = node.optional();
        }
        let description = property
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        fields.push(FieldSchema::new(key.clone(), node).describe(description));
    }
    // `properties` carries no order; required keys keep the order they were listed in
    fields.sort_by_key(|field| {
        required
            .iter()
            .position(|key| *key == field.key)
            .unwrap_or(usize::MAX)
    });
    Ok(ObjectSchema::new(fields))
}

fn import_node(key: &str, property: &JsonObject) -> Result<SchemaNode, SchemaImportError> {
    let kind = property
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("string");
    let length = |name: &str| {
        property
            .get(name)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
    };
    let node = match kind {
        "string" => match property.get("enum").and_then(Value::as_array) {
            Some(values) => SchemaNode::Enum(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            None => SchemaNode::String {
                min_length: length("minLength"),
                max_length: length("maxLength"),
            },
        },
        "number" | "integer" => SchemaNode::Number {
            minimum: property.get("minimum").and_then(Value::as_f64),
            maximum: property.get("maximum").and_then(Value::as_f64),
        },
        "boolean" => SchemaNode::Boolean,
        "array" => {
            let items = match property.get("items") {
                Some(Value::Object(items)) => import_node(key, items)?,
                Some(_) => return Err(SchemaImportError::InvalidProperty(key.to_string())),
                None => SchemaNode::string(),
            };
            SchemaNode::array_of(items)
        }
        other => {
            return Err(SchemaImportError::UnsupportedType {
                key: key.to_string(),
                kind: other.to_string(),
            });
        }
    };
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::descriptor::{ArgumentKind, ArgumentSpec, ToolDescriptor};
    use proptest::prelude::*;

    fn new_releases() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSchema::new("token", SchemaNode::string())
                .describe("Spotify access token for authentication"),
            FieldSchema::new(
                "limit",
                SchemaNode::Number {
                    minimum: Some(1.0),
                    maximum: Some(50.0),
                }
                .with_default(json!(20)),
            )
            .describe("Number of items to return (1-50)"),
            FieldSchema::new("country", SchemaNode::string().optional()),
        ])
    }

    #[test]
    fn translates_fields_defaults_and_required() {
        let schema = to_json_schema(&new_releases());
        assert_eq!(
            Value::Object(schema),
            json!({
                "type": "object",
                "properties": {
                    "token": {
                        "type": "string",
                        "description": "Spotify access token for authentication"
                    },
                    "limit": {
                        "type": "number",
                        "minimum": 1,
                        "maximum": 50,
                        "description": "Number of items to return (1-50)",
                        "default": 20
                    },
                    "country": {"type": "string", "description": ""}
                },
                "required": ["token"]
            })
        );
    }

    #[test]
    fn arrays_and_enums() {
        let schema = ObjectSchema::new(vec![
            FieldSchema::new("trackIds", SchemaNode::array_of(SchemaNode::string())),
            FieldSchema::new(
                "type",
                SchemaNode::Enum(vec!["track".into(), "album".into()]).with_default(json!("track")),
            ),
        ]);
        let out = to_json_schema(&schema);
        assert_eq!(
            out["properties"]["trackIds"],
            json!({"type": "array", "items": {"type": "string"}, "description": ""})
        );
        assert_eq!(out["properties"]["type"]["enum"], json!(["track", "album"]));
        assert_eq!(out["properties"]["type"]["default"], json!("track"));
        assert_eq!(out["required"], json!(["trackIds"]));
    }

    #[test]
    fn required_walks_the_whole_chain() {
        let base = SchemaNode::string();
        assert!(is_required(&base));
        assert!(!is_required(&base.clone().optional()));
        assert!(!is_required(&base.clone().with_default(json!("x"))));
        assert!(!is_required(
            &base.clone().optional().with_default(json!("x"))
        ));
        assert!(!is_required(&base.with_default(json!("x")).optional()));
        assert!(is_required(&SchemaNode::array_of(
            SchemaNode::string().optional()
        )));
    }

    #[test]
    fn malformed_schemas_fail_open() {
        let duplicate = ObjectSchema::new(vec![
            FieldSchema::new("token", SchemaNode::string()),
            FieldSchema::new("token", SchemaNode::number()),
        ]);
        assert_eq!(to_json_schema(&duplicate), empty_object_schema());

        let empty_key = ObjectSchema::new(vec![FieldSchema::new("", SchemaNode::string())]);
        assert_eq!(to_json_schema(&empty_key), empty_object_schema());

        let nan = ObjectSchema::new(vec![FieldSchema::new(
            "volume",
            SchemaNode::Number {
                minimum: Some(f64::NAN),
                maximum: None,
            },
        )]);
        assert_eq!(to_json_schema(&nan), empty_object_schema());
    }

    #[test]
    fn fractional_bounds_stay_fractional() {
        let schema = ObjectSchema::new(vec![FieldSchema::new(
            "energy",
            SchemaNode::Number {
                minimum: Some(0.0),
                maximum: Some(0.5),
            },
        )]);
        let out = to_json_schema(&schema);
        assert_eq!(out["properties"]["energy"]["minimum"], json!(0));
        assert_eq!(out["properties"]["energy"]["maximum"], json!(0.5));
    }

    #[test]
    fn import_rejects_non_object_schemas() {
        let mut schema = JsonObject::new();
        schema.insert("type".into(), json!("array"));
        assert_eq!(
            from_json_schema(&schema).unwrap_err(),
            SchemaImportError::NotAnObject
        );
    }

    #[test]
    fn re_translation_is_idempotent() {
        let first = to_json_schema(&new_releases());
        let rebuilt = from_json_schema(&first).expect("import");
        assert_eq!(to_json_schema(&rebuilt), first);
    }

    fn arb_spec() -> impl Strategy<Value = ArgumentSpec> {
        let kinds = prop_oneof![
            Just(ArgumentKind::String),
            Just(ArgumentKind::Number),
            Just(ArgumentKind::Boolean),
            Just(ArgumentKind::StringArray),
            Just(ArgumentKind::Enum),
        ];
        (kinds, any::<bool>(), any::<bool>()).prop_map(|(kind, required, defaulted)| {
            let mut spec = ArgumentSpec::new("placeholder", kind).describe("d");
            if kind == ArgumentKind::Enum {
                spec = spec.one_of(["a", "b"]);
            }
            if kind == ArgumentKind::Number {
                spec = spec.range(1.0, 50.0);
            }
            if defaulted {
                let default = match kind {
                    ArgumentKind::String => json!("x"),
                    ArgumentKind::Number => json!(20),
                    ArgumentKind::Boolean => json!(false),
                    ArgumentKind::StringArray => json!(["x"]),
                    ArgumentKind::Enum => json!("a"),
                };
                spec.with_default(default)
            } else if required {
                spec
            } else {
                spec.optional()
            }
        })
    }

    fn arb_descriptor() -> impl Strategy<Value = ToolDescriptor> {
        prop::collection::vec(arb_spec(), 0..6).prop_map(|specs| ToolDescriptor {
            name: "generated_tool".into(),
            title: "Generated".into(),
            category: "test".into(),
            description: String::new(),
            prompt: String::new(),
            arguments: specs
                .into_iter()
                .enumerate()
                .map(|(idx, mut spec)| {
                    spec.key = format!("arg{idx}");
                    spec
                })
                .collect(),
        })
    }

    proptest! {
        #[test]
        fn translation_matches_descriptor(descriptor in arb_descriptor()) {
            let out = to_json_schema(&ObjectSchema::from_descriptor(&descriptor));
            let required: Vec<&str> = out["required"]
                .as_array()
                .map(|keys| keys.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            prop_assert_eq!(required, descriptor.required_keys());
            for spec in &descriptor.arguments {
                let property = &out["properties"][spec.key.as_str()];
                let expected_type = match spec.kind {
                    ArgumentKind::String | ArgumentKind::Enum => "string",
                    ArgumentKind::Number => "number",
                    ArgumentKind::Boolean => "boolean",
                    ArgumentKind::StringArray => "array",
                };
                prop_assert_eq!(property["type"].as_str(), Some(expected_type));
                match &spec.default {
                    Some(default) => prop_assert_eq!(&property["default"], default),
                    None => prop_assert!(property.get("default").is_none()),
                }
            }
        }

        #[test]
        fn round_trip_is_stable(descriptor in arb_descriptor()) {
            let first = to_json_schema(&ObjectSchema::from_descriptor(&descriptor));
            let rebuilt = from_json_schema(&first).expect("import");
            prop_assert_eq!(to_json_schema(&rebuilt), first);
        }
    }
}
