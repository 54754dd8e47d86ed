use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::domain::descriptor::{ArgumentKind, ArgumentSpec, ToolDescriptor};

pub type JsonObject = Map<String, Value>;

/// Executable argument schema. Base types sit at the leaves, `Optional` and
/// `WithDefault` wrap them in any order.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array(Box<SchemaNode>),
    Enum(Vec<String>),
    Optional(Box<SchemaNode>),
    WithDefault(Box<SchemaNode>, Value),
}

impl SchemaNode {
    pub fn string() -> Self {
        SchemaNode::String {
            min_length: None,
            max_length: None,
        }
    }

    pub fn number() -> Self {
        SchemaNode::Number {
            minimum: None,
            maximum: None,
        }
    }

    pub fn array_of(items: SchemaNode) -> Self {
        SchemaNode::Array(Box::new(items))
    }

    pub fn optional(self) -> Self {
        SchemaNode::Optional(Box::new(self))
    }

    pub fn with_default(self, value: Value) -> Self {
        SchemaNode::WithDefault(Box::new(self), value)
    }

    /// Innermost non-modifier node.
    pub fn base(&self) -> &SchemaNode {
        let mut node = self;
        loop {
            match node {
                SchemaNode::Optional(inner) | SchemaNode::WithDefault(inner, _) => node = inner,
                other => return other,
            }
        }
    }

    /// First default found walking the modifier chain outside-in.
    pub fn default_value(&self) -> Option<&Value> {
        let mut node = self;
        loop {
            match node {
                SchemaNode::WithDefault(_, value) => return Some(value),
                SchemaNode::Optional(inner) => node = inner,
                _ => return None,
            }
        }
    }

    pub fn is_optional(&self) -> bool {
        let mut node = self;
        loop {
            match node {
                SchemaNode::Optional(_) => return true,
                SchemaNode::WithDefault(inner, _) => node = inner,
                _ => return false,
            }
        }
    }

    fn from_spec(spec: &ArgumentSpec) -> Self {
        let base = match spec.kind {
            ArgumentKind::String => SchemaNode::String {
                min_length: spec.min.map(|v| v as usize),
                max_length: spec.max.map(|v| v as usize),
            },
            ArgumentKind::Number => SchemaNode::Number {
                minimum: spec.min,
                maximum: spec.max,
            },
            ArgumentKind::Boolean => SchemaNode::Boolean,
            ArgumentKind::StringArray => SchemaNode::array_of(SchemaNode::string()),
            ArgumentKind::Enum => SchemaNode::Enum(spec.values.clone()),
        };
        match (&spec.default, spec.is_required()) {
            (Some(default), _) => base.with_default(default.clone()),
            (None, false) => base.optional(),
            (None, true) => base,
        }
    }

    fn check(&self, value: &Value, path: &str, violations: &mut Vec<FieldViolation>) {
        match self.base() {
            SchemaNode::String {
                min_length,
                max_length,
            } => {
                let Some(s) = value.as_str() else {
                    violations.push(FieldViolation::mismatch(path, "string", value));
                    return;
                };
                let len = s.chars().count();
                if let Some(min) = min_length {
                    if len < *min {
                        violations.push(FieldViolation::new(
                            path,
                            format!("must contain at least {min} character(s)"),
                        ));
                    }
                }
                if let Some(max) = max_length {
                    if len > *max {
                        violations.push(FieldViolation::new(
                            path,
                            format!("must contain at most {max} character(s)"),
                        ));
                    }
                }
            }
            SchemaNode::Number { minimum, maximum } => {
                let Some(n) = value.as_f64() else {
                    violations.push(FieldViolation::mismatch(path, "number", value));
                    return;
                };
                if let Some(min) = minimum {
                    if n < *min {
                        violations.push(FieldViolation::new(
                            path,
                            format!("must be greater than or equal to {min}"),
                        ));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        violations.push(FieldViolation::new(
                            path,
                            format!("must be less than or equal to {max}"),
                        ));
                    }
                }
            }
            SchemaNode::Boolean => {
                if !value.is_boolean() {
                    violations.push(FieldViolation::mismatch(path, "boolean", value));
                }
            }
            SchemaNode::Array(items) => {
                let Some(values) = value.as_array() else {
                    violations.push(FieldViolation::mismatch(path, "array", value));
                    return;
                };
                for (idx, item) in values.iter().enumerate() {
                    items.check(item, &format!("{path}[{idx}]"), violations);
                }
            }
            SchemaNode::Enum(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|v| v == s) => {}
                _ => violations.push(FieldViolation::new(
                    path,
                    format!(
                        "invalid enum value {value}, expected one of: {}",
                        allowed.join(", ")
                    ),
                )),
            },
            SchemaNode::Optional(inner) | SchemaNode::WithDefault(inner, _) => {
                inner.check(value, path, violations)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub key: String,
    pub description: String,
    pub node: SchemaNode,
}

impl FieldSchema {
    pub fn new(key: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            node,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered object schema for one tool's arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub fields: Vec<FieldSchema>,
}

impl ObjectSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        let fields = descriptor
            .arguments
            .iter()
            .map(|spec| FieldSchema {
                key: spec.key.clone(),
                description: spec.description.clone(),
                node: SchemaNode::from_spec(spec),
            })
            .collect();
        Self { fields }
    }

    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Validate `args`, filling defaults and dropping undeclared keys. Every
    /// violated field is reported, not only the first.
    pub fn parse(&self, args: &JsonObject) -> Result<JsonObject, ValidationError> {
        let mut parsed = JsonObject::new();
        let mut violations = Vec::new();
        for field in &self.fields {
            match args.get(&field.key) {
                None | Some(Value::Null) => {
                    if let Some(default) = field.node.default_value() {
                        parsed.insert(field.key.clone(), default.clone());
                    } else if !field.node.is_optional() {
                        violations.push(FieldViolation::new(&field.key, "required"));
                    }
                }
                Some(value) => {
                    let before = violations.len();
                    field.node.check(value, &field.key, &mut violations);
                    if violations.len() == before {
                        parsed.insert(field.key.clone(), value.clone());
                    }
                }
            }
        }
        if violations.is_empty() {
            Ok(parsed)
        } else {
            Err(ValidationError { violations })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn mismatch(field: &str, expected: &str, received: &Value) -> Self {
        Self::new(
            field,
            format!("expected {expected}, received {}", json_type_name(received)),
        )
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
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
