use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    String,
    Number,
    Boolean,
    StringArray,
    Enum,
}

impl ArgumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentKind::String => "string",
            ArgumentKind::Number => "number",
            ArgumentKind::Boolean => "boolean",
            ArgumentKind::StringArray => "string_array",
            ArgumentKind::Enum => "enum",
        }
    }
}

/// One argument accepted by a tool.
///
/// `min`/`max` bound the value of a `number` and the character length of a
/// `string`. When `required` is omitted the argument is required unless it
/// carries a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub key: String,
    pub kind: ArgumentKind,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl ArgumentSpec {
    pub fn new(key: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            key: key.into(),
            kind,
            description: String::new(),
            required: None,
            default: None,
            min: None,
            max: None,
            values: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(self.default.is_none())
    }

    fn default_matches_kind(&self, value: &Value) -> bool {
        match self.kind {
            ArgumentKind::String => value.as_str().is_some_and(|s| {
                let len = s.chars().count() as f64;
                self.min.is_none_or(|min| len >= min) && self.max.is_none_or(|max| len <= max)
            }),
            ArgumentKind::Number => value.as_f64().is_some_and(|n| {
                self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max)
            }),
            ArgumentKind::Boolean => value.is_boolean(),
            ArgumentKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ArgumentKind::Enum => value
                .as_str()
                .is_some_and(|s| self.values.iter().any(|v| v == s)),
        }
    }
}

/// Static description of a tool. Loaded from the catalog at startup and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, rename = "argument")]
    pub arguments: Vec<ArgumentSpec>,
}

#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("tool name must be non-empty snake_case, got '{0}'")]
    InvalidName(String),
    #[error("tool '{tool}' declares argument '{key}' more than once")]
    DuplicateArgument { tool: String, key: String },
    #[error("tool '{tool}' argument '{key}' has a default and cannot be required")]
    RequiredWithDefault { tool: String, key: String },
    #[error("tool '{tool}' argument '{key}' default is not a valid {kind} value")]
    InvalidDefault {
        tool: String,
        key: String,
        kind: &'static str,
    },
    #[error("tool '{tool}' enum argument '{key}' lists no values")]
    EmptyEnum { tool: String, key: String },
    #[error("tool '{tool}' argument '{key}' has min greater than max")]
    InvertedBounds { tool: String, key: String },
}

impl ToolDescriptor {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if !is_snake_case(&self.name) {
            return Err(DescriptorError::InvalidName(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for arg in &self.arguments {
            let err_ctx = || (self.name.clone(), arg.key.clone());
            if !seen.insert(arg.key.as_str()) {
                let (tool, key) = err_ctx();
                return Err(DescriptorError::DuplicateArgument { tool, key });
            }
            if let Some(default) = &arg.default {
                if arg.required == Some(true) {
                    let (tool, key) = err_ctx();
                    return Err(DescriptorError::RequiredWithDefault { tool, key });
                }
                if !arg.default_matches_kind(default) {
                    let (tool, key) = err_ctx();
                    let kind = arg.kind.as_str();
                    return Err(DescriptorError::InvalidDefault { tool, key, kind });
                }
            }
            if arg.kind == ArgumentKind::Enum && arg.values.is_empty() {
                let (tool, key) = err_ctx();
                return Err(DescriptorError::EmptyEnum { tool, key });
            }
            if let (Some(min), Some(max)) = (arg.min, arg.max) {
                if min > max {
                    let (tool, key) = err_ctx();
                    return Err(DescriptorError::InvertedBounds { tool, key });
                }
            }
        }
        Ok(())
    }

    pub fn required_keys(&self) -> Vec<&str> {
        self.arguments
            .iter()
            .filter(|arg| arg.is_required())
            .map(|arg| arg.key.as_str())
            .collect()
    }
}

fn is_snake_case(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
