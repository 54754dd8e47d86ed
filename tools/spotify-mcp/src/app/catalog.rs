use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::descriptor::{DescriptorError, ToolDescriptor};

const BUILTIN_CATALOG: &str = include_str!("../../catalog/tools.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("parse tool catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("tool '{0}' is declared more than once")]
    DuplicateTool(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "tool")]
    tools: Vec<ToolDescriptor>,
}

/// Validated tool descriptors in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: Vec<ToolDescriptor>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    pub fn from_toml(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        Self::from_descriptors(file.tools)
    }

    pub fn from_descriptors(tools: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for tool in &tools {
            tool.validate()?;
            if !names.insert(tool.name.as_str()) {
                return Err(CatalogError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tools
            .iter()
            .map(|tool| tool.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }
}
