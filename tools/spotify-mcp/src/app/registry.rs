use rmcp::model::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::app::catalog::Catalog;
use crate::app::handlers::{ToolHandler, handler_for};
use crate::app::translator::to_json_schema;
use crate::domain::descriptor::ToolDescriptor;
use crate::domain::schema::{JsonObject, ObjectSchema, ValidationError};
use crate::infra::spotify::{SpotifyClient, SpotifyError};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("Invalid arguments for tool '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        source: ValidationError,
    },
    #[error(transparent)]
    Service(#[from] SpotifyError),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("tool '{0}' has no handler")]
    MissingHandler(String),
}

/// One registered tool. Immutable once inside a registry.
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub prompt: String,
    pub schema: ObjectSchema,
    handler: ToolHandler,
}

impl ToolEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ObjectSchema,
        handler: ToolHandler,
    ) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            category: String::new(),
            description: description.into(),
            prompt: String::new(),
            schema,
            handler,
        }
    }

    pub fn from_descriptor(descriptor: &ToolDescriptor, handler: ToolHandler) -> Self {
        Self {
            name: descriptor.name.clone(),
            title: descriptor.title.clone(),
            category: descriptor.category.clone(),
            description: descriptor.description.clone(),
            prompt: descriptor.prompt.clone(),
            schema: ObjectSchema::from_descriptor(descriptor),
            handler,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn input_schema(&self) -> JsonObject {
        to_json_schema(&self.schema)
    }

    /// MCP advertisement for this entry.
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema()),
        );
        tool.title = Some(self.title.clone());
        tool
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("fields", &self.schema.fields.len())
            .finish_non_exhaustive()
    }
}

/// Validates then dispatches one call for a resolved tool.
#[derive(Clone)]
pub struct ToolInvoker {
    entry: ToolEntry,
    client: Arc<SpotifyClient>,
}

impl ToolInvoker {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Handler errors are returned unchanged.
    pub async fn call(&self, raw: JsonObject) -> Result<Value, ToolError> {
        let args = self
            .entry
            .schema
            .parse(&raw)
            .map_err(|source| ToolError::InvalidArguments {
                tool: self.entry.name.clone(),
                source,
            })?;
        (self.entry.handler)(args, self.client.clone()).await
    }
}

/// Name to tool map, built once at startup. Iteration follows registration
/// order.
#[derive(Clone)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
    client: Arc<SpotifyClient>,
}

impl ToolRegistry {
    pub fn new(client: Arc<SpotifyClient>) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            client,
        }
    }

    pub fn from_catalog(catalog: &Catalog, client: Arc<SpotifyClient>) -> Result<Self, RegistryError> {
        let mut registry = Self::new(client);
        for descriptor in catalog.tools() {
            let handler = handler_for(&descriptor.name)
                .ok_or_else(|| RegistryError::MissingHandler(descriptor.name.clone()))?;
            registry.register(ToolEntry::from_descriptor(descriptor, handler))?;
        }
        tracing::debug!(tools = registry.len(), "tool registry built");
        Ok(registry)
    }

    pub fn register(&mut self, entry: ToolEntry) -> Result<(), RegistryError> {
        if self.index.contains_key(&entry.name) {
            return Err(RegistryError::Duplicate(entry.name));
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails with `NotFound` before any argument is looked at.
    pub fn build_handler(&self, name: &str) -> Result<ToolInvoker, ToolError> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Ok(ToolInvoker {
            entry: entry.clone(),
            client: self.client.clone(),
        })
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.entries.iter().map(ToolEntry::to_tool).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handlers::bind;
    use crate::domain::schema::{FieldSchema, SchemaNode};
    use serde::Deserialize;
    use serde_json::json;

    fn offline_client() -> Arc<SpotifyClient> {
        Arc::new(SpotifyClient::with_http(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
        ))
    }

    #[derive(Deserialize)]
    struct EchoArgs {
        word: String,
        times: f64,
    }

    fn echo_entry() -> ToolEntry {
        let schema = ObjectSchema::new(vec![
            FieldSchema::new("word", SchemaNode::string()),
            FieldSchema::new("times", SchemaNode::number().with_default(json!(2))),
        ]);
        let handler = bind("echo", |a: EchoArgs, _c: Arc<SpotifyClient>| async move {
            Ok::<_, SpotifyError>(a.word.repeat(a.times as usize))
        });
        ToolEntry::new("echo", "Repeat a word", schema, handler)
            .with_title("Echo")
            .with_category("testing")
    }

    #[test]
    fn builtin_registry_preserves_catalog_order() {
        let catalog = Catalog::builtin().expect("catalog");
        let registry = ToolRegistry::from_catalog(&catalog, offline_client()).expect("registry");
        let expected: Vec<&str> = catalog.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(registry.list_names(), expected);
        assert!(registry.lookup("get_album").is_some());
        assert!(registry.lookup("help").is_none());
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = ToolRegistry::new(offline_client());
        registry.register(echo_entry()).expect("first");
        assert!(matches!(
            registry.register(echo_entry()),
            Err(RegistryError::Duplicate(name)) if name == "echo"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invoker_validates_then_dispatches() {
        let mut registry = ToolRegistry::new(offline_client());
        registry.register(echo_entry()).expect("register");
        let tool = &registry.list_tools()[0];
        assert_eq!(tool.title.as_deref(), Some("Echo"));
        assert_eq!(registry.lookup("echo").map(|e| e.category.as_str()), Some("testing"));
        let invoker = registry.build_handler("echo").expect("invoker");
        let out = invoker
            .call(json!({"word": "la"}).as_object().cloned().unwrap_or_default())
            .await
            .expect("call");
        assert_eq!(out, json!("lala"));

        let err = invoker.call(JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "echo"));
    }

    #[test]
    fn unknown_tools_fail_before_validation() {
        let registry = ToolRegistry::new(offline_client());
        let err = registry.build_handler("nonexistent_tool").err().expect("not found");
        assert!(matches!(err, ToolError::NotFound(ref name) if name == "nonexistent_tool"));
        assert_eq!(err.to_string(), "Tool 'nonexistent_tool' not found");
    }

    #[test]
    fn advertised_tools_carry_title_and_schema() {
        let catalog = Catalog::builtin().expect("catalog");
        let registry = ToolRegistry::from_catalog(&catalog, offline_client()).expect("registry");
        let tools = registry.list_tools();
        let album = tools.iter().find(|t| t.name == "get_album").expect("get_album");
        assert_eq!(album.title.as_deref(), Some("Get Album"));
        assert_eq!(
            album.input_schema.get("required"),
            Some(&json!(["token", "albumId"]))
        );
    }
}
