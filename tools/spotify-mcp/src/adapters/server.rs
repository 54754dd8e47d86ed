use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::wrapper::Parameters,
    model::*,
    service::{RequestContext, RoleServer},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::{
    app::registry::{ToolError, ToolRegistry},
    infra::metrics::{self, CallOutcome, InflightGuard},
    shared::utils::measure_latency,
};

pub const HELP_TOOL: &str = "help";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EmptyArgs {}

fn schema_for<T: JsonSchema + 'static>() -> Arc<JsonObject> {
    rmcp::handler::server::common::cached_schema_for_type::<T>()
}

#[derive(Clone)]
pub struct SpotifyServer {
    registry: Arc<ToolRegistry>,
}

impl SpotifyServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Everything `tools/list` returns: `help` first, then the registry.
    pub fn advertised_tools(&self) -> Vec<Tool> {
        let mut help = Tool::new(
            HELP_TOOL,
            "Reference of every Spotify tool exposed by this server, grouped by category.",
            // some clients reject a null input_schema
            schema_for::<Parameters<EmptyArgs>>(),
        );
        help.title = Some("Help".into());
        let mut tools = vec![help];
        tools.extend(self.registry.list_tools());
        tools
    }

    fn help_lines(&self) -> Vec<Value> {
        let mut lines = vec![json!({
            "section": "summary",
            "server": "spotify-mcp",
            "version": env!("CARGO_PKG_VERSION"),
            "protocol": "MCP",
            "transports": ["stdio"],
            "tools": self.registry.len(),
            "auth": "pass a Spotify access token as the `token` argument of every call",
        })];

        let mut categories: Vec<(&str, Vec<Value>)> = Vec::new();
        for entry in self.registry.entries() {
            let item = json!({
                "name": entry.name,
                "title": entry.title,
                "prompt": entry.prompt,
            });
            match categories.iter_mut().find(|(c, _)| *c == entry.category) {
                Some((_, items)) => items.push(item),
                None => categories.push((entry.category.as_str(), vec![item])),
            }
        }
        for (category, tools) in categories {
            lines.push(json!({
                "section": "category",
                "name": category,
                "tools": tools,
            }));
        }
        lines.push(json!({
            "section": "environment",
            "SPOTIFY_API_BASE_URL": "override the Web API base URL (default https://api.spotify.com/v1)",
            "METRICS_ADDR": "optional Prometheus /metrics listener",
            "RUST_LOG": "default off",
        }));
        lines
    }

    fn help_result(&self) -> CallToolResult {
        let lines: Vec<String> = self
            .help_lines()
            .iter()
            .map(Value::to_string)
            .collect();
        CallToolResult::success(vec![Content::text(lines.join("\n"))])
    }

    async fn invoke(&self, name: &str, arguments: JsonObject) -> Result<Value, ToolError> {
        let invoker = self.registry.build_handler(name)?;
        invoker.call(arguments).await
    }

    /// Run one call. Tool failures become an `isError` result, never a
    /// protocol error.
    pub async fn dispatch(&self, name: &str, arguments: JsonObject) -> CallToolResult {
        if name == HELP_TOOL {
            metrics::record_tool_call(name, CallOutcome::Success, 0);
            return self.help_result();
        }

        let call_id = uuid::Uuid::new_v4();
        let _inflight = InflightGuard::new();
        let (outcome, latency_ms) = measure_latency(|| self.invoke(name, arguments)).await;

        match outcome {
            Ok(value) => {
                metrics::record_tool_call(name, CallOutcome::Success, latency_ms);
                tracing::info!(%call_id, tool = name, latency_ms, "tool call succeeded");
                CallToolResult::success(vec![Content::text(render(value))])
            }
            Err(err) => {
                metrics::record_tool_call(name, CallOutcome::Error, latency_ms);
                log_failure(&call_id, name, latency_ms, &err);
                CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
            }
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

fn log_failure(call_id: &uuid::Uuid, tool: &str, latency_ms: u64, err: &ToolError) {
    match err {
        ToolError::NotFound(_) | ToolError::InvalidArguments { .. } => {
            tracing::info!(%call_id, tool, latency_ms, %err, "tool call rejected");
        }
        ToolError::Service(service) => {
            tracing::warn!(
                %call_id,
                tool,
                latency_ms,
                status = ?service.status(),
                retryable = service.is_retryable(),
                %err,
                "tool call failed"
            );
        }
    }
}

impl ServerHandler for SpotifyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "spotify-mcp".into(),
                title: Some("Spotify MCP".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Spotify Web API tools. Every tool takes the caller's access token as `token`; call `help` for the catalog."
                    .into(),
            ),
        }
    }

    fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        tracing::info!(?request.client_info, %request.protocol_version, "initialize received");
        let mut init = self.get_info();
        // echo back the protocol requested by client for compatibility
        init.protocol_version = request.protocol_version;
        async move {
            tracing::info!("initialize ok");
            Ok(init)
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.advertised_tools();
        tracing::info!(count = tools.len(), "list_tools called");
        async move {
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::info!(tool = %request.name, "call_tool received");
            let arguments = request.arguments.unwrap_or_default();
            Ok(self.dispatch(request.name.as_ref(), arguments).await)
        }
    }
}
