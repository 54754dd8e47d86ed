use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder, register_histogram_vec,
    register_int_counter_vec, register_int_gauge,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub static TOOL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "spotify_tool_calls_total",
        "Tool invocations by tool name and outcome",
        &["tool", "outcome"]
    )
    .unwrap()
});

pub static TOOL_LATENCY_HISTO: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "spotify_tool_latency_ms",
        "Latency of tool invocations in ms",
        &["tool"]
    )
    .unwrap()
});

pub static UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "spotify_upstream_requests_total",
        "Requests sent to the Spotify Web API by method and status",
        &["method", "status"]
    )
    .unwrap()
});

pub static TOOL_INFLIGHT: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("spotify_tool_inflight", "In-flight tool calls").unwrap());

pub struct InflightGuard;

impl InflightGuard {
    pub fn new() -> Self {
        TOOL_INFLIGHT.inc();
        InflightGuard
    }
}

impl Default for InflightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        TOOL_INFLIGHT.dec();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Error,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Error => "error",
        }
    }
}

pub fn record_tool_call(tool: &str, outcome: CallOutcome, latency_ms: u64) {
    TOOL_CALLS
        .with_label_values(&[tool, outcome.as_str()])
        .inc();
    TOOL_LATENCY_HISTO
        .with_label_values(&[tool])
        .observe(latency_ms as f64);
}

/// `status` is `None` when no response was received.
pub fn record_upstream(method: &str, status: Option<u16>) {
    let status = status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "unreachable".to_string());
    UPSTREAM_REQUESTS
        .with_label_values(&[method, status.as_str()])
        .inc();
}

#[derive(Clone, Debug)]
pub struct MetricsServerConfig {
    pub addr: SocketAddr,
    pub auth_token: Option<String>,
    pub allow_insecure: bool,
}

#[derive(Clone)]
struct MetricsState {
    auth_token: Option<String>,
}

pub fn router(auth_token: Option<String>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { auth_token })
}

pub async fn spawn_metrics_server(config: MetricsServerConfig) {
    let MetricsServerConfig {
        addr,
        auth_token,
        allow_insecure,
    } = config;
    // only plain HTTP is served; refuse unless explicitly allowed
    if !allow_insecure {
        warn!(
            %addr,
            "metrics server skipped: set ALLOW_INSECURE_METRICS_DEV=true to serve plain HTTP"
        );
        return;
    }

    let app = router(auth_token);
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!(%addr, "metrics server (HTTP) starting");
            tokio::spawn(async move {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(%addr, %err, "metrics server terminated");
                }
            });
        }
        Err(err) => {
            error!(%addr, %err, "failed to bind metrics listener");
        }
    }
}

async fn metrics_handler(
    State(state): State<MetricsState>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Some(token) = &state.auth_token {
        if !is_authorized(headers.get(header::AUTHORIZATION), token) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&metrics, &mut buf) {
        error!(%err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response();
    }

    let content_type = HeaderValue::from_str(encoder.format_type())
        .unwrap_or(HeaderValue::from_static("text/plain"));
    ([(header::CONTENT_TYPE, content_type)], buf).into_response()
}

fn is_authorized(header: Option<&HeaderValue>, token: &str) -> bool {
    match header.and_then(|value| value.to_str().ok()) {
        Some(value) if value.starts_with("Bearer ") => value[7..].trim() == token,
        _ => false,
    }
}
