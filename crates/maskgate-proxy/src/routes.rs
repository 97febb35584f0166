//! HTTP routes, the security-gate middleware, and error mapping

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use maskgate_core::Error;
use maskgate_masking::{advisory_preamble, personal_mode_notice, report_outcome};
use maskgate_security::RequestInfo;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::Instrument;

use crate::config::SecurityLevel;
use crate::dispatch::ChatProxyRequest;
use crate::proxy::AppState;

const SECURITY_MARKER_HEADER: &str = "x-security-proxy";
const REQUEST_ID_HEADER: &str = "x-request-id";
const API_KEY_HEADER: &str = "x-api-key";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics_endpoint))
        .route("/chat", post(chat))
        .route("/proxy/status", get(proxy_status))
        .route("/proxy/chat", post(proxy_chat))
        .route("/proxy/*path", any(proxy_passthrough))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_layer,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Gate middleware: every request passes through the security gate before
/// any handler runs. Rejections short-circuit; admissions get a correlation
/// id and the marker header.
async fn security_layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    metrics::counter!("maskgate_requests_total").increment(1);

    let info = RequestInfo {
        caller: addr.ip().to_string(),
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        user_agent: header_str(request.headers(), header::USER_AGENT.as_str()),
        credential: extract_credential(request.headers(), request.uri()),
    };

    match state.gate.evaluate(&info) {
        Ok(request_id) => {
            let span = tracing::info_span!("request", id = %request_id, path = %info.path);
            let mut response = next.run(request).instrument(span).await;
            let headers = response.headers_mut();
            headers.insert(SECURITY_MARKER_HEADER, HeaderValue::from_static("enabled"));
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                headers.insert(REQUEST_ID_HEADER, value);
            }
            response
        }
        Err(err) => {
            let reason = match &err {
                Error::Unauthorized => "unauthorized",
                Error::Blocked(_) => "blocked",
                _ => "other",
            };
            metrics::counter!("maskgate_gate_rejections_total", "reason" => reason).increment(1);
            let mut response = GatewayError::from(err).into_response();
            response
                .headers_mut()
                .insert(SECURITY_MARKER_HEADER, HeaderValue::from_static("enabled"));
            response
        }
    }
}

/// Credential lookup, in priority order: bearer authorization header,
/// dedicated API-key header, `api_key` query parameter.
fn extract_credential(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.to_string());
    }

    uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "api_key")
            .map(|(_, v)| v.into_owned())
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "maskgate",
        "status": "operational",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "maskgate",
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "secure_filtering_enabled": state.config.secure_filtering,
        "service_status": "operational",
        "features": [
            "PII Detection and Masking",
            "Source Code Protection",
            "Business Document Filtering",
            "Confidential Content Redaction",
            "Personal Chatbot Mode Toggle",
        ],
    }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn proxy_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "operational",
        "available_services": state.dispatcher.service_names(),
        "active_connections": state.dispatcher.active_connections(),
        "security_enabled": state.config.secure_filtering,
    }))
}

/// Body of the simplified `POST /chat` endpoint
#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_filename")]
    filename: String,
    use_secure_filter: Option<bool>,
    security_level: Option<SecurityLevel>,
}

fn default_filename() -> String {
    "user_code.py".to_string()
}

/// Envelope the simplified endpoint always returns, including on error
#[derive(Debug, Serialize)]
struct ChatEnvelope {
    proxy_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    security_info: SecurityInfo,
}

#[derive(Debug, Serialize)]
struct SecurityInfo {
    secure_filtering_enabled: bool,
    security_level: SecurityLevel,
    message: String,
}

/// Simplified gateway: mask a single message, prepend the advisory
/// preamble, and forward it to the default service as one user message.
async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatEnvelope> {
    let filtering = req.use_secure_filter.unwrap_or(state.config.secure_filtering);
    let level = req.security_level.unwrap_or(state.config.security_level);
    tracing::info!(filtering, "processing simplified chat request");

    let (prompt, masked_len) = if filtering {
        let outcome = state.masker.mask(&req.message);
        if outcome.total_masked() > 0 {
            metrics::counter!("maskgate_masking_events_total")
                .increment(outcome.total_masked() as u64);
        }
        report_outcome(state.sink.as_ref(), &outcome, file_subcategory(&req.filename));
        let masked_len = outcome.masked_text.len();
        (
            format!("{}{}", advisory_preamble(&outcome), outcome.masked_text),
            masked_len,
        )
    } else {
        (
            format!("{}{}", personal_mode_notice(), req.message),
            req.message.len(),
        )
    };

    let result = state
        .dispatcher
        .complete(
            &state.config.default_target,
            &prompt,
            filtering,
            req.message.len(),
            masked_len,
        )
        .await;

    let envelope = match result {
        Ok(value) => ChatEnvelope {
            proxy_response: Some(value),
            error: None,
            security_info: SecurityInfo {
                secure_filtering_enabled: filtering,
                security_level: level,
                message: if filtering {
                    "Content processed with enhanced security filtering".to_string()
                } else {
                    "Content processed in personal mode".to_string()
                },
            },
        },
        Err(err) => {
            tracing::warn!(error = %err, "simplified chat forwarding failed");
            ChatEnvelope {
                proxy_response: None,
                error: Some(err.to_string()),
                security_info: SecurityInfo {
                    secure_filtering_enabled: filtering,
                    security_level: level,
                    message: format!("Error: {err}"),
                },
            }
        }
    };

    Json(envelope)
}

fn file_subcategory(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("txt")
}

/// Conversational proxy with role-scoped redaction
async fn proxy_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatProxyRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    if req.messages.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "no messages provided".to_string(),
        ));
    }

    let target = req
        .target
        .clone()
        .unwrap_or_else(|| state.config.default_target.clone());

    let result = state
        .dispatcher
        .forward_chat(
            &target,
            &req,
            &state.masker,
            state.sink.as_ref(),
            state.config.secure_filtering,
        )
        .await?;

    Ok(Json(result))
}

/// Raw pass-through to the selected upstream service
async fn proxy_passthrough(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let target = params
        .iter()
        .find(|(k, _)| k == "target")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| state.config.default_target.clone());

    // routing parameters stay on this side of the proxy
    let forwarded: Vec<(String, String)> = params
        .into_iter()
        .filter(|(k, _)| k != "target" && k != "api_key")
        .collect();

    let upstream = state
        .dispatcher
        .forward_passthrough(&target, &path, method, headers, &forwarded, body.to_vec())
        .await?;

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() =
        StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if let Some(content_type) = upstream.content_type {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }
    Ok(response)
}

/// Route-level error wrapper mapping the core taxonomy to HTTP
#[derive(Debug)]
pub enum GatewayError {
    InvalidRequest(String),
    Core(Error),
}

impl From<Error> for GatewayError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
            }
            Self::Core(Error::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid or missing API key"})),
            )
                .into_response(),
            Self::Core(Error::Blocked(reason)) => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Access denied", "reason": reason})),
            )
                .into_response(),
            Self::Core(Error::RateLimited) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": "Rate limit exceeded"})),
            )
                .into_response(),
            Self::Core(Error::UnknownService(name)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Unknown service: {name}")})),
            )
                .into_response(),
            Self::Core(Error::Upstream { status, body }) => {
                // upstream status and body propagate verbatim
                let mut response = Response::new(Body::from(body));
                *response.status_mut() =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                response
            }
            Self::Core(Error::Dispatch(detail)) => {
                tracing::error!(%detail, "dispatch failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "dispatch failure"})),
                )
                    .into_response()
            }
            Self::Core(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal server error"})),
                )
                    .into_response()
            }
        }
    }
}
