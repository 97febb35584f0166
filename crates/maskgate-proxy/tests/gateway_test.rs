//! End-to-end gateway tests against a local mock upstream
//!
//! Each test spins up its own gateway instance: the blocklist keys on the
//! client IP, which is 127.0.0.1 for every test, so sharing a gateway would
//! leak state between tests.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    extract::Query,
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};

use maskgate_proxy::config::{GatewayConfig, RateConfig, ServiceConfig};
use maskgate_proxy::proxy::AppState;
use maskgate_proxy::routes;

async fn mock_chat(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "id": "resp-1",
        "object": "chat.completion",
        "model": body["model"],
        "auth": auth,
        "echo": body,
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "ok"}, "finish_reason": "stop"}
        ],
    }))
}

async fn mock_models(Query(params): Query<Vec<(String, String)>>) -> Json<Value> {
    let params: BTreeMap<String, String> = params.into_iter().collect();
    Json(json!({"object": "list", "params": params}))
}

async fn spawn_mock_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_chat))
        .route("/v1/models", get(mock_models));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_config(upstream: SocketAddr) -> GatewayConfig {
    let mut services = BTreeMap::new();
    services.insert(
        "mock".to_string(),
        ServiceConfig {
            base_url: format!("http://{upstream}/v1"),
            api_key: Some("upstream-secret".to_string()),
            models: vec!["mock-model".to_string()],
        },
    );
    GatewayConfig {
        default_target: "mock".to_string(),
        services,
        ..GatewayConfig::default()
    }
}

async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState::new(config, handle).unwrap();
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn spawn_stack() -> SocketAddr {
    let upstream = spawn_mock_upstream().await;
    spawn_gateway(test_config(upstream)).await
}

#[tokio::test]
async fn health_is_exempt_and_carries_marker_header() {
    let gw = spawn_stack().await;
    let resp = reqwest::get(format!("http://{gw}/health")).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-security-proxy"], "enabled");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn proxy_status_is_exempt_and_lists_services() {
    let gw = spawn_stack().await;
    let resp = reqwest::get(format!("http://{gw}/proxy/status"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["available_services"], json!(["mock"]));
    assert_eq!(body["security_enabled"], json!(true));
}

#[tokio::test]
async fn missing_credential_is_unauthorized() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/proxy/chat"))
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers()["x-security-proxy"], "enabled");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid or missing API key");
}

#[tokio::test]
async fn metrics_endpoint_is_gated() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{gw}/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{gw}/metrics"))
        .header("x-api-key", "client-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn unknown_target_is_bad_request_even_with_credential() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/proxy/chat"))
        .header("x-api-key", "client-key")
        .json(&json!({
            "target": "nonexistent",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unknown service: nonexistent");

    // same outcome on the pass-through path
    let resp = client
        .get(format!("http://{gw}/proxy/models?target=nonexistent"))
        .header("x-api-key", "client-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn crawler_agent_is_blocked_and_stays_blocked() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{gw}/proxy/models"))
        .header("x-api-key", "client-key")
        .header("user-agent", "Googlebot/2.1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Access denied");
    assert_eq!(body["reason"], "suspicious activity detected");

    // the caller is now blocklisted even with a clean agent and a credential
    let resp = client
        .get(format!("http://{gw}/proxy/models"))
        .header("x-api-key", "client-key")
        .header("user-agent", "curl/8.0")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "IP address blocked");
}

#[tokio::test]
async fn chat_proxy_redacts_user_messages_only() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/proxy/chat"))
        .bearer_auth("client-key")
        .json(&json!({
            "messages": [
                {"role": "system", "content": "support contact is ops@corp.com"},
                {"role": "user", "content": "my email is foo@bar.com"},
            ],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-security-proxy"], "enabled");
    assert_eq!(resp.headers()["x-request-id"].to_str().unwrap().len(), 16);

    let body: Value = resp.json().await.unwrap();

    // the service credential was injected upstream
    assert_eq!(body["auth"], "Bearer upstream-secret");

    // defaults applied
    let echoed = &body["echo"];
    assert_eq!(echoed["model"], "mock-model");
    assert_eq!(echoed["max_tokens"], 1000);

    // system content untouched, user content masked
    assert_eq!(
        echoed["messages"][0]["content"],
        "support contact is ops@corp.com"
    );
    assert_eq!(echoed["messages"][1]["content"], "my email is <EMAIL>");

    let metadata = &body["security_metadata"];
    assert_eq!(metadata["secure_filtering_applied"], json!(true));
    assert_eq!(metadata["original_message_count"], 2);
    assert_eq!(metadata["filtered_message_count"], 2);
    assert_eq!(metadata["proxy_service"], "mock");
}

#[tokio::test]
async fn chat_proxy_rejects_empty_message_list() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/proxy/chat"))
        .bearer_auth("client-key")
        .json(&json!({"messages": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn simplified_chat_masks_and_wraps_response() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/chat"))
        .header("x-api-key", "client-key")
        .json(&json!({
            "message": "my password: hunter2",
            "use_secure_filter": true,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let info = &body["security_info"];
    assert_eq!(info["secure_filtering_enabled"], json!(true));
    assert_eq!(info["security_level"], "high");
    assert_eq!(
        info["message"],
        "Content processed with enhanced security filtering"
    );

    // the forwarded prompt carries the advisory notice and the masked text
    let prompt = body["proxy_response"]["echo"]["messages"][0]["content"]
        .as_str()
        .unwrap();
    assert!(prompt.starts_with("SECURITY NOTICE"));
    assert!(prompt.contains("<PASSWORD>"));
    assert!(!prompt.contains("hunter2"));

    let metadata = &body["proxy_response"]["security_metadata"];
    assert_eq!(metadata["secure_filtering_applied"], json!(true));
    assert_eq!(metadata["context_preserved"], json!(true));
}

#[tokio::test]
async fn simplified_chat_personal_mode_passes_through() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{gw}/chat"))
        .header("x-api-key", "client-key")
        .json(&json!({
            "message": "my password: hunter2",
            "use_secure_filter": false,
            "security_level": "low",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["security_info"]["secure_filtering_enabled"], json!(false));
    assert_eq!(body["security_info"]["security_level"], "low");

    let prompt = body["proxy_response"]["echo"]["messages"][0]["content"]
        .as_str()
        .unwrap();
    assert!(prompt.starts_with("PERSONAL MODE"));
    assert!(prompt.contains("hunter2"));
}

#[tokio::test]
async fn passthrough_strips_routing_params_and_forwards_the_rest() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "http://{gw}/proxy/models?target=mock&api_key=client-key&foo=bar"
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["params"]["foo"], "bar");
    assert!(body["params"].get("target").is_none());
    assert!(body["params"].get("api_key").is_none());
}

#[tokio::test]
async fn rate_limit_rejects_excess_dispatches() {
    let upstream = spawn_mock_upstream().await;
    let mut config = test_config(upstream);
    config.rate = RateConfig {
        per_minute: 2,
        per_hour: 1000,
    };
    let gw = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client
            .post(format!("http://{gw}/proxy/chat"))
            .bearer_auth("client-key")
            .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .post(format!("http://{gw}/proxy/chat"))
        .bearer_auth("client-key")
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");
}

#[tokio::test]
async fn status_endpoint_requires_credential() {
    let gw = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{gw}/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{gw}/status"))
        .header("x-api-key", "client-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service_status"], "operational");
    assert_eq!(body["features"].as_array().unwrap().len(), 5);
}
