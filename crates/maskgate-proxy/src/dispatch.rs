//! Upstream dispatch layer
//!
//! Owns the service registry, the shared HTTP client, and the global rate
//! limiter. Two forwarding paths: raw pass-through for arbitrary API calls,
//! and the chat path that applies role-scoped redaction before forwarding.
//!
//! No gate or limiter lock is held across an `.await`; if the caller drops
//! the connection, the handler future is dropped and the in-flight upstream
//! request is cancelled with it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue, Method};
use maskgate_core::{ChatMessage, Error, Result};
use maskgate_masking::{report_outcome, Masker, MaskingSink};
use maskgate_security::RateLimiter;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::GatewayConfig;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Attribution title OpenRouter expects from proxies; the matching referer
/// is derived from the configured listen address.
const OPENROUTER_TITLE: &str = "maskgate";

/// Headers never forwarded upstream
const HOP_BY_HOP: &[header::HeaderName] = &[
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Body of `POST /proxy/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatProxyRequest {
    pub target: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub stop: Option<Value>,
}

/// Verbatim upstream reply for the pass-through path
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug)]
struct ResolvedService {
    base_url: String,
    api_key: Option<String>,
    models: Vec<String>,
}

impl ResolvedService {
    fn default_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or_default()
    }
}

/// The dispatch layer
pub struct Dispatcher {
    services: BTreeMap<String, ResolvedService>,
    client: reqwest::Client,
    limiter: RateLimiter,
    active: AtomicUsize,
    referer: HeaderValue,
}

impl Dispatcher {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut services = BTreeMap::new();
        for (name, service) in &config.services {
            Url::parse(&service.base_url)
                .map_err(|e| Error::config(format!("invalid base url for {name}: {e}")))?;
            if service.models.is_empty() {
                return Err(Error::config(format!("service {name} lists no models")));
            }
            services.insert(
                name.clone(),
                ResolvedService {
                    base_url: service.base_url.trim_end_matches('/').to_string(),
                    api_key: service.api_key.clone(),
                    models: service.models.clone(),
                },
            );
        }

        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| Error::dispatch(format!("failed to build http client: {e}")))?;

        let referer = HeaderValue::from_str(&format!("http://{}:{}", config.listen, config.port))
            .map_err(|_| Error::config("listen address is not header-safe"))?;

        Ok(Self {
            services,
            client,
            limiter: RateLimiter::new(config.rate.per_minute, config.rate.per_hour),
            active: AtomicUsize::new(0),
            referer,
        })
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn resolve(&self, target: &str) -> Result<&ResolvedService> {
        self.services
            .get(target)
            .ok_or_else(|| Error::unknown_service(target))
    }

    fn admit(&self) -> Result<()> {
        self.limiter.try_admit().map_err(|e| {
            metrics::counter!("maskgate_rate_limited_total").increment(1);
            e
        })
    }

    /// Forward an arbitrary request to `{base_url}/{path}`, returning the
    /// upstream reply verbatim.
    pub async fn forward_passthrough(
        &self,
        target: &str,
        path: &str,
        method: Method,
        mut headers: HeaderMap,
        query: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<UpstreamResponse> {
        let service = self.resolve(target)?;
        self.admit()?;
        let _guard = ConnectionGuard::enter(&self.active);

        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        inject_service_headers(&mut headers, target, service, &self.referer)?;

        let url = format!("{}/{}", service.base_url, path);
        tracing::debug!(%target, %path, method = %method, "forwarding pass-through request");

        let mut request = self.client.request(method, &url).headers(headers);
        if !query.is_empty() {
            request = request.query(query);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(map_transport_error)?;
        record_latency(target, started);

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(map_transport_error)?
            .to_vec();

        tracing::debug!(%target, status, bytes = body.len(), "pass-through response");
        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    /// Forward a conversational payload to `{base_url}/chat/completions`,
    /// redacting user-role messages first when filtering is enabled.
    pub async fn forward_chat(
        &self,
        target: &str,
        request: &ChatProxyRequest,
        masker: &Masker,
        sink: &dyn MaskingSink,
        filtering_enabled: bool,
    ) -> Result<Value> {
        let service = self.resolve(target)?;
        self.admit()?;
        let _guard = ConnectionGuard::enter(&self.active);

        let filtered = filter_messages(&request.messages, masker, sink, filtering_enabled);
        let filtered_count = filtered.len();

        let mut body = json!({
            "model": request.model.clone().unwrap_or_else(|| service.default_model().to_string()),
            "messages": filtered,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "stream": request.stream,
        });
        if let Some(v) = request.top_p {
            body["top_p"] = v.into();
        }
        if let Some(v) = request.frequency_penalty {
            body["frequency_penalty"] = v.into();
        }
        if let Some(v) = request.presence_penalty {
            body["presence_penalty"] = v.into();
        }
        if let Some(stop) = &request.stop {
            body["stop"] = stop.clone();
        }

        let mut result = self.post_chat(target, service, &body).await?;
        result["security_metadata"] = json!({
            "secure_filtering_applied": filtering_enabled,
            "original_message_count": request.messages.len(),
            "filtered_message_count": filtered_count,
            "proxy_service": target,
        });
        Ok(result)
    }

    /// Send a single pre-built prompt; used by the simplified gateway, which
    /// masks and prepends its advisory notice before calling.
    pub async fn complete(
        &self,
        target: &str,
        prompt: &str,
        filtering_applied: bool,
        original_len: usize,
        masked_len: usize,
    ) -> Result<Value> {
        let service = self.resolve(target)?;
        self.admit()?;
        let _guard = ConnectionGuard::enter(&self.active);

        let body = json!({
            "model": service.default_model(),
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": DEFAULT_MAX_TOKENS,
            "temperature": DEFAULT_TEMPERATURE,
            "stream": false,
        });

        let mut result = self.post_chat(target, service, &body).await?;
        result["security_metadata"] = json!({
            "secure_filtering_applied": filtering_applied,
            "original_length": original_len,
            "masked_length": masked_len,
            "context_preserved": true,
        });
        Ok(result)
    }

    async fn post_chat(
        &self,
        target: &str,
        service: &ResolvedService,
        body: &Value,
    ) -> Result<Value> {
        let mut headers = HeaderMap::new();
        inject_service_headers(&mut headers, target, service, &self.referer)?;

        let url = format!("{}/chat/completions", service.base_url);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        record_latency(target, started);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%target, status = status.as_u16(), "upstream rejected chat request");
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let result = response.json::<Value>().await.map_err(map_transport_error)?;
        Ok(result)
    }
}

/// Redact user-role messages; system and assistant messages pass through
/// byte-identical.
fn filter_messages(
    messages: &[ChatMessage],
    masker: &Masker,
    sink: &dyn MaskingSink,
    filtering_enabled: bool,
) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| {
            if filtering_enabled && message.is_user() {
                let outcome = masker.mask(&message.content);
                if outcome.total_masked() > 0 {
                    metrics::counter!("maskgate_masking_events_total")
                        .increment(outcome.total_masked() as u64);
                    report_outcome(sink, &outcome, "chat_message");
                }
                ChatMessage::new(message.role.clone(), outcome.masked_text)
            } else {
                message.clone()
            }
        })
        .collect()
}

fn inject_service_headers(
    headers: &mut HeaderMap,
    target: &str,
    service: &ResolvedService,
    referer: &HeaderValue,
) -> Result<()> {
    if let Some(key) = &service.api_key {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| Error::config(format!("credential for {target} is not header-safe")))?;
        headers.insert(header::AUTHORIZATION, value);
    }
    if target == "openrouter" {
        headers.insert("http-referer", referer.clone());
        headers.insert("x-title", HeaderValue::from_static(OPENROUTER_TITLE));
    }
    Ok(())
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::dispatch("upstream request timed out")
    } else {
        Error::dispatch(format!("upstream request failed: {err}"))
    }
}

fn record_latency(target: &str, started: Instant) {
    metrics::histogram!("maskgate_dispatch_latency_ms", "service" => target.to_string())
        .record(started.elapsed().as_secs_f64() * 1000.0);
}

/// RAII active-connection counter
struct ConnectionGuard<'a>(&'a AtomicUsize);

impl<'a> ConnectionGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
