//! Shared application state

use std::sync::Arc;

use maskgate_core::Result;
use maskgate_masking::{LogSink, Masker, MaskingSink};
use maskgate_security::SecurityGate;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<GatewayConfig>,

    /// The redaction engine, compiled once
    pub masker: Arc<Masker>,

    /// The security gate (blocklist, request log, heuristics)
    pub gate: Arc<SecurityGate>,

    /// Upstream dispatch (service registry, HTTP client, rate limiter)
    pub dispatcher: Arc<Dispatcher>,

    /// Where masking events are reported
    pub sink: Arc<dyn MaskingSink>,

    /// Prometheus handle for rendering /metrics
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(config: GatewayConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            masker: Arc::new(Masker::new()?),
            gate: Arc::new(SecurityGate::new()?),
            dispatcher: Arc::new(dispatcher),
            sink: Arc::new(LogSink),
            metrics_handle,
        })
    }
}
