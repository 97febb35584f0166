//! maskgate
//!
//! Content-filtering gateway in front of conversational AI services:
//! inbound text is classified and redacted, abusive traffic is blocked and
//! rate-limited, and payloads are forwarded upstream with per-service
//! credentials.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing::{info, warn};

use maskgate_proxy::config::GatewayConfig;
use maskgate_proxy::proxy::AppState;
use maskgate_proxy::routes;

#[derive(Parser, Debug)]
#[command(name = "maskgate")]
#[command(about = "Content-filtering proxy gate for AI endpoints", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Disable secure content filtering (personal mode)
    #[arg(long)]
    no_secure_filter: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting maskgate gateway");

    let mut config = GatewayConfig::load(&cli.config)?;
    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_secure_filter {
        config.secure_filtering = false;
    }
    config.resolve_credentials();

    info!("Configuration loaded successfully");
    info!("Default target: {}", config.default_target);
    info!("Configured services: {}", config.services.len());
    info!("Secure filtering: {}", config.secure_filtering);

    let metrics_handle = init_metrics()?;

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let state = AppState::new(config, metrics_handle)?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("maskgate=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maskgate=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "maskgate_requests_total",
        "Total number of requests seen by the security gate"
    );
    metrics::describe_counter!(
        "maskgate_gate_rejections_total",
        "Requests rejected by the security gate, by reason"
    );
    metrics::describe_counter!(
        "maskgate_rate_limited_total",
        "Dispatch attempts rejected by the rate limiter"
    );
    metrics::describe_counter!(
        "maskgate_masking_events_total",
        "Sensitive spans masked before forwarding"
    );
    metrics::describe_histogram!(
        "maskgate_dispatch_latency_ms",
        metrics::Unit::Milliseconds,
        "Upstream dispatch latency in milliseconds by service"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
