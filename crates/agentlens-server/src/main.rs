//! agentlens server binary
//!
//! Wires the analytics registry, the per-tenant data-manager registry, and
//! the event bus behind a tokio-native newline-delimited JSON listener.

use std::env;
use std::sync::Arc;

use agentlens_data::{DataManagerRegistry, TenantConfigResolver};
use agentlens_engine::{plugins::register_default_plugins, AnalyticsEngine, AnalyticsEngineConfig, AnalyticsRegistry};
use agentlens_server::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, LISTEN_ADDR_ENV, REWRITE_STALE_SPANS_ENV};
use agentlens_server::events::EventBus;
use agentlens_server::server;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let rewrite_stale_spans_enabled = env::var(REWRITE_STALE_SPANS_ENV).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
    tracing::info!(rewrite_stale_spans_enabled, "agentlens-server starting");

    let registry = Arc::new(AnalyticsRegistry::new());
    register_default_plugins(&registry)?;
    let engine = Arc::new(AnalyticsEngine::new(registry, AnalyticsEngineConfig::default()));

    let resolver = TenantConfigResolver::with_default_local_path();
    let dm_registry = Arc::new(DataManagerRegistry::new(resolver));
    let event_bus = Arc::new(EventBus::new(engine, dm_registry.clone()));

    let listen_addr = env::var(LISTEN_ADDR_ENV).unwrap_or_else(|_| format!("{DEFAULT_BIND_ADDRESS}:{DEFAULT_PORT}"));
    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(%listen_addr, "listening");

    server::run(listener, dm_registry, event_bus).await?;
    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    #[cfg(feature = "telemetry")]
    {
        if agentlens_telemetry::otel_enabled() {
            let (otel_layer, guard) = agentlens_telemetry::otel_layer("agentlens-server");
            registry.with(otel_layer).init();
            // Leaked deliberately: the guard must outlive `main`, and the
            // binary process owns its whole lifetime anyway.
            Box::leak(Box::new(guard));
            return;
        }
    }

    registry.init();
}
