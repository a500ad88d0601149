//! chatflow server binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use chatflow_config::Settings;
use chatflow_engine::Engine;
use chatflow_llm::{ClaudeBackend, ClaudeConfig};
use chatflow_persistence::PersistenceLayer;
use chatflow_tools::StubMessagingGateway;

mod http;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("CHATFLOW_CONFIG").ok().map(PathBuf::from);
    let settings =
        Settings::load(config_path.as_deref()).context("failed to load configuration")?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let backend = ClaudeBackend::new(
        ClaudeConfig::default()
            .with_model(settings.agent.model.clone())
            .with_max_tokens(settings.agent.max_tokens)
            .with_temperature(settings.agent.temperature),
    )
    .context("failed to create LLM backend")?;

    // The production messaging gateway is wired by the deployment; the stub
    // records sends and is enough for local runs
    let gateway = Arc::new(StubMessagingGateway::new());

    let engine = Engine::new(
        Arc::new(backend),
        PersistenceLayer::in_memory(),
        gateway,
        settings.clone(),
    );

    let state = AppState::new(Arc::new(engine), settings.clone(), prometheus);
    let router = http::create_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "chatflow server listening");
    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
