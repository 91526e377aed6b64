//! washout-server: prescription photo in, required washout periods out.
//!
//! Configuration comes from environment variables (optionally seeded from a
//! `.env` file); see [`washout_server::config`] for the full list.
//!
//! - `OPENAI_API_KEY`: vision API key (required)
//! - `WASHOUT_TABLE_PATH`: reference table, CSV or JSON (default: drugs.csv)
//! - `WASHOUT_BIND_ADDR`: listen address (default: 0.0.0.0:3000)

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use washout_core::ReferenceTable;
use washout_llm::{ExtractionGate, OpenAiVisionClient};
use washout_server::{build_router, AppState, Orchestrator, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,washout_server=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    // The table is loaded once; a missing or broken table is fatal
    let table = ReferenceTable::load(&config.table_path).with_context(|| {
        format!(
            "failed to load reference table from {}",
            config.table_path.display()
        )
    })?;
    tracing::info!(
        records = table.len(),
        restricted = table.restricted_count(),
        "Reference table ready"
    );

    let client = OpenAiVisionClient::new(config.vision.clone())
        .context("failed to build vision client")?;
    let gate = ExtractionGate::new(Arc::new(client), config.gate);
    tracing::info!(
        max_concurrent = config.gate.max_concurrent_extractions,
        timeout_ms = config.gate.extraction_timeout_ms,
        model = %config.vision.model,
        "Extraction gate configured"
    );

    let orchestrator =
        Orchestrator::new(Arc::new(table), gate).with_tie_break(config.tie_break);
    let state = AppState::new(orchestrator, config.upload.clone());
    let app = build_router(state, config.static_dir.as_deref());

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("washout-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
