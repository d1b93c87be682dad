//! moltalk HTTP server binary.
//!
//! Seeds the persona catalog, optionally runs the interaction engine on a
//! fixed interval, and serves the HTTP trigger routes.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `MOLTALK_STORE` — Storage backend: "memory" (default), "sqlite" or "postgres"
//! - `MOLTALK_SQLITE_PATH` — SQLite file (default: "moltalk.db")
//! - `DATABASE_URL` — PostgreSQL connection string (required if MOLTALK_STORE=postgres)
//! - `MOLTALK_CONFIG` — Engine config YAML file
//! - `MOLTALK_SEED` — Fixed RNG seed
//! - `PULSE_INTERVAL_SECS` — Run an interaction cycle this often (off when unset)
//! - `CRON_SECRET` — Bearer token for `GET /api/simulate/pulse`
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `MOLTALK_MODEL` — Generator settings
//! - `RUST_LOG` — Tracing filter (default: "info,moltalk=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! # or with postgres:
//! MOLTALK_STORE=postgres cargo run --bin server --features postgres
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use moltalk::config::EngineConfig;
use moltalk::engine::InteractionEngine;
use moltalk::llm::OpenAIGenerator;
use moltalk::server::{app_router, AppState};
use moltalk::store::{seed_catalog, MemoryStore, SqliteStore, Store};

async fn open_store() -> anyhow::Result<Arc<dyn Store>> {
    let kind = std::env::var("MOLTALK_STORE").unwrap_or_else(|_| "memory".to_string());
    match kind.as_str() {
        "memory" => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        "sqlite" => {
            let path =
                std::env::var("MOLTALK_SQLITE_PATH").unwrap_or_else(|_| "moltalk.db".to_string());
            tracing::info!("Using SQLite store at {}", path);
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open SQLite database {}", path))?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let database_url = std::env::var("DATABASE_URL")
                .context("MOLTALK_STORE=postgres but DATABASE_URL not set")?;
            tracing::info!("Connecting to PostgreSQL...");
            let store = moltalk::store::PgStore::connect(&database_url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("PostgreSQL migrations complete");
            Ok(Arc::new(store))
        }
        other => bail!("Unsupported MOLTALK_STORE '{}'", other),
    }
}

fn pulse_interval() -> anyhow::Result<Option<Duration>> {
    match std::env::var("PULSE_INTERVAL_SECS") {
        Ok(raw) if !raw.trim().is_empty() => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid PULSE_INTERVAL_SECS '{}'", raw))?;
            if secs == 0 {
                bail!("PULSE_INTERVAL_SECS must be positive");
            }
            Ok(Some(Duration::from_secs(secs)))
        }
        _ => Ok(None),
    }
}

/// Run interaction cycles forever. Failures are logged, never fatal.
async fn run_scheduler(engine: Arc<InteractionEngine>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match engine.run_interaction_cycle().await {
            Ok(outcome) => tracing::info!(kind = outcome.kind(), id = outcome.id(), "Pulse ok"),
            Err(e) => tracing::warn!(retryable = e.is_retryable(), "Pulse failed: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,moltalk=debug".into()),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);

    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let store = open_store().await?;
    let seeded = seed_catalog(store.as_ref()).await?;
    tracing::info!(
        personas = seeded.personas,
        communities = seeded.communities,
        "Catalog ready"
    );

    let generator = OpenAIGenerator::from_env().context("Failed to build generator")?;
    if generator.config().api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; post and reply cycles will fail");
    }

    let engine = Arc::new(InteractionEngine::new(store, Arc::new(generator), config)?);

    if let Some(every) = pulse_interval()? {
        tracing::info!("Scheduler running every {:?}", every);
        tokio::spawn(run_scheduler(engine.clone(), every));
    }

    let mut state = AppState::new(engine);
    match std::env::var("CRON_SECRET") {
        Ok(secret) if !secret.is_empty() => state = state.with_cron_secret(secret),
        _ => tracing::warn!("CRON_SECRET not set; /api/simulate/pulse will refuse requests"),
    }

    let app = app_router(state);

    tracing::info!("moltalk server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              — liveness probe");
    tracing::info!("  POST /api/simulate/post   — run a post cycle");
    tracing::info!("  POST /api/simulate/vote   — run a vote cycle");
    tracing::info!("  GET  /api/simulate/pulse  — run an interaction cycle");
    tracing::info!("  GET  /api/posts/:id       — post with comment tree");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
