//! ONEGOV assistant server binary.
//!
//! Reads `onegov.toml` (or the path given with `--config`) layered under
//! `ONEGOV_*` environment variables, opens the configured storage engine and
//! serves the JSON API under `/api`.

mod backend;
mod gemini;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use onegov_api::{ApiState, ConversationMemory};
use onegov_core::StorageEngine;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{backend::Backend, gemini::Gemini};

#[derive(Parser)]
#[command(author, version, about = "ONEGOV government-scheme assistant")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "onegov.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = settings::load(cli.config).context("failed to read configuration")?;

  // Storage.
  let choice = backend::choose(&cfg, std::env::var_os("VERCEL").is_some());
  let store = Backend::open(choice, cfg.allow_memory_fallback)
    .await
    .context("failed to open storage")?;
  tracing::info!(engine = store.name(), durable = store.is_durable(), "storage ready");

  // Assistant.
  let assistant = match cfg.gemini_key() {
    Some(key) => Some(
      Gemini::new(key, &cfg.gemini_model, &cfg.gemini_base_url)
        .context("failed to build Gemini client")?,
    ),
    None => {
      tracing::warn!("no Gemini API key configured; /api/chat will answer 503");
      None
    }
  };

  let state = ApiState::new(
    store,
    assistant,
    ConversationMemory::new(cfg.memory_capacity),
  );
  let app = Router::new()
    .nest("/api", onegov_api::router(state))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
