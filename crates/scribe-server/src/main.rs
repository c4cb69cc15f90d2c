//! Scribe HTTP server
//!
//! Exposes the writing agent over HTTP:
//! - POST /api/chat/message            - start a run, streamed as SSE
//! - POST /api/chat/interrupt-response - answer a pending approval, streamed as SSE
//! - GET  /api/chat/ws                 - live notices (diff previews, tool events)
//! - GET  /api/chat/threads[/:id]      - thread listing and snapshots
//! - DELETE /api/chat/threads/:id      - forget a thread
//! - POST /api/chat/threads/:id/summarize
//! - GET  /health

mod error;
mod notices;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribe_runtime::{Engine, Gateway, OpenAiChatModel, OpenAiConfig, SettingsSource, ToolCatalog};
use scribe_toolkit::Workspace;

use crate::routes::{router, AppState};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Parser)]
#[command(name = "scribe-server")]
#[command(about = "HTTP server for the Scribe writing agent")]
struct Cli {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Host to bind the server to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Directory the file tools operate in
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Settings file, re-read on every run (defaults to <workspace>/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Session store: sqlite://..., postgres://..., redis://... or memory
    #[arg(long, default_value = "sqlite://scribe.db")]
    store: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "info,scribe_server=debug,scribe_runtime=debug,scribe_core=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn model_from_env() -> anyhow::Result<OpenAiChatModel> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable is required"))?;
    let model = std::env::var("SCRIBE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let config = OpenAiConfig::new(api_key, model)
        .with_api_url(std::env::var("SCRIBE_API_URL").ok().filter(|url| !url.is_empty()));
    tracing::info!(?config, "Using OpenAI-compatible model");
    OpenAiChatModel::new(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let model = Arc::new(model_from_env()?);
    let store = scribe_persistence::connect(&cli.store).await?;
    let settings = cli
        .settings
        .clone()
        .unwrap_or_else(|| cli.workspace.join("settings.json"));

    let catalog = ToolCatalog::builtin(Workspace::new(&cli.workspace));
    tracing::info!(
        workspace = %cli.workspace.display(),
        settings = %settings.display(),
        store = %cli.store,
        tools = ?catalog.names(),
        "Initializing engine"
    );

    let engine = Engine::builder(model, store)
        .with_catalog(catalog)
        .with_settings(SettingsSource::File(settings))
        .build();
    let app = router(AppState::new(Gateway::new(engine)));

    let bind_addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
