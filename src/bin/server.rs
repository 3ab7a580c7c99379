//! Quizdeck Server
//!
//! Serves quizzes and study groups from the local document store over HTTP.
//!
//! # Configuration
//!
//! Read from the same config file as the CLI (`--config` or
//! `~/.config/quizdeck/config.yaml`). Environment variables override it:
//! - `QUIZDECK_PORT`: Port to listen on (default: 8080)
//! - `QUIZDECK_DATABASE_PATH`: SQLite document store
//! - `QUIZDECK_AI_ENDPOINT`, `QUIZDECK_AI_API_KEY`, `QUIZDECK_AI_MODEL`:
//!   generative AI forwarding, disabled when no endpoint is set
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint
//! - `/quizzes`, `/users/{uid}/...`, `/groups/{gid}/...`: see [`quizdeck::server`]
//! - `POST /api/generate`: Forward a request to the AI provider

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizdeck::access::Backend;
use quizdeck::ai::GenerativeClient;
use quizdeck::config::Config;
use quizdeck::db::{init_db, DocumentStore};
use quizdeck::server::{router, AppState};

#[derive(Parser)]
#[command(name = "quizdeck-server")]
#[command(version)]
#[command(about = "HTTP server for quizdeck", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizdeck=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load(args.config)?;

    tracing::info!(
        "Database: {} ({})",
        config.database_path.value.display(),
        config.database_path.source
    );

    let pool = init_db(&config.database_path.value).await?;
    let backend = Backend::new(DocumentStore::new(pool));

    // Build app state
    let mut state = AppState::new(backend);
    match GenerativeClient::from_config(&config.ai) {
        Some(client) => {
            tracing::info!("AI forwarding to {}", client.endpoint());
            state = state.with_ai(client);
        }
        None => tracing::info!("AI forwarding disabled"),
    }

    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
