//! vocab-server - vocabulary IRI registry
//!
//! Serves the registry API by default; `grant-admin` and `remove-user` are
//! operator commands against the same database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vocab_common::config::{resolve_root_folder, SiteConfig, TomlConfig};
use vocab_common::db::init_database;
use vocab_common::events::EventBus;
use vocab_server::services::accounts;
use vocab_server::tasks::TaskRunner;
use vocab_server::{build_router, AppState};

/// Command-line arguments for vocab-server
#[derive(Parser, Debug)]
#[command(name = "vocab-server")]
#[command(about = "Vocabulary IRI registry")]
#[command(version)]
struct Args {
    /// Root folder holding the database and redirect rules
    #[arg(short, long, env = "VOCAB_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "VOCAB_PORT")]
    port: Option<u16>,

    /// Config file (defaults to the platform config location)
    #[arg(short, long, env = "VOCAB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Give a user the administrator capability
    GrantAdmin { username: String },
    /// Delete a user; their registrations remain without an owner
    RemoveUser { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocab_server=info,vocab_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting vocab-server v{}", env!("CARGO_PKG_VERSION"));

    let toml_config =
        TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "VOCAB_ROOT_FOLDER", &toml_config);
    let config = SiteConfig::from_toml(toml_config, root_folder, args.port);
    config
        .ensure_root_folder()
        .with_context(|| format!("Failed to create {}", config.root_folder.display()))?;

    info!("Root folder: {}", config.root_folder.display());
    info!("Database path: {}", config.db_path.display());
    info!("IRI domain: {}", config.iri_domain);

    let pool = init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::GrantAdmin { username } => {
            accounts::grant_admin(&pool, &username)
                .await
                .with_context(|| format!("Failed to grant administrator to {}", username))?;
            info!("{} is now an administrator", username);
            Ok(())
        }
        Command::RemoveUser { username } => {
            accounts::remove_user(&pool, &username)
                .await
                .with_context(|| format!("Failed to remove {}", username))?;
            info!("{} removed", username);
            Ok(())
        }
    }
}

async fn serve(pool: sqlx::SqlitePool, config: SiteConfig) -> Result<()> {
    let event_bus = EventBus::new(config.event_bus_capacity);
    let tasks = TaskRunner::from_config(&config).spawn(&event_bus);
    info!(
        "Task runner started (webhook: {}, rules: {})",
        config.notification_webhook.as_deref().unwrap_or("none"),
        config.redirect.rules_file.display()
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(pool, config, event_bus);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("vocab-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Router (and its event bus) dropped: the runner drains and stops
    if let Err(e) = tasks.await {
        warn!("Task runner ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
