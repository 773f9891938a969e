// Loan Approval Gate - Web Server
// REST API with Axum over the same credential store and model as the CLI

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loan_approval::api::{router, AppState};
use loan_approval::{AppConfig, CredentialStore, ForestModel, Predictor, SqliteUserStore};

#[derive(Parser)]
#[command(name = "loan-server", version, about = "Loan approval HTTP API")]
struct ServerArgs {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database with users and audit events
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON model artifact
    #[arg(long)]
    model: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:3000
    #[arg(long)]
    addr: Option<String>,

    /// Log level (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(fmt::layer())
        .init();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if let Some(addr) = args.addr {
        config.bind_addr = addr;
    }

    println!("🚀 Loan Approval Gate - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Open database
    let store = SqliteUserStore::open(&config.db_path)?;
    println!("✓ Database opened: {:?}", config.db_path);

    // Load model
    let model = ForestModel::load(&config.model_path)?;
    let model_fingerprint = model.fingerprint().to_string();
    println!("✓ Model loaded: {:?}", config.model_path);

    // Create shared state
    let state = Arc::new(AppState {
        credentials: CredentialStore::new(store),
        predictor: Predictor::new(model),
        model_fingerprint,
    });

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Server listening");
    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: http://{}/api/health", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
