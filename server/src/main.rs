// Copyright (c) 2026 Grantees Team. MIT License.
// See LICENSE for details.

//! # Grantees Server
//!
//! Entry point for the `grantees-server` binary. Parses CLI arguments,
//! loads configuration, initializes logging and metrics, opens the ledger
//! database, and serves the HTTP API.
//!
//! The binary supports five subcommands:
//!
//! - `run`: start the API and metrics servers
//! - `init`: create a data directory with a fresh `config.toml`
//! - `status`: query a running server's status endpoint
//! - `grants`: list the bundled grant catalog, offline
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod error;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use grantees_catalog::data;
use grantees_ledger::auth::TokenIssuer;
use grantees_ledger::email::ResendMailer;
use grantees_ledger::payments::EvmRpcVerifier;
use grantees_ledger::GranteesDb;

use cli::{Commands, GranteesCli, DEFAULT_DATA_DIR};
use config::ServerConfig;
use logging::LogFormat;
use metrics::ServerMetrics;

/// Name of the config file `init` writes and `run` looks for.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Bytes of randomness in a generated JWT secret (hex-encoded to 64 chars).
const JWT_SECRET_BYTES: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GranteesCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Init(args) => init_data_dir(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Grants(args) => list_grants(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint.
async fn run_server(args: cli::RunArgs) -> Result<()> {
    let config_path = args.config.clone().or_else(|| {
        let dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let candidate = dir.join(CONFIG_FILE_NAME);
        candidate.exists().then_some(candidate)
    });
    let cfg = ServerConfig::load(config_path.as_deref())
        .context("failed to load configuration")?
        .with_overrides(&args);

    logging::init_logging(&cfg.logging.level, cfg.log_format())
        .context("failed to initialize logging")?;
    cfg.validate().context("invalid configuration")?;

    tracing::info!(
        port = cfg.server.port,
        metrics_port = cfg.server.metrics_port,
        data_dir = %cfg.server.data_dir.display(),
        config = ?config_path,
        "starting grantees-server"
    );

    // --- Persistent storage ---
    let db_path = cfg.db_path();
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = GranteesDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Auth ---
    let tokens = TokenIssuer::with_ttl(&cfg.auth.jwt_secret, cfg.token_ttl())
        .context("failed to create token issuer")?;

    // --- Metrics ---
    let server_metrics = Arc::new(ServerMetrics::new());

    // --- Application state ---
    let mut app_state = api::AppState::new(
        db.clone(),
        tokens,
        cfg.account_policy(),
        Arc::clone(&server_metrics),
    );

    if cfg.payments.verify {
        let verifier = EvmRpcVerifier::new(
            cfg.payments.rpc_url.clone().unwrap_or_default(),
            cfg.payments.treasury_address.clone().unwrap_or_default(),
        )
        .context("failed to create payment verifier")?;
        tracing::info!(treasury = verifier.treasury(), "on-chain payment verification enabled");
        app_state = app_state.with_payments(Arc::new(verifier));
    } else {
        tracing::warn!("payment verification disabled, purchases are credited without checking the chain");
    }

    match cfg.resend_api_key() {
        Some(key) => {
            let mailer = ResendMailer::with_base(cfg.email.api_base.clone(), key)
                .context("failed to create mailer")?;
            app_state = app_state.with_mailer(Arc::new(mailer), cfg.email.welcome_on_signup);
        }
        None => tracing::warn!("RESEND_API_KEY not set, email is disabled"),
    }

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&server_metrics));
    let metrics_addr = format!("{}:{}", cfg.server.host, cfg.server.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("grantees-server stopped");
    Ok(())
}

/// Creates the data directory and writes a `config.toml` with a random
/// JWT secret.
fn init_data_dir(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("grantees_server=info", LogFormat::Pretty)
        .context("failed to initialize logging")?;

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing data directory");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            config_path.display()
        );
    }

    let mut cfg = ServerConfig::default();
    cfg.server.data_dir = data_dir.clone();
    cfg.auth.jwt_secret = generate_secret();
    let rendered = cfg.to_toml().context("failed to render config")?;

    std::fs::write(&config_path, rendered)
        .with_context(|| format!("failed to write config to {}", config_path.display()))?;

    // The file holds the signing secret.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(config = %config_path.display(), "config written");

    println!("Data directory initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config file    : {}", config_path.display());
    println!("  API port       : {}", cfg.server.port);
    println!("  Metrics port   : {}", cfg.server.metrics_port);
    println!();
    println!("Start with: grantees-server run --data-dir {}", data_dir.display());

    Ok(())
}

fn generate_secret() -> String {
    let mut bytes = [0u8; JWT_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Queries a running server's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(grantees_ledger::config::OUTBOUND_HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let status: serde_json::Value = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error", url))?
        .json()
        .await
        .context("status response was not JSON")?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Prints the bundled grants that match the given filters.
fn list_grants(args: cli::GrantsArgs) -> Result<()> {
    let query = api::GrantQuery {
        search: args.search,
        ecosystem: args.ecosystem,
        niche: args.niche,
        status: args.status,
    };
    let filter = query.to_filter()?;
    let grants = filter.apply(data::grants());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&grants)?);
        return Ok(());
    }

    println!(
        "{:<28} {:<10} {:<9} {:<20} NAME",
        "ID", "ECOSYSTEM", "STATUS", "FUNDING"
    );
    for g in &grants {
        println!(
            "{:<28} {:<10} {:<9} {:<20} {}",
            g.id,
            g.ecosystem.as_str(),
            g.status.as_str(),
            g.funding_range_label(),
            g.name
        );
    }
    println!("\n{} grant(s)", grants.len());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("grantees-server {}", env!("CARGO_PKG_VERSION"));
    println!("ledger          {}", grantees_ledger::config::VERSION);
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
