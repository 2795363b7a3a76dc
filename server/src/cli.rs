//! # CLI Interface
//!
//! Defines the command-line argument structure for `grantees-server` using
//! `clap` derive. Supports five subcommands: `run`, `init`, `status`,
//! `grants`, and `version`.
//!
//! Every `run` flag is optional so that an unset flag never shadows a value
//! from the config file. Precedence is flag/env > config file > default.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = ".grantees";

/// Grantees API server.
///
/// Serves the credit functions, account endpoints, and the grant and
/// opportunity directory, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "grantees-server",
    about = "Grantees credit ledger and grant directory API",
    version,
    propagate_version = true
)]
pub struct GranteesCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the server binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server.
    Run(RunArgs),
    /// Create the data directory and write a starter `config.toml`.
    Init(InitArgs),
    /// Query the status of a running server.
    Status(StatusArgs),
    /// List grants from the bundled catalog without starting a server.
    Grants(GrantsArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to the configuration file (TOML).
    ///
    /// When omitted, the server looks for `config.toml` in the data directory.
    #[arg(long, short = 'c', env = "GRANTEES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database.
    #[arg(long, short = 'd', env = "GRANTEES_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Port for the HTTP API.
    #[arg(long, short = 'p', env = "GRANTEES_PORT")]
    pub port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "GRANTEES_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// HS256 secret for access tokens (at least 32 characters).
    #[arg(long, env = "GRANTEES_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Resend API key for transactional email.
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "GRANTEES_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "GRANTEES_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Overwrite an existing `config.toml`.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running server.
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    pub url: String,
}

/// Arguments for the `grants` subcommand.
#[derive(Parser, Debug)]
pub struct GrantsArgs {
    /// Case-insensitive text search over name, organization, and description.
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Comma-separated ecosystems, e.g. `ethereum,solana`.
    #[arg(long, short = 'e')]
    pub ecosystem: Option<String>,

    /// Comma-separated builder niches, e.g. `infra,defi`.
    #[arg(long, short = 'n')]
    pub niche: Option<String>,

    /// Comma-separated statuses. Defaults to `open`; pass `""` for all.
    #[arg(long)]
    pub status: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}
