//! # Runtime Configuration
//!
//! The server reads an optional TOML file and then applies command-line
//! flags and environment variables on top:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8787
//! metrics_port = 9787
//! data_dir = ".grantees"
//!
//! [auth]
//! jwt_secret = "..."
//!
//! [credits]
//! signup_bonus = 0
//! referral_reward = 10
//!
//! [payments]
//! verify = true
//! rpc_url = "https://api.avax.network/ext/bc/C/rpc"
//! treasury_address = "0x..."
//!
//! [email]
//! resend_api_key = "re_..."
//!
//! [logging]
//! format = "json"
//! ```
//!
//! Every section and field is optional. Fixed protocol constants (package
//! sizes, prices, limits) live in `grantees_ledger::config` and are not
//! configurable here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use grantees_ledger::config::{
    ACCESS_TOKEN_TTL, DEFAULT_API_PORT, DEFAULT_METRICS_PORT, DEFAULT_SIGNUP_BONUS,
    MIN_JWT_SECRET_LENGTH, REFERRAL_REWARD, RESEND_API_BASE,
};
use grantees_ledger::AccountPolicy;

use crate::cli::{RunArgs, DEFAULT_DATA_DIR};
use crate::logging::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_API_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: ACCESS_TOKEN_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditsSection {
    pub signup_bonus: u64,
    pub referral_reward: u64,
}

impl Default for CreditsSection {
    fn default() -> Self {
        Self {
            signup_bonus: DEFAULT_SIGNUP_BONUS,
            referral_reward: REFERRAL_REWARD,
        }
    }
}

/// On-chain verification of credit purchases. Off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsSection {
    pub verify: bool,
    pub rpc_url: Option<String>,
    pub treasury_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    pub resend_api_key: Option<String>,
    pub api_base: String,
    /// Send the welcome email after a successful signup.
    pub welcome_on_signup: bool,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            api_base: RESEND_API_BASE.into(),
            welcome_on_signup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directives. `RUST_LOG` wins when set.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "grantees_server=info,grantees_ledger=info,tower_http=info".into(),
            format: "pretty".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub credits: CreditsSection,
    pub payments: PaymentsSection,
    pub email: EmailSection,
    pub logging: LoggingSection,
}

impl ServerConfig {
    /// Reads `path`, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Applies flags and environment variables from `run`.
    pub fn with_overrides(mut self, args: &RunArgs) -> Self {
        if let Some(dir) = &args.data_dir {
            self.server.data_dir = dir.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(port) = args.metrics_port {
            self.server.metrics_port = port;
        }
        if let Some(secret) = &args.jwt_secret {
            self.auth.jwt_secret = secret.clone();
        }
        if let Some(key) = &args.resend_api_key {
            self.email.resend_api_key = Some(key.clone());
        }
        if let Some(format) = &args.log_format {
            self.logging.format = format.clone();
        }
        self
    }

    /// Rejects configurations the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.chars().count() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LENGTH} characters \
                 (set GRANTEES_JWT_SECRET or run `grantees-server init`)"
            )));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_secs must be positive".into()));
        }
        if self.server.port == self.server.metrics_port {
            return Err(ConfigError::Invalid(format!(
                "server.port and server.metrics_port are both {}",
                self.server.port
            )));
        }
        if self.payments.verify {
            if blank(&self.payments.rpc_url) {
                return Err(ConfigError::Invalid(
                    "payments.verify requires payments.rpc_url".into(),
                ));
            }
            if blank(&self.payments.treasury_address) {
                return Err(ConfigError::Invalid(
                    "payments.verify requires payments.treasury_address".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("db")
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_secs)
    }

    pub fn account_policy(&self) -> AccountPolicy {
        AccountPolicy {
            signup_bonus: self.credits.signup_bonus,
            referral_reward: self.credits.referral_reward,
        }
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.logging.format)
    }

    /// The Resend key, if one is set and non-empty.
    pub fn resend_api_key(&self) -> Option<&str> {
        self.email
            .resend_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}
