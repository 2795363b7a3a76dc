//! # Log Output
//!
//! One subscriber for the whole process, writing to stderr. `run` logs
//! every request and ledger mutation through it; `grants` and `status`
//! print their results on stdout, which stays free of log lines.
//!
//! The filter comes from `RUST_LOG` when it is set and from
//! `logging.level` in `config.toml` otherwise.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored multi-field lines with file and line number.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; every other value,
    /// including an empty one, falls back to [`LogFormat::Pretty`].
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber.
///
/// `default_directives` is an `EnvFilter` string such as
/// `"grantees_server=info,tower_http=debug"`, used only when `RUST_LOG`
/// is unset. Fails if a subscriber is already installed.
pub fn init_logging(default_directives: &str, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init()?,
    }

    tracing::debug!(?format, directives = default_directives, "logging ready");
    Ok(())
}
