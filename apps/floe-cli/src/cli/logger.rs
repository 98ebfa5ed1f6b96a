//! Logger setup.
//!
//! Logging uses `tracing-subscriber` with `RUST_LOG`-style filtering via
//! `FLOE_LOG` (falling back to `RUST_LOG`). Logs go to stderr so stdout
//! stays clean for plan/verify output and `--json` consumers.

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerLevel {
    #[serde(alias = "DEBUG", alias = "debug")]
    Debug,
    #[serde(alias = "INFO", alias = "info")]
    Info,
    #[serde(alias = "WARN", alias = "warn")]
    Warn,
    #[serde(alias = "ERROR", alias = "error")]
    Error,
}

impl LoggerLevel {
    pub fn to_tracing_level(self) -> LevelFilter {
        match self {
            LoggerLevel::Debug => LevelFilter::DEBUG,
            LoggerLevel::Info => LevelFilter::INFO,
            LoggerLevel::Warn => LevelFilter::WARN,
            LoggerLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Sets up the global subscriber. `debug` (from `--debug`) lowers the
/// default level; explicit `FLOE_LOG`/`RUST_LOG` filters win over both.
pub fn setup_logging(debug: bool) {
    let default_level = if debug {
        LoggerLevel::Debug
    } else {
        LoggerLevel::Warn
    };

    let env_filter = std::env::var("FLOE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            EnvFilter::default().add_directive(default_level.to_tracing_level().into())
        });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
