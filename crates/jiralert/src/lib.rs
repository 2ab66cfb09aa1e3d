pub mod alert;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod settings;
pub mod template;

use thiserror::Error;

/// Startup-time failures. Anything returned from here is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Receiver name used in diagnostics and metrics when routing never completed.
pub const UNKNOWN_RECEIVER: &str = "<unknown>";
