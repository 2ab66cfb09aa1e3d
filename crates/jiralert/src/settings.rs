//! Process settings: command-line flags plus the `PORT` override.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Logfmt,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "jiralert", version, about = "Prometheus Alertmanager webhook receiver for JIRA")]
pub struct Settings {
    /// The address to listen on for HTTP requests.
    #[arg(long = "listen-address", default_value = ":9097")]
    pub listen_address: String,

    /// The JIRAlert configuration file.
    #[arg(long = "config", default_value = "config/jiralert.yml")]
    pub config: PathBuf,

    /// Log filtering level.
    #[arg(long = "log.level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format to use.
    #[arg(long = "log.format", value_enum, default_value_t = LogFormat::Logfmt)]
    pub log_format: LogFormat,
}

impl Settings {
    /// Parses flags, honouring a `.env` file and the `PORT` variable.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        let mut settings = Self::parse();
        settings.apply_port(std::env::var("PORT").ok());
        settings
    }

    fn apply_port(&mut self, port: Option<String>) {
        if let Some(port) = port.filter(|p| !p.is_empty()) {
            self.listen_address = format!(":{}", port);
        }
    }

    /// Listen address suitable for binding; `:9097` binds every interface.
    pub fn bind_address(&self) -> String {
        if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        }
    }
}
