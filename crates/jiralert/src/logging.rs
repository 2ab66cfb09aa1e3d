use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LogLevel};

/// Installs the global subscriber. `RUST_LOG`, when set, takes precedence
/// over `--log.level`.
pub fn init(level: LogLevel, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    match format {
        LogFormat::Logfmt => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .flatten_event(true)
                .with_file(true)
                .with_line_number(true)
                .with_env_filter(filter)
                .init();
        }
    }
}
