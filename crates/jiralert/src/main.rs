use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use jiralert::{
    config::Config,
    logging,
    metrics::Metrics,
    notify::TrackerGateway,
    server::Server,
    settings::Settings,
    template::Template,
};

#[tokio::main]
async fn main() {
    let settings = Settings::load();
    logging::init(settings.log_level, settings.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "starting JIRAlert");

    if let Err(e) = run(settings).await {
        error!(err = %format!("{:#}", e), "exiting");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let config = Config::load_file(&settings.config)
        .with_context(|| format!("error loading configuration {}", settings.config.display()))?;

    let template = Template::load(config.template.as_deref())
        .context("error loading templates")?
        .with_fields(config.receivers.iter().flat_map(|r| r.template_fields()));

    let metrics = Metrics::new().context("error registering metrics")?;
    let gateway = TrackerGateway::new(Arc::new(template))?;

    info!(receivers = config.receivers.len(), "loaded configuration");
    let server = Server::new(Arc::new(config), Arc::new(gateway), metrics);

    let addr = settings.bind_address();
    server
        .start(&addr)
        .await
        .with_context(|| format!("failed to start HTTP server on {}", addr))?;
    Ok(())
}
