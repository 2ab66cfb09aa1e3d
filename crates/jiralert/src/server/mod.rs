mod dispatch;
mod pages;
mod response;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{config::Config, metrics::Metrics, notify::NotifierGateway, Result};

pub use dispatch::{DispatchError, Dispatcher};
pub use response::ResponseEnvelope;

pub struct Server {
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: Arc<Config>, gateway: Arc<dyn NotifierGateway>, metrics: Metrics) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config, gateway, metrics)),
        }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/", get(routes::home))
            .route("/config", get(routes::config))
            .route("/healthz", get(routes::health_check))
            .route("/metrics", get(routes::metrics))
            .route("/alert", post(routes::alert))
            .layer(TraceLayer::new_for_http())
            .with_state(self.dispatcher)
    }

    /// Serves until ctrl-c. Dropped client connections drop their handler
    /// future, which aborts any in-flight tracker request with it.
    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "listening");
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(e) => {
            warn!(err = %e, "cannot listen for ctrl-c, graceful shutdown disabled");
            std::future::pending::<()>().await
        }
    }
}
