use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::{Html, IntoResponse, Response},
};
use http::{header, StatusCode};
use std::sync::Arc;
use tracing::{debug, error};

use super::{dispatch::Dispatcher, pages, response::ResponseEnvelope};

pub async fn alert(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Result<Bytes, BytesRejection>,
) -> ResponseEnvelope {
    debug!("handling /alert webhook request");
    dispatcher.handle(body).await
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn metrics(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    match dispatcher.metrics().gather() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(err = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn home() -> Response {
    render_page(pages::home())
}

pub async fn config(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    render_page(pages::config(&dispatcher.config().to_display_string()))
}

fn render_page(page: tera::Result<String>) -> Response {
    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(err = %e, "failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
