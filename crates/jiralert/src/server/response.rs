use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Wire-level result of a `POST /alert` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub error: bool,
    pub status: u16,
    pub message: String,
}

impl ResponseEnvelope {
    pub fn ok() -> Self {
        Self {
            error: false,
            status: StatusCode::OK.as_u16(),
            message: String::new(),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: true,
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
