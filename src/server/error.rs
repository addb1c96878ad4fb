//! JSON envelope and the error taxonomy exposed over HTTP.

use crate::streaming::StreamError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: T,
}

/// `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data,
    })
    .into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("listener identity required")]
    Forbidden,
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to clients. Internal and upstream details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServiceError::NotFound(message) | ServiceError::BadRequest(message) => message.clone(),
            ServiceError::Forbidden => "Forbidden".to_string(),
            ServiceError::Upstream(_) => "Media service unavailable, please retry".to_string(),
            ServiceError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<StreamError> for ServiceError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidId(id) => ServiceError::BadRequest(format!("Invalid id: {}", id)),
            StreamError::NotFound(message) => ServiceError::NotFound(message),
            StreamError::Upstream(err) => ServiceError::Upstream(err.to_string()),
            StreamError::Internal(err) => ServiceError::Internal(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            ServiceError::Internal(err) => error!("Request failed: {:#}", err),
            ServiceError::Upstream(detail) => warn!("Upstream failure: {}", detail),
            _ => {}
        }
        let body = ErrorBody {
            success: false,
            message: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
