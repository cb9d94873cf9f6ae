use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),
    #[error("Upstream rejected the request with status {status}")]
    UpstreamRejected { status: u16, body: String },
    #[error("Unexpected response from upstream: {0}")]
    UnexpectedResponse(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            RelayError::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::UnexpectedResponse(_) => StatusCode::BAD_GATEWAY,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            RelayError::UpstreamRejected { body, .. } => {
                // Jira answers with JSON error collections most of the time, plain text otherwise.
                let response = serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                json!({ "error": self.to_string(), "response": response })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
