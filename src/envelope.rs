use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_with::skip_serializing_none;

/// Uniform response wrapper. The transport status line always equals
/// `status`.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: String,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, result: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn created(message: impl Into<String>, result: T) -> Self {
        Self {
            status: StatusCode::CREATED.as_u16(),
            ..Self::ok(message, result)
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            result: None,
            error: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
