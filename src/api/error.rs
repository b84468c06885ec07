use crate::core::error::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

/// Marker placed in the extensions of a response produced by a fatal error.
/// The fatal guard middleware stops the daemon when it sees one.
#[derive(Debug, Clone)]
pub struct FatalError(pub String);

/// Handler error: a core error rendered as an HTTP status and message
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Nftables { .. } | Error::Tool { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }

        let mut response = (status, message.clone()).into_response();
        if self.0.is_fatal() {
            response.extensions_mut().insert(FatalError(message));
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Decodes a JSON request body. Clients are not required to send a
/// `Content-Type` header.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError(Error::validation("body", e.to_string())))
}

/// Passes through a JSON document produced by an external tool.
pub fn raw_json(bytes: Vec<u8>) -> Response {
    (
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response()
}

pub fn ok() -> Json<bool> {
    Json(true)
}
