use crate::api::{AppState, Shutdown};
use crate::api::error::FatalError;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

/// Logs method, URI and response status of every request.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

/// Rejects requests without a configured bearer token. With no tokens
/// configured every request is rejected unless unauthenticated access was
/// enabled explicitly.
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.allow_unauthenticated {
        return next.run(req).await;
    }

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if state.api_tokens.iter().any(|t| t == token) => next.run(req).await,
        _ => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

/// Requests a graceful stop after a request hit a fatal error. The response
/// itself is still delivered; the listeners drain and the daemon exits
/// non-zero.
pub async fn fatal_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if let Some(FatalError(message)) = response.extensions().get::<FatalError>() {
        error!(error = %message, "persisted state can no longer be trusted");
        if let Some(tx) = &state.shutdown {
            tx.send_replace(Shutdown::Fatal(message.clone()));
        }
    }
    response
}
