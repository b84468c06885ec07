//! Handlers for the trusted local control sockets

use crate::api::AppState;
use crate::api::error::{ApiResult, ok, parse_body};
use crate::core::policy::DhcpUpdate;
use crate::core::psk_coordinator::{AuthFailureReport, AuthSuccessReport};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

pub async fn dhcp_update(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<bool>> {
    let update: DhcpUpdate = parse_body(&body)?;
    state.policy.handle_dhcp_update(&update).await?;
    Ok(ok())
}

pub async fn report_auth_failure(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AuthFailureReport>> {
    let report: AuthFailureReport = parse_body(&body)?;
    Ok(Json(state.psk.on_auth_failure(report).await?))
}

pub async fn report_auth_success(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AuthSuccessReport>> {
    let report: AuthSuccessReport = parse_body(&body)?;
    Ok(Json(state.psk.on_auth_success(report).await?))
}
