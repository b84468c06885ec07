//! Public API handlers

use crate::api::AppState;
use crate::api::error::{ApiResult, ok, parse_body, raw_json};
use crate::audit::EventType;
use crate::core::arp::ArpEntry;
use crate::core::devices::{Device, build_devices};
use crate::core::error::Error;
use crate::core::hostapd::StationTable;
use crate::core::psk::PskEntry;
use crate::core::psk_coordinator::CredentialRequest;
use crate::core::zones::{Client, Zone};
use crate::validators;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use std::collections::BTreeMap;
use tracing::warn;

pub async fn status() -> Json<&'static str> {
    Json("Online")
}

pub async fn get_zones(State(state): State<AppState>) -> ApiResult<Json<Vec<Zone>>> {
    Ok(Json(state.zones.get_all().await?))
}

fn member_from(name: &str, body: &[u8]) -> ApiResult<(String, Client)> {
    let zone = validators::validate_zone_name(name).map_err(|e| Error::validation("name", e))?;
    let client: Client = parse_body(body)?;
    let mac = validators::validate_mac(&client.mac).map_err(|e| Error::validation("Mac", e))?;
    Ok((
        zone,
        Client {
            mac,
            comment: validators::sanitize_comment(&client.comment),
        },
    ))
}

/// Zone edits succeed even when the live re-sync cannot be applied.
async fn refresh(state: &AppState, mac: &str, zone: &str) {
    if let Err(e) = state.policy.refresh_member(mac, zone).await {
        warn!(mac, zone, error = %e, "re-sync after zone edit failed");
    }
}

pub async fn add_zone_member(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Json<bool>> {
    let (zone, client) = member_from(&name, &body)?;
    let mac = client.mac.clone();

    let change = state.zones.add_member(&zone, client).await?;
    state
        .audit
        .record(
            EventType::ZoneMemberAdded,
            true,
            serde_json::json!({ "zone": zone, "mac": mac, "change": format!("{change:?}") }),
            None,
        )
        .await;

    if change.needs_refresh() {
        refresh(&state, &mac, &zone).await;
    }
    Ok(ok())
}

pub async fn remove_zone_member(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Json<bool>> {
    let (zone, client) = member_from(&name, &body)?;

    let change = state.zones.remove_member(&zone, &client.mac).await?;
    state
        .audit
        .record(
            EventType::ZoneMemberRemoved,
            true,
            serde_json::json!({ "zone": zone, "mac": client.mac }),
            None,
        )
        .await;

    if change.needs_refresh() {
        refresh(&state, &client.mac, &zone).await;
    }
    Ok(ok())
}

pub async fn get_devices(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, Device>>> {
    let zones = state.zones.get_all().await?;
    let psks = state.psk.store().load().await?;
    Ok(Json(build_devices(&zones, &psks)))
}

/// Updates the comment of a device in every zone listing it.
pub async fn update_device(
    State(state): State<AppState>,
    Path(mac): Path<String>,
    body: Bytes,
) -> ApiResult<Json<bool>> {
    let path_mac = validators::validate_mac(&mac).map_err(|e| Error::validation("mac", e))?;
    let client: Client = parse_body(&body)?;
    let mac = if client.mac.trim().is_empty() {
        path_mac
    } else {
        validators::validate_mac(&client.mac).map_err(|e| Error::validation("Mac", e))?
    };
    let comment = validators::sanitize_comment(&client.comment);

    let updated = state.zones.update_comment(&mac, &comment).await?;
    state
        .audit
        .record(
            EventType::DeviceUpdated,
            true,
            serde_json::json!({ "mac": mac, "updated": updated }),
            None,
        )
        .await;
    Ok(ok())
}

pub async fn set_psk(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<PskEntry>> {
    let req: CredentialRequest = parse_body(&body)?;
    Ok(Json(state.psk.set_credential(req).await?))
}

pub async fn delete_psk(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<bool>> {
    let req: CredentialRequest = parse_body(&body)?;
    state.psk.delete_credential(&req.mac).await?;
    Ok(ok())
}

pub async fn reload_psk_files(State(state): State<AppState>) -> ApiResult<Json<bool>> {
    state.psk.reload_credentials().await?;
    Ok(ok())
}

pub async fn pending_psk(State(state): State<AppState>) -> ApiResult<Json<bool>> {
    Ok(Json(state.psk.has_pending().await?))
}

/// Raw `nft -j list map` output for one map.
pub async fn show_nfmap(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let name = validators::validate_map_name(&name).map_err(|e| Error::validation("name", e))?;
    match state.policy.maps().list_raw(&name).await {
        Ok(raw) => Ok(raw_json(raw)),
        Err(e) => {
            warn!(map = %name, error = %e, "map listing failed");
            Err(Error::NotFound(format!("map {name}")).into())
        }
    }
}

pub async fn show_arp(State(state): State<AppState>) -> ApiResult<Json<Vec<ArpEntry>>> {
    Ok(Json(state.policy.arp().entries().await?))
}

pub async fn ip_addr(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(raw_json(state.policy.net().addresses_json().await?))
}

pub async fn hostapd_status(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    Ok(Json(state.hostapd.status().await?))
}

pub async fn hostapd_all_stations(State(state): State<AppState>) -> ApiResult<Json<StationTable>> {
    Ok(Json(state.hostapd.all_stations().await?))
}

pub async fn hostapd_config(State(state): State<AppState>) -> ApiResult<String> {
    Ok(state.hostapd.config().await?)
}
