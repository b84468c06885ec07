//! HTTP interfaces
//!
//! Three routers share one [`AppState`]:
//!
//! - [`public_router`]: the UI/API listener (TCP), optionally token-guarded
//! - [`dhcp_router`]: lease notifications from the DHCP server (Unix socket)
//! - [`wifi_router`]: authentication reports from the authenticator (Unix socket)
//!
//! Every router logs requests and, after a fatal error, asks the daemon to
//! stop once in-flight responses are sent.

pub mod control;
pub mod error;
pub mod middleware;
pub mod public;

use crate::audit::AuditLog;
use crate::core::hostapd::Hostapd;
use crate::core::policy::PolicySynchronizer;
use crate::core::psk_coordinator::PskCoordinator;
use crate::core::zones::ZoneStore;
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tokio::sync::watch;

/// Why the listeners are stopping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Shutdown {
    #[default]
    Running,
    Signal,
    /// Persisted state can no longer be trusted
    Fatal(String),
}

#[derive(Clone)]
pub struct AppState {
    pub zones: Arc<ZoneStore>,
    pub policy: Arc<PolicySynchronizer>,
    pub psk: Arc<PskCoordinator>,
    pub hostapd: Hostapd,
    pub audit: AuditLog,
    pub api_tokens: Arc<Vec<String>>,
    pub allow_unauthenticated: bool,
    /// Graceful stop requested after a fatal error. `None` keeps serving.
    pub shutdown: Option<Arc<watch::Sender<Shutdown>>>,
}

impl AppState {
    pub fn with_shutdown(mut self, tx: Arc<watch::Sender<Shutdown>>) -> Self {
        self.shutdown = Some(tx);
        self
    }
}

fn with_common_layers(router: Router<AppState>, state: &AppState) -> Router {
    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::fatal_guard,
        ))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .with_state(state.clone())
}

pub fn public_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/status", get(public::status))
        .route("/zones", get(public::get_zones))
        .route(
            "/zone/{name}",
            put(public::add_zone_member).delete(public::remove_zone_member),
        )
        .route("/devices", get(public::get_devices))
        .route("/device/{mac}", post(public::update_device))
        .route(
            "/setPSK",
            put(public::set_psk).delete(public::delete_psk),
        )
        .route("/reloadPSKFiles", put(public::reload_psk_files))
        .route("/pendingPSK", get(public::pending_psk))
        .route("/nfmap/{name}", get(public::show_nfmap))
        .route("/arp", get(public::show_arp))
        .route("/ip/addr", get(public::ip_addr))
        .route("/hostapd/status", get(public::hostapd_status))
        .route("/hostapd/all_stations", get(public::hostapd_all_stations))
        .route("/hostapd/config", get(public::hostapd_config))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ))
        .layer(axum::middleware::from_fn(middleware::security_headers));

    with_common_layers(router, &state)
}

pub fn dhcp_router(state: AppState) -> Router {
    let router = Router::new().route("/dhcpUpdate", put(control::dhcp_update));
    with_common_layers(router, &state)
}

pub fn wifi_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/reportPSKAuthFailure", put(control::report_auth_failure))
        .route("/reportPSKAuthSuccess", put(control::report_auth_success));
    with_common_layers(router, &state)
}
