//! Service wiring and listener lifecycle

use crate::api::{self, AppState, Shutdown};
use crate::audit::AuditLog;
use crate::config::AppConfig;
use crate::core::arp::ArpTable;
use crate::core::error::{Error, Result};
use crate::core::hostapd::Hostapd;
use crate::core::local_mappings::LocalMappings;
use crate::core::policy::{NetTools, PolicySynchronizer};
use crate::core::psk::PskStore;
use crate::core::psk_coordinator::PskCoordinator;
use crate::core::verdict_map::VerdictMapClient;
use crate::core::zones::ZoneStore;
use crate::tools::ToolRunner;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tracing::{info, warn};

/// Every component of the control plane, built once at startup
#[derive(Debug, Clone)]
pub struct Services {
    pub zones: Arc<ZoneStore>,
    pub policy: Arc<PolicySynchronizer>,
    pub psk: Arc<PskCoordinator>,
    pub hostapd: Hostapd,
    pub audit: AuditLog,
}

impl Services {
    pub fn build(config: &AppConfig, runner: Arc<dyn ToolRunner>) -> Self {
        let audit = config
            .paths
            .audit_log
            .as_ref()
            .map_or_else(AuditLog::disabled, AuditLog::new);

        let zones = Arc::new(ZoneStore::new(&config.paths.zones));
        let maps = VerdictMapClient::new(Arc::clone(&runner), config.tools.nft.clone());
        let net = NetTools::new(
            Arc::clone(&runner),
            config.tools.ip.clone(),
            config.tools.arp.clone(),
        );
        let policy = PolicySynchronizer::new(
            Arc::clone(&zones),
            maps,
            net,
            ArpTable::new(&config.paths.arp_table),
            LocalMappings::new(&config.paths.local_mappings),
        )
        .with_trunk_interfaces(config.trunk_interfaces.clone())
        .with_audit(audit.clone());

        let hostapd = Hostapd::new(
            runner,
            config.tools.hostapd_cli.clone(),
            config.hostapd.clone(),
        );
        let psk = PskCoordinator::new(
            Arc::new(PskStore::new(&config.paths.psks)),
            config.credentials.clone(),
            hostapd.clone(),
        )
        .with_audit(audit.clone());

        Self {
            zones,
            policy: Arc::new(policy),
            psk: Arc::new(psk),
            hostapd,
            audit,
        }
    }

    /// Handler state with the access settings of `config`. Fatal errors
    /// stop nothing until [`AppState::with_shutdown`] is attached.
    pub fn app_state(&self, config: &AppConfig) -> AppState {
        AppState {
            zones: Arc::clone(&self.zones),
            policy: Arc::clone(&self.policy),
            psk: Arc::clone(&self.psk),
            hostapd: self.hostapd.clone(),
            audit: self.audit.clone(),
            api_tokens: Arc::new(config.api_tokens.clone()),
            allow_unauthenticated: config.allow_unauthenticated,
            shutdown: None,
        }
    }
}

/// Binds a Unix socket, replacing a stale socket file from a previous run.
async fn bind_unix(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(UnixListener::bind(path)?)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Serves the public API and both control sockets until SIGINT/SIGTERM or
/// a fatal error.
///
/// # Errors
///
/// Returns `Err` if a listener cannot be bound, a server fails, or the
/// listeners were stopped by a fatal error.
pub async fn serve(config: AppConfig, runner: Arc<dyn ToolRunner>) -> Result<()> {
    let missing = config.tools.missing();
    if !missing.is_empty() {
        warn!(?missing, "external tools not found, related operations will fail");
    }
    if config.allow_unauthenticated {
        warn!(addr = %config.listeners.public_addr, "public API accepts unauthenticated requests");
    } else if config.api_tokens.is_empty() {
        warn!("no api_tokens configured, every public API request will be rejected");
    }

    let (stop_tx, stop_rx) = watch::channel(Shutdown::Running);
    let stop_tx = Arc::new(stop_tx);

    let services = Services::build(&config, runner);
    let state = services.app_state(&config).with_shutdown(Arc::clone(&stop_tx));

    let public = TcpListener::bind(&config.listeners.public_addr).await?;
    let dhcp = bind_unix(&config.listeners.dhcp_socket).await?;
    let wifi = bind_unix(&config.listeners.wifi_socket).await?;
    info!(
        public = %config.listeners.public_addr,
        dhcp = %config.listeners.dhcp_socket.display(),
        wifi = %config.listeners.wifi_socket.display(),
        "listening"
    );

    let stopped = |mut rx: watch::Receiver<Shutdown>| async move {
        // only stop reasons are ever sent
        let _ = rx.changed().await;
    };

    let public_srv = axum::serve(public, api::public_router(state.clone()))
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let dhcp_srv = axum::serve(dhcp, api::dhcp_router(state.clone()))
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let wifi_srv =
        axum::serve(wifi, api::wifi_router(state)).with_graceful_shutdown(stopped(stop_rx));

    let signal_tx = Arc::clone(&stop_tx);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutting down");
        signal_tx.send_if_modified(|reason| {
            if *reason == Shutdown::Running {
                *reason = Shutdown::Signal;
                true
            } else {
                false
            }
        });
    });

    let served = tokio::try_join!(
        async { public_srv.await },
        async { dhcp_srv.await },
        async { wifi_srv.await },
    );

    for path in [&config.listeners.dhcp_socket, &config.listeners.wifi_socket] {
        let _ = tokio::fs::remove_file(path).await;
    }
    served?;

    let reason = stop_tx.borrow().clone();
    match reason {
        Shutdown::Fatal(message) => Err(Error::Internal(format!(
            "stopped after fatal error: {message}"
        ))),
        Shutdown::Running | Shutdown::Signal => Ok(()),
    }
}
