use crate::core::error::{Error, Result};
use crate::core::hostapd::HostapdPaths;
use crate::core::psk_coordinator::CredentialPaths;
use crate::tools::ToolPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/state/api/config.json";

/// Environment variable naming a trunk/VLAN interface pattern
pub const VLANSIF_ENV: &str = "VLANSIF";

/// Environment variable selecting the config file
pub const CONFIG_ENV: &str = "ZONEWARDEN_CONFIG";

/// Persisted state and collaborator files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatePaths {
    pub zones: PathBuf,
    pub psks: PathBuf,
    pub local_mappings: PathBuf,
    pub arp_table: PathBuf,
    pub audit_log: Option<PathBuf>,
}

impl Default for StatePaths {
    fn default() -> Self {
        Self {
            zones: PathBuf::from("/configs/zones/zones.json"),
            psks: PathBuf::from("/configs/wifi/psks.json"),
            local_mappings: PathBuf::from("/state/dns/local_mappings"),
            arp_table: PathBuf::from("/proc/net/arp"),
            audit_log: Some(PathBuf::from("/state/api/audit.log")),
        }
    }
}

/// Where the three listeners bind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Listeners {
    /// Public HTTP API (TCP)
    pub public_addr: String,
    /// Unix socket for the DHCP server
    pub dhcp_socket: PathBuf,
    /// Unix socket for the WiFi authenticator
    pub wifi_socket: PathBuf,
}

impl Default for Listeners {
    fn default() -> Self {
        Self {
            public_addr: "0.0.0.0:80".to_string(),
            dhcp_socket: PathBuf::from("/state/dhcp/apisock"),
            wifi_socket: PathBuf::from("/state/wifi/apisock"),
        }
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub paths: StatePaths,
    pub credentials: CredentialPaths,
    pub hostapd: HostapdPaths,
    pub listeners: Listeners,
    pub tools: ToolPaths,
    /// Interface name patterns whose stale map elements are flushed by
    /// interface, not only by MAC/IP
    pub trunk_interfaces: Vec<String>,
    /// Bearer tokens accepted on the public API
    pub api_tokens: Vec<String>,
    /// Serve the public API without tokens. Without this, an empty token
    /// list rejects every public request.
    pub allow_unauthenticated: bool,
}

impl AppConfig {
    /// Applies environment overrides on top of the file contents.
    pub fn apply_env(&mut self) {
        if let Ok(pattern) = std::env::var(VLANSIF_ENV) {
            let pattern = pattern.trim();
            if !pattern.is_empty() && !self.trunk_interfaces.iter().any(|p| p == pattern) {
                self.trunk_interfaces.push(pattern.to_string());
            }
        }
    }
}

/// Config path from the command line, the environment, or the default.
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    cli.map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads the config file; a missing file yields defaults.
///
/// Environment overrides are applied on top.
///
/// # Errors
///
/// Returns `Err` if the file exists but cannot be read or parsed.
pub async fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = match crate::utils::read_optional(path).await? {
        Some(json) => serde_json::from_str::<AppConfig>(&json).map_err(|e| {
            Error::validation("config", format!("{}: {e}", path.display()))
        })?,
        None => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            AppConfig::default()
        }
    };
    config.apply_env();
    Ok(config)
}
