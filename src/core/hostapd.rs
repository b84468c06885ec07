//! WiFi authenticator control via `hostapd_cli`

use crate::core::error::{Error, Result};
use crate::tools::{ToolOutput, ToolRunner, argv};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Where the authenticator keeps its control sockets and configuration
#[derive(Debug, Clone, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostapdPaths {
    pub control_dir: PathBuf,
    pub socket_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Default for HostapdPaths {
    fn default() -> Self {
        Self {
            control_dir: PathBuf::from("/state/wifi/control"),
            socket_dir: PathBuf::from("/state/wifi"),
            config_file: PathBuf::from("/configs/wifi/hostapd.conf"),
        }
    }
}

pub type StationTable = BTreeMap<String, BTreeMap<String, String>>;

/// Parses `key=value` lines; anything else is ignored.
pub fn parse_status(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Parses `all_sta` output: a MAC line opens a station, the `key=value`
/// lines after it belong to that station.
pub fn parse_all_stations(output: &str) -> StationTable {
    let mut stations = StationTable::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if let Some(mac) = &current
                && let Some(station) = stations.get_mut(mac)
            {
                station.insert(key.to_string(), value.to_string());
            }
        } else if line.contains(':') {
            let mac = line.trim().to_string();
            stations.entry(mac.clone()).or_default();
            current = Some(mac);
        }
    }

    stations
}

#[derive(Clone)]
pub struct Hostapd {
    runner: Arc<dyn ToolRunner>,
    program: String,
    paths: HostapdPaths,
}

impl std::fmt::Debug for Hostapd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hostapd")
            .field("program", &self.program)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Hostapd {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, paths: HostapdPaths) -> Self {
        Self {
            runner,
            program: program.into(),
            paths,
        }
    }

    async fn command(&self, cmd: &str) -> Result<ToolOutput> {
        let args = argv([
            "-p".to_string(),
            self.paths.control_dir.display().to_string(),
            "-s".to_string(),
            self.paths.socket_dir.display().to_string(),
            cmd.to_string(),
        ]);
        debug!(cmd, "running hostapd_cli");

        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| Error::Tool {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if output.success {
            Ok(output)
        } else {
            Err(Error::Tool {
                program: self.program.clone(),
                message: format!("{cmd} exited with {:?}: {}", output.exit_code, output.stderr.trim()),
            })
        }
    }

    /// Makes the authenticator re-read its credential files.
    ///
    /// Any failure is [`Error::CredentialReload`]; the authenticator would
    /// otherwise keep serving stale credentials.
    pub async fn reload_psk(&self) -> Result<()> {
        self.command("reload_wpa_psk")
            .await
            .map_err(|e| Error::CredentialReload(e.to_string()))?;
        info!("authenticator reloaded credential files");
        Ok(())
    }

    pub async fn status(&self) -> Result<BTreeMap<String, String>> {
        let output = self.command("status").await?;
        Ok(parse_status(&output.stdout_lossy()))
    }

    pub async fn all_stations(&self) -> Result<StationTable> {
        let output = self.command("all_sta").await?;
        Ok(parse_all_stations(&output.stdout_lossy()))
    }

    /// Raw authenticator configuration file.
    pub async fn config(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.paths.config_file).await?)
    }
}
