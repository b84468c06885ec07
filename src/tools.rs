//! External tool execution
//!
//! The control plane drives four external programs: `nft` (verdict maps),
//! `ip` (router endpoint addresses), `arp` (static bindings), and
//! `hostapd_cli` (credential reload and station queries). All of them are
//! spawned through the [`ToolRunner`] trait so that tests can swap in an
//! in-memory packet filter.
//!
//! # Security
//!
//! - Arguments are passed as argv, never through a shell
//! - Callers validate every interpolated value (see [`crate::validators`])
//! - The daemon expects to run as root (or with `CAP_NET_ADMIN`); there is no
//!   privilege escalation path
//!
//! Invocations are awaited to completion without a timeout. A hung tool
//! stalls only the operation (and lock) that is waiting on it.

use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Captured result of one tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

pub type RunFuture<'a> = Pin<Box<dyn Future<Output = std::io::Result<ToolOutput>> + Send + 'a>>;

/// Spawns an external program and collects its output.
///
/// `Err` means the program could not be started at all; a non-zero exit is
/// reported through [`ToolOutput::success`].
pub trait ToolRunner: Send + Sync {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a>;
}

/// Runs tools as real subprocesses via `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            debug!(program, ?args, "spawning tool");
            let output = tokio::process::Command::new(program)
                .args(args)
                .stdin(std::process::Stdio::null())
                .output()
                .await?;

            Ok(ToolOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

/// Program names (or absolute paths) of the external tools
#[derive(Debug, Clone, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolPaths {
    pub nft: String,
    pub ip: String,
    pub arp: String,
    pub hostapd_cli: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            nft: "nft".to_string(),
            ip: "ip".to_string(),
            arp: "arp".to_string(),
            hostapd_cli: "hostapd_cli".to_string(),
        }
    }
}

impl ToolPaths {
    /// Names of configured tools that cannot be found.
    pub fn missing(&self) -> Vec<&str> {
        [&self.nft, &self.ip, &self.arp, &self.hostapd_cli]
            .into_iter()
            .map(String::as_str)
            .filter(|name| !binary_exists(name))
            .collect()
    }
}

/// Checks if a binary exists, either as a path or somewhere in `PATH`
pub fn binary_exists(name: &str) -> bool {
    if name.contains('/') {
        return std::path::Path::new(name).is_file();
    }

    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Builds an owned argv from string slices.
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}
