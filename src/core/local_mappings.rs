//! Local DNS host mappings (`<ip> <name>.lan`, one per line)

use crate::core::error::{Error, Result};
use crate::utils::{read_optional, write_atomic};
use std::path::{Path, PathBuf};
use tracing::info;

pub const LOCAL_DOMAIN: &str = "lan";

/// Returns `existing` with every line for `ip` or `hostname` dropped and one
/// `<ip> <hostname>` line appended. Lines with fewer than two fields are
/// discarded.
pub fn rewrite_mappings(existing: &str, ip: &str, hostname: &str) -> String {
    let mut out = String::with_capacity(existing.len() + ip.len() + hostname.len() + 2);

    for line in existing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(line_ip), Some(line_host)) = (fields.next(), fields.next()) else {
            continue;
        };
        if line_ip == ip || line_host == hostname {
            continue;
        }
        out.push_str(line_ip);
        out.push(' ');
        out.push_str(line_host);
        out.push('\n');
    }

    out.push_str(ip);
    out.push(' ');
    out.push_str(hostname);
    out.push('\n');
    out
}

#[derive(Debug, Clone)]
pub struct LocalMappings {
    path: PathBuf,
}

impl LocalMappings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Points `<name>.lan` at `ip`. `name` must already be sanitized and
    /// non-empty. An absent file is created.
    pub async fn upsert(&self, ip: &str, name: &str) -> Result<()> {
        let hostname = format!("{name}.{LOCAL_DOMAIN}");
        let existing = read_optional(&self.path).await?.unwrap_or_default();
        let updated = rewrite_mappings(&existing, ip, &hostname);

        write_atomic(&self.path, updated.as_bytes(), 0o644)
            .await
            .map_err(|source| Error::Persistence {
                path: self.path.clone(),
                source,
            })?;

        info!(ip, hostname, "local DNS mapping updated");
        Ok(())
    }
}
