//! Kernel ARP table reader (`/proc/net/arp`)
//!
//! ```text
//! IP address       HW type     Flags       HW address            Mask     Device
//! 10.0.0.5         0x1         0x2         aa:bb:cc:dd:ee:02     *        br-lan
//! ```

use crate::core::error::Result;
use crate::utils::equal_mac;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpEntry {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "HWType")]
    pub hw_type: String,
    #[serde(rename = "Flags")]
    pub flags: String,
    #[serde(rename = "Mac")]
    pub mac: String,
    #[serde(rename = "Mask")]
    pub mask: String,
    #[serde(rename = "Device")]
    pub device: String,
}

/// Parses the table text. The header line and rows with fewer than six
/// columns are skipped.
pub fn parse_arp_table(text: &str) -> Vec<ArpEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 6 {
                if !line.trim().is_empty() {
                    debug!(line, "skipping short arp row");
                }
                return None;
            }
            Some(ArpEntry {
                ip: cols[0].to_string(),
                hw_type: cols[1].to_string(),
                flags: cols[2].to_string(),
                mac: cols[3].to_string(),
                mask: cols[4].to_string(),
                device: cols[5].to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ArpTable {
    path: PathBuf,
}

impl ArpTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn entries(&self) -> Result<Vec<ArpEntry>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_arp_table(&text))
    }

    /// First entry whose hardware address matches `mac`.
    pub async fn find_by_mac(&self, mac: &str) -> Result<Option<ArpEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .find(|e| equal_mac(&e.mac, mac)))
    }
}
