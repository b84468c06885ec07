//! Per-device WiFi pre-shared keys
//!
//! The store is a JSON object keyed by lower-case MAC, plus one reserved key,
//! `"pending"`, holding a credential that has not been bound to a station
//! yet. In memory the pending slot is a separate `Option` on [`PskBook`], so
//! "at most one pending credential" holds by construction rather than by
//! string convention.
//!
//! The authenticator consumes two derived files:
//!
//! ```text
//! sae_passwords   <psk>|mac=<mac>          pending: <psk>|mac=ff:ff:ff:ff:ff:ff
//! wpa2pskfile     <mac> <psk>              pending: 00:00:00:00:00:00 <psk>
//! ```
//!
//! The pending line is always written first. The authenticator resolves
//! duplicates last-match-wins, so the wildcard line acts as a catch-all with
//! lower priority than any MAC-specific line after it.

use crate::core::error::{Error, Result};
use crate::utils::{canonical_mac, read_optional, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

pub const PENDING_KEY: &str = "pending";

/// SAE wildcard station address for the pending credential
pub const SAE_WILDCARD_MAC: &str = "ff:ff:ff:ff:ff:ff";

/// WPA2 wildcard station address for the pending credential
pub const WPA2_WILDCARD_MAC: &str = "00:00:00:00:00:00";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PskType {
    Sae,
    Wpa2,
}

impl PskType {
    /// Parses an authentication type as reported by the authenticator,
    /// where WPA2-PSK is spelled `wpa`.
    pub fn from_auth_report(value: &str) -> Option<Self> {
        match value {
            "sae" => Some(Self::Sae),
            "wpa" | "wpa2" => Some(Self::Wpa2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PskEntry {
    #[serde(rename = "Type")]
    pub psk_type: PskType,
    #[serde(default)]
    pub mac: String,
    pub psk: String,
    #[serde(default)]
    pub comment: String,
}

/// Everything the PSK store holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PskBook {
    #[serde(rename = "pending", default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PskEntry>,
    #[serde(flatten)]
    pub entries: BTreeMap<String, PskEntry>,
}

impl PskBook {
    pub fn get(&self, mac: &str) -> Option<&PskEntry> {
        self.entries.get(&canonical_mac(mac))
    }

    pub fn contains(&self, mac: &str) -> bool {
        self.get(mac).is_some()
    }

    /// Inserts `entry` keyed by its canonical MAC, replacing any previous one.
    pub fn insert(&mut self, mut entry: PskEntry) {
        entry.mac = canonical_mac(&entry.mac);
        self.entries.insert(entry.mac.clone(), entry);
    }

    pub fn remove(&mut self, mac: &str) -> Option<PskEntry> {
        self.entries.remove(&canonical_mac(mac))
    }

    /// Moves the pending credential under `mac`, optionally overriding its
    /// type. Returns the claimed entry, or `None` if nothing was pending.
    pub fn claim_pending(&mut self, mac: &str, psk_type: Option<PskType>) -> Option<PskEntry> {
        let mut entry = self.pending.take()?;
        entry.mac = canonical_mac(mac);
        if let Some(t) = psk_type {
            entry.psk_type = t;
        }
        self.insert(entry.clone());
        Some(entry)
    }

    /// Re-keys entries whose stored key is not canonical.
    fn normalize(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for (key, mut entry) in entries {
            if entry.mac.trim().is_empty() {
                entry.mac = key;
            }
            self.insert(entry);
        }
    }
}

/// Rendered authenticator credential files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFiles {
    pub sae: String,
    pub wpa2: String,
}

impl CredentialFiles {
    pub fn render(book: &PskBook) -> Self {
        let mut files = Self::default();

        if let Some(pending) = &book.pending {
            files.push(pending.psk_type, SAE_WILDCARD_MAC, WPA2_WILDCARD_MAC, &pending.psk);
        }

        for entry in book.entries.values() {
            files.push(entry.psk_type, &entry.mac, &entry.mac, &entry.psk);
        }

        files
    }

    fn push(&mut self, psk_type: PskType, sae_mac: &str, wpa2_mac: &str, psk: &str) {
        match psk_type {
            PskType::Sae => {
                self.sae.push_str(psk);
                self.sae.push_str("|mac=");
                self.sae.push_str(sae_mac);
                self.sae.push('\n');
            }
            PskType::Wpa2 => {
                self.wpa2.push_str(wpa2_mac);
                self.wpa2.push(' ');
                self.wpa2.push_str(psk);
                self.wpa2.push('\n');
            }
        }
    }

    /// Parses both files back into MAC-keyed entries. Wildcard (pending)
    /// lines and malformed lines are skipped.
    pub fn parse(&self) -> Vec<PskEntry> {
        let mut parsed = Vec::new();

        for line in self.sae.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some((psk, mac)) = line.rsplit_once("|mac=")
                && !equal_wildcard(mac, SAE_WILDCARD_MAC)
            {
                parsed.push(PskEntry {
                    psk_type: PskType::Sae,
                    mac: canonical_mac(mac),
                    psk: psk.to_string(),
                    comment: String::new(),
                });
            }
        }

        for line in self.wpa2.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some((mac, psk)) = line.split_once(' ')
                && !equal_wildcard(mac, WPA2_WILDCARD_MAC)
            {
                parsed.push(PskEntry {
                    psk_type: PskType::Wpa2,
                    mac: canonical_mac(mac),
                    psk: psk.trim().to_string(),
                    comment: String::new(),
                });
            }
        }

        parsed
    }
}

fn equal_wildcard(mac: &str, wildcard: &str) -> bool {
    crate::utils::equal_mac(mac, wildcard)
}

/// File-backed PSK store
///
/// Mutations go through [`PskStore::begin`], which hands out a
/// [`PskTransaction`] holding the store lock. The lock stays held for as long
/// as the transaction lives, which lets callers keep credential regeneration
/// and the authenticator reload inside the same critical section.
#[derive(Debug)]
pub struct PskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock-free snapshot read. An absent file is an empty book.
    pub async fn load(&self) -> Result<PskBook> {
        load_book(&self.path).await
    }

    /// Acquires the store lock.
    pub async fn begin(&self) -> PskTransaction<'_> {
        PskTransaction {
            store: self,
            _guard: self.lock.lock().await,
        }
    }
}

async fn load_book(path: &Path) -> Result<PskBook> {
    let mut book: PskBook = match read_optional(path).await? {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(&json)?,
        _ => PskBook::default(),
    };
    book.normalize();
    Ok(book)
}

/// Exclusive access to the PSK store
pub struct PskTransaction<'a> {
    store: &'a PskStore,
    _guard: MutexGuard<'a, ()>,
}

impl PskTransaction<'_> {
    pub async fn load(&self) -> Result<PskBook> {
        load_book(&self.store.path).await
    }

    /// Atomically replaces the store file. Failures are fatal.
    pub async fn save(&self, book: &PskBook) -> Result<()> {
        let json = serde_json::to_string_pretty(book)?;
        write_atomic(&self.store.path, json.as_bytes(), 0o600)
            .await
            .map_err(|source| Error::Persistence {
                path: self.store.path.clone(),
                source,
            })
    }
}
