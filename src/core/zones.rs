//! Device-to-zone membership store
//!
//! Zones are persisted as a single JSON array (`[{Name, Clients: [{Mac, Comment}]}]`).
//! The file is re-read on every [`ZoneStore::get_all`] call; there is no
//! in-memory cache that could drift from disk.
//!
//! Every read-modify-write sequence runs under one store-wide lock, so two
//! requests touching overlapping zones can never lose each other's update.
//! Plain reads skip the lock: writes go through temp-file + rename, so a
//! reader always sees one complete version of the file.
//!
//! Invariants maintained by the mutators:
//! - a zone never has an empty client list (it is removed instead)
//! - no two zones share a name
//! - client MACs are stored canonical (trimmed, lower-case)

use crate::core::error::{Error, Result};
use crate::utils::{canonical_mac, equal_mac, read_optional, write_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// A device reference inside a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Client {
    pub mac: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Zone {
    pub name: String,
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl Zone {
    pub fn contains(&self, mac: &str) -> bool {
        self.clients.iter().any(|c| equal_mac(&c.mac, mac))
    }
}

/// The four zones with fixed packet-filter semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinZone {
    /// Deny by omission: never receives a verdict element
    Isolated,
    Lan,
    Wan,
    Dns,
}

impl BuiltinZone {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// The single builtin verdict map backing this zone.
    pub const fn verdict_map(self) -> Option<&'static str> {
        match self {
            BuiltinZone::Isolated => None,
            BuiltinZone::Lan => Some("lan_access"),
            BuiltinZone::Wan => Some("internet_access"),
            BuiltinZone::Dns => Some("dns_access"),
        }
    }
}

/// Outcome of a membership mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Member already present with the same comment
    Unchanged,
    /// Member already present; only the comment was rewritten
    CommentUpdated,
    /// New member appended to an existing zone
    Added,
    /// Zone did not exist and was created with this single member
    ZoneCreated,
    /// Member removed (and the zone too, if it became empty)
    Removed,
}

impl MembershipChange {
    /// Whether live verdict-map state for the MAC must be re-synchronized.
    ///
    /// A freshly created zone is not enforced immediately: the device may not
    /// hold a lease yet, and its next DHCP event will populate the maps.
    pub const fn needs_refresh(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

/// File-backed zone membership store
#[derive(Debug)]
pub struct ZoneStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ZoneStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every zone in file order. An absent file means "no zones".
    pub async fn get_all(&self) -> Result<Vec<Zone>> {
        match read_optional(&self.path).await? {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Zones whose client list contains `mac`.
    pub async fn zones_for(&self, mac: &str) -> Result<Vec<Zone>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|z| z.contains(mac))
            .collect())
    }

    /// Serializes the full list and atomically replaces the file.
    ///
    /// A failure here is [`Error::Persistence`], which callers treat as fatal.
    pub async fn save(&self, zones: &[Zone]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(zones).await
    }

    async fn write(&self, zones: &[Zone]) -> Result<()> {
        let json = serde_json::to_string_pretty(zones)?;
        write_atomic(&self.path, json.as_bytes(), 0o644)
            .await
            .map_err(|source| Error::Persistence {
                path: self.path.clone(),
                source,
            })
    }

    /// Adds `client` to `zone_name`, creating the zone when needed.
    ///
    /// `zone_name` must already be validated; the client MAC is canonicalized
    /// here.
    pub async fn add_member(&self, zone_name: &str, client: Client) -> Result<MembershipChange> {
        let client = Client {
            mac: canonical_mac(&client.mac),
            comment: client.comment,
        };

        let _guard = self.lock.lock().await;
        let mut zones = self.get_all().await?;

        let change = if let Some(zone) = zones.iter_mut().find(|z| z.name == zone_name) {
            if let Some(entry) = zone.clients.iter_mut().find(|c| equal_mac(&c.mac, &client.mac)) {
                if entry.comment == client.comment {
                    return Ok(MembershipChange::Unchanged);
                }
                entry.comment = client.comment;
                MembershipChange::CommentUpdated
            } else {
                zone.clients.push(client.clone());
                MembershipChange::Added
            }
        } else {
            zones.push(Zone {
                name: zone_name.to_string(),
                clients: vec![client.clone()],
            });
            MembershipChange::ZoneCreated
        };

        self.write(&zones).await?;
        info!(zone = zone_name, mac = %client.mac, ?change, "zone membership updated");
        Ok(change)
    }

    /// Removes `mac` from `zone_name`, dropping the zone if it becomes empty.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the zone or the member does not exist.
    pub async fn remove_member(&self, zone_name: &str, mac: &str) -> Result<MembershipChange> {
        let _guard = self.lock.lock().await;
        let mut zones = self.get_all().await?;

        let zone_idx = zones
            .iter()
            .position(|z| z.name == zone_name)
            .ok_or_else(|| Error::NotFound(format!("zone {zone_name}")))?;

        let zone = &mut zones[zone_idx];
        let client_idx = zone
            .clients
            .iter()
            .position(|c| equal_mac(&c.mac, mac))
            .ok_or_else(|| Error::NotFound(format!("{} in zone {zone_name}", canonical_mac(mac))))?;

        zone.clients.remove(client_idx);
        if zone.clients.is_empty() {
            zones.remove(zone_idx);
            info!(zone = zone_name, "zone removed after last member left");
        }

        self.write(&zones).await?;
        info!(zone = zone_name, mac = %canonical_mac(mac), "zone member removed");
        Ok(MembershipChange::Removed)
    }

    /// Rewrites the comment of `mac` in every zone where it differs.
    ///
    /// Returns the number of entries changed; the file is written once, and
    /// only when something changed.
    pub async fn update_comment(&self, mac: &str, comment: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut zones = self.get_all().await?;

        let mut updated = 0;
        for client in zones
            .iter_mut()
            .flat_map(|z| z.clients.iter_mut())
            .filter(|c| equal_mac(&c.mac, mac))
        {
            if client.comment != comment {
                client.comment = comment.to_string();
                updated += 1;
            }
        }

        if updated > 0 {
            self.write(&zones).await?;
        }
        Ok(updated)
    }
}
