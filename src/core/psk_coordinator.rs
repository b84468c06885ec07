//! Pending PSK assignment and credential file generation
//!
//! A credential set without a MAC waits in the pending slot. The first
//! station that either fails authentication with "no entry" or connects
//! without a MAC-specific entry claims it: the credential is re-keyed under
//! that station's MAC and the slot is emptied. Both claim paths, like every
//! other PSK mutation, hold the store lock across the file write, credential
//! regeneration and authenticator reload, so exactly one report wins.

use crate::audit::{AuditLog, EventType};
use crate::core::error::{Error, Result};
use crate::core::hostapd::Hostapd;
use crate::core::psk::{CredentialFiles, PskBook, PskEntry, PskStore, PskTransaction, PskType};
use crate::utils::{canonical_mac, write_atomic};
use crate::validators;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Placeholder returned instead of a caller-supplied PSK
pub const MASKED_PSK: &str = "***";

/// Status reported when a pending credential was bound to a station
pub const CLAIMED_STATUS: &str = "Installed pending PSK";

/// Authenticator event that signals a completed association
pub const STA_CONNECTED_EVENT: &str = "AP-STA-CONNECTED";

/// Body of a set/delete credential request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CredentialRequest {
    #[serde(rename = "Type")]
    pub psk_type: String,
    pub mac: String,
    pub psk: String,
    pub comment: String,
}

/// Authentication failure reported by the authenticator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthFailureReport {
    #[serde(rename = "Type")]
    pub auth_type: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Station event reported by the authenticator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSuccessReport {
    #[serde(rename = "Iface")]
    pub iface: String,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Destinations of the rendered credential files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialPaths {
    pub sae_passwords: PathBuf,
    pub wpa2_pskfile: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        Self {
            sae_passwords: PathBuf::from("/configs/wifi/sae_passwords"),
            wpa2_pskfile: PathBuf::from("/configs/wifi/wpa2pskfile"),
        }
    }
}

/// 16 random bytes, URL-safe base64 without padding (22 characters).
pub fn generate_psk() -> String {
    let bytes: [u8; 16] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug)]
pub struct PskCoordinator {
    store: Arc<PskStore>,
    files: CredentialPaths,
    hostapd: Hostapd,
    audit: AuditLog,
}

impl PskCoordinator {
    pub fn new(store: Arc<PskStore>, files: CredentialPaths, hostapd: Hostapd) -> Self {
        Self {
            store,
            files,
            hostapd,
            audit: AuditLog::disabled(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &PskStore {
        &self.store
    }

    pub async fn has_pending(&self) -> Result<bool> {
        Ok(self.store.load().await?.pending.is_some())
    }

    /// Stores a credential for `req.mac`, or in the pending slot when the MAC
    /// is empty, generating the PSK when none is given.
    ///
    /// The returned entry carries the PSK in clear only if it was generated.
    pub async fn set_credential(&self, req: CredentialRequest) -> Result<PskEntry> {
        let psk_type: PskType = req
            .psk_type
            .parse()
            .map_err(|_| Error::validation("Type", "must be sae or wpa2"))?;
        validators::validate_psk(&req.psk).map_err(|e| Error::validation("Psk", e))?;
        let mac = if req.mac.trim().is_empty() {
            String::new()
        } else {
            validators::validate_mac(&req.mac).map_err(|e| Error::validation("Mac", e))?
        };

        let generated = req.psk.is_empty();
        let entry = PskEntry {
            psk_type,
            mac: mac.clone(),
            psk: if generated { generate_psk() } else { req.psk },
            comment: validators::sanitize_comment(&req.comment),
        };

        let txn = self.store.begin().await;
        let mut book = txn.load().await?;
        if mac.is_empty() {
            if book.pending.is_some() {
                info!("replacing previous pending credential");
            }
            book.pending = Some(entry.clone());
        } else {
            book.insert(entry.clone());
        }
        txn.save(&book).await?;
        self.regenerate(&txn, &book).await?;
        drop(txn);

        info!(mac = %mac, %psk_type, generated, "credential stored");
        self.audit
            .record(
                EventType::PskAssigned,
                true,
                serde_json::json!({ "mac": mac, "type": psk_type, "generated": generated }),
                None,
            )
            .await;

        let mut response = entry;
        if !generated {
            response.psk = MASKED_PSK.to_string();
        }
        Ok(response)
    }

    /// Removes the credential of `mac`; an empty MAC clears the pending slot.
    /// Returns whether anything was removed.
    pub async fn delete_credential(&self, mac: &str) -> Result<bool> {
        let txn = self.store.begin().await;
        let mut book = txn.load().await?;

        let removed = if mac.trim().is_empty() {
            book.pending.take().is_some()
        } else {
            book.remove(mac).is_some()
        };

        txn.save(&book).await?;
        self.regenerate(&txn, &book).await?;
        drop(txn);

        self.audit
            .record(
                EventType::PskDeleted,
                true,
                serde_json::json!({ "mac": canonical_mac(mac), "removed": removed }),
                None,
            )
            .await;
        Ok(removed)
    }

    /// Handles an authentication failure report.
    ///
    /// A `noentry` failure while a credential is pending binds that
    /// credential to the reporting MAC, typed by the attempted method.
    pub async fn on_auth_failure(&self, mut report: AuthFailureReport) -> Result<AuthFailureReport> {
        let mac = validators::validate_mac(&report.mac).map_err(|e| Error::validation("MAC", e))?;
        let auth_type = match report.auth_type.as_str() {
            "sae" | "wpa" => PskType::from_auth_report(&report.auth_type),
            _ => None,
        }
        .ok_or_else(|| Error::validation("Type", "must be sae or wpa"))?;
        if !matches!(report.reason.as_str(), "noentry" | "mismatch") {
            return Err(Error::validation("Reason", "must be noentry or mismatch"));
        }

        if report.reason != "noentry" {
            return Ok(report);
        }

        let txn = self.store.begin().await;
        let mut book = txn.load().await?;
        let Some(pending_type) = book.pending.as_ref().map(|p| p.psk_type) else {
            return Ok(report);
        };
        if pending_type != auth_type {
            warn!(%mac, attempted = %auth_type, pending = %pending_type, "auth type differs from pending credential");
        }

        self.claim(&txn, &mut book, &mac, Some(auth_type)).await?;
        drop(txn);

        report.status = CLAIMED_STATUS.to_string();
        Ok(report)
    }

    /// Handles a station event.
    ///
    /// On `AP-STA-CONNECTED` from a MAC without its own credential, a
    /// pending credential is bound to it. Other events are acknowledged
    /// without effect.
    pub async fn on_auth_success(&self, mut report: AuthSuccessReport) -> Result<AuthSuccessReport> {
        if report.iface.trim().is_empty() {
            return Err(Error::validation("Iface", "required"));
        }
        if report.event.trim().is_empty() {
            return Err(Error::validation("Event", "required"));
        }
        let mac = validators::validate_mac(&report.mac).map_err(|e| Error::validation("MAC", e))?;

        if report.event != STA_CONNECTED_EVENT {
            report.status = "Ignored".to_string();
            return Ok(report);
        }
        report.status = "Okay".to_string();

        let txn = self.store.begin().await;
        let mut book = txn.load().await?;
        if book.pending.is_none() || book.contains(&mac) {
            return Ok(report);
        }

        self.claim(&txn, &mut book, &mac, None).await?;
        drop(txn);

        report.status = CLAIMED_STATUS.to_string();
        Ok(report)
    }

    async fn claim(
        &self,
        txn: &PskTransaction<'_>,
        book: &mut PskBook,
        mac: &str,
        psk_type: Option<PskType>,
    ) -> Result<()> {
        let Some(entry) = book.claim_pending(mac, psk_type) else {
            return Ok(());
        };
        txn.save(book).await?;
        self.regenerate(txn, book).await?;

        info!(mac, psk_type = %entry.psk_type, "pending credential claimed");
        self.audit
            .record(
                EventType::PendingPskClaimed,
                true,
                serde_json::json!({ "mac": mac, "type": entry.psk_type }),
                None,
            )
            .await;
        Ok(())
    }

    /// Rewrites both credential files from the store and reloads the
    /// authenticator.
    pub async fn reload_credentials(&self) -> Result<()> {
        let txn = self.store.begin().await;
        let book = txn.load().await?;
        self.regenerate(&txn, &book).await
    }

    /// Caller must hold the store lock, witnessed by `_txn`.
    async fn regenerate(&self, _txn: &PskTransaction<'_>, book: &PskBook) -> Result<()> {
        let files = CredentialFiles::render(book);

        for (path, contents) in [
            (&self.files.sae_passwords, &files.sae),
            (&self.files.wpa2_pskfile, &files.wpa2),
        ] {
            write_atomic(path, contents.as_bytes(), 0o600)
                .await
                .map_err(|source| Error::Persistence {
                    path: path.clone(),
                    source,
                })?;
        }

        let result = self.hostapd.reload_psk().await;
        self.audit
            .record(
                EventType::CredentialsReloaded,
                result.is_ok(),
                serde_json::json!({
                    "entries": book.entries.len(),
                    "pending": book.pending.is_some(),
                }),
                result.as_ref().err().map(ToString::to_string),
            )
            .await;
        result
    }

    /// Reads the credential files currently on disk.
    pub async fn read_credential_files(&self) -> Result<CredentialFiles> {
        let read = |path: PathBuf| async move {
            crate::utils::read_optional(&path)
                .await
                .map(Option::unwrap_or_default)
        };
        Ok(CredentialFiles {
            sae: read(self.files.sae_passwords.clone()).await?,
            wpa2: read(self.files.wpa2_pskfile.clone()).await?,
        })
    }
}
