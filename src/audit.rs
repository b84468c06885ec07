/// Audit logging for state-changing control-plane operations
///
/// Every lease applied, zone edit, and credential change is appended to a
/// JSON-lines file. Audit failures never abort the operation being audited.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DhcpUpdate,
    MemberRefreshed,
    ZoneMemberAdded,
    ZoneMemberRemoved,
    DeviceUpdated,
    PskAssigned,
    PskDeleted,
    PendingPskClaimed,
    CredentialsReloaded,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub event_type: EventType,

    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer. A log without a path discards events.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    log_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(log_path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Appends an event to the audit log
    ///
    /// Events are written as JSON-lines format (one JSON object per line)
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: &AuditEvent) -> std::io::Result<()> {
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        let json = serde_json::to_string(event)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Builds and writes an event, logging (not returning) write failures.
    pub async fn record(
        &self,
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) {
        let event = AuditEvent::new(event_type, success, details, error);
        if let Err(e) = self.log(&event).await {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read
    #[cfg(test)]
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let Some(path) = &self.log_path else {
            return Ok(Vec::new());
        };
        let content = tokio::fs::read_to_string(path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        Ok(events)
    }
}
