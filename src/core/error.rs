use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the control plane
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// nftables command execution failed
    #[error("nftables error: {message}")]
    Nftables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Any other external tool (ip, arp, hostapd_cli) failed
    #[error("{program} failed: {message}")]
    Tool { program: String, message: String },

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Requested zone, member, or map does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A store or credential file could not be written
    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The authenticator refused to reload its credential files
    #[error("Credential reload failed: {0}")]
    CredentialReload(String),

    /// nft list output did not match the expected schema
    #[error("Map parse error: {0}")]
    MapParse(#[from] MapParseError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Errors after which persisted state can no longer be trusted to match
    /// what the process believes. The daemon stops serving when it sees one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::CredentialReload(_))
    }

    /// Classification of an nft failure, `None` for non-nft errors.
    pub fn nft_failure_kind(&self) -> Option<NftFailureKind> {
        match self {
            Self::Nftables {
                message, stderr, ..
            } => Some(NftFailureKind::classify(
                stderr.as_deref().unwrap_or(message),
            )),
            _ => None,
        }
    }
}

/// Schema violations found while decoding `nft -j list map` output
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapParseError {
    #[error("missing map object at position 1 of nftables array")]
    MissingMapObject,

    #[error("element {index}: {reason}")]
    Element { index: usize, reason: String },

    #[error("element {index}: unsupported key of {arity} literal(s) for map {map}")]
    UnsupportedArity {
        index: usize,
        arity: usize,
        map: String,
    },
}

/// Coarse outcome categories of a failed nft invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NftFailureKind {
    /// Object (map, element) is already present
    AlreadyExists,
    /// Object (map, element) is not present
    Absent,
    Other,
}

impl NftFailureKind {
    /// Matches nft stderr against known netlink error texts.
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("file exists") || lower.contains("already exists") {
            return Self::AlreadyExists;
        }

        if lower.contains("no such file or directory") || lower.contains("does not exist") {
            return Self::Absent;
        }

        Self::Other
    }
}

/// Cleans nft stderr into individual messages.
///
/// Handles the JSON error format first, falling back to line-by-line output
/// with the common `Error: ` / `nft: ` prefixes removed.
pub fn parse_nft_errors(stderr: &str) -> Vec<String> {
    if let Ok(json_err) = serde_json::from_str::<serde_json::Value>(stderr)
        && let Some(errors) = json_err.get("errors").and_then(|e| e.as_array())
    {
        return errors
            .iter()
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .map(String::from)
            .collect();
    }

    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.trim_start_matches("Error: ")
                .trim_start_matches("nft: ")
                .to_string()
        })
        .collect()
}

pub type Result<T> = std::result::Result<T, Error>;
