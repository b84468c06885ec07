//! Shared helpers: MAC/string canonicalization and atomic file writes
//!
//! Every MAC address that crosses an external boundary (HTTP body, control
//! socket, nft output, ARP table) goes through [`canonical_mac`] before it is
//! compared or stored. Comparisons canonicalize both sides via [`equal_mac`],
//! so values that differ only in case or surrounding whitespace are treated
//! as the same device.
//!
//! # Example
//!
//! ```
//! use zonewarden::utils::{canonical_mac, equal_mac};
//!
//! assert_eq!(canonical_mac(" AA:BB:CC:DD:EE:01 "), "aa:bb:cc:dd:ee:01");
//! assert!(equal_mac("aa:bb:cc:dd:ee:01", "AA:BB:CC:DD:EE:01\n"));
//! ```

use std::path::Path;

/// Trims surrounding whitespace and lower-cases.
pub fn trim_lower(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Canonical form of a MAC address (trimmed, lower-case).
pub fn canonical_mac(mac: &str) -> String {
    trim_lower(mac)
}

/// Compares two MAC addresses after canonicalizing both sides.
pub fn equal_mac(a: &str, b: &str) -> bool {
    canonical_mac(a) == canonical_mac(b)
}

/// Writes `contents` to `path` using an atomic write pattern.
/// 1. Writes to a sibling temporary file with `mode` set before any data lands.
/// 2. Flushes it to disk.
/// 3. Atomically renames it over the target path.
///
/// Readers therefore see either the previous or the new file, never a torn one.
pub async fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut temp_name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(mode)
        .open(&temp_path)
        .await?;

    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("Disk full: cannot write {}", path.display()),
            )
        } else {
            e
        }
    })
}

/// Reads a file, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
