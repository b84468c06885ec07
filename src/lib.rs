//! Zonewarden - zone firewall and WiFi credential control plane
//!
//! Translates zone membership, DHCP lease grants and WiFi authentication
//! reports into nftables verdict-map elements, local DNS records and
//! authenticator credential files.
//!
//! # Architecture
//!
//! - [`core`] - Stores, verdict-map client, policy synchronization, PSK coordination
//! - [`api`] - Public HTTP API and the two trusted control-socket routers
//! - [`daemon`] - Service construction and listener lifecycle
//! - [`tools`] - External program execution (`nft`, `ip`, `arp`, `hostapd_cli`)
//! - [`audit`] - JSON-lines audit trail of state changes
//! - [`validators`] - Input validation and sanitization
//! - [`config`] - Configuration file and environment overrides
//! - [`utils`] - MAC canonicalization and atomic file writes
//!
//! # Safety Features
//!
//! - Store files replaced atomically (temp file + rename)
//! - Persistence and credential reload failures stop the daemon
//! - Every value interpolated into an external command is validated first
//! - Tools run without a shell

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod audit;
pub mod config;
pub mod core;
pub mod daemon;
pub mod tools;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::zones::{Client, Zone, ZoneStore};
