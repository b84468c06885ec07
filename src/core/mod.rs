//! Core control-plane logic
//!
//! - [`zones`]: persisted device-to-zone membership
//! - [`psk`]: persisted WiFi credentials and credential file rendering
//! - [`nft_json`]: schema-checked decoding of `nft -j list map`
//! - [`verdict_map`]: typed verdict map operations and custom zone provisioning
//! - [`policy`]: lease and zone-edit synchronization of the verdict maps
//! - [`psk_coordinator`]: pending credential assignment and authenticator reload
//! - [`devices`]: merged zone and credential view per MAC
//! - [`hostapd`], [`arp`], [`local_mappings`]: collaborators
//! - [`error`]: error types

pub mod arp;
pub mod devices;
pub mod error;
pub mod hostapd;
pub mod local_mappings;
pub mod nft_json;
pub mod policy;
pub mod psk;
pub mod psk_coordinator;
pub mod verdict_map;
pub mod zones;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
