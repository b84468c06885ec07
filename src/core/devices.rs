//! Per-device view joined from zone membership and credentials

use crate::core::psk::PskBook;
use crate::core::zones::Zone;
use crate::utils::canonical_mac;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    pub mac: String,
    /// `sae`, `wpa2`, or empty when the device has no credential
    pub psk_type: String,
    pub comment: String,
    pub zones: Vec<String>,
}

/// Devices keyed by canonical MAC.
///
/// The comment comes from the first zone listing the device, or from its
/// credential when it is in no zone. The pending credential has no MAC and
/// is not a device.
pub fn build_devices(zones: &[Zone], psks: &PskBook) -> BTreeMap<String, Device> {
    let mut devices: BTreeMap<String, Device> = BTreeMap::new();

    for zone in zones {
        for client in &zone.clients {
            let mac = canonical_mac(&client.mac);
            devices
                .entry(mac.clone())
                .and_modify(|d| d.zones.push(zone.name.clone()))
                .or_insert_with(|| Device {
                    psk_type: psks
                        .get(&mac)
                        .map(|e| e.psk_type.to_string())
                        .unwrap_or_default(),
                    mac,
                    comment: client.comment.clone(),
                    zones: vec![zone.name.clone()],
                });
        }
    }

    for entry in psks.entries.values() {
        let mac = canonical_mac(&entry.mac);
        devices.entry(mac.clone()).or_insert_with(|| Device {
            mac,
            psk_type: entry.psk_type.to_string(),
            comment: entry.comment.clone(),
            zones: Vec::new(),
        });
    }

    devices
}
