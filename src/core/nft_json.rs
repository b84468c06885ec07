//! Decoder for `nft -j list map` output
//!
//! The listing is an envelope `{"nftables": [metainfo, {"map": {...}}]}`.
//! The map object carries an optional `elem` array whose items are
//! `[key, verdict]` pairs, with the key being a concatenation of two or three
//! string literals:
//!
//! ```json
//! {"nftables": [
//!   {"metainfo": {"json_schema_version": 1}},
//!   {"map": {"family": "inet", "table": "filter", "name": "lan_access",
//!            "type": ["ipv4_addr", "ifname", "ether_addr"], "map": "verdict",
//!            "elem": [[{"concat": ["10.0.0.5", "br-lan", "aa:bb:cc:dd:ee:02"]},
//!                      {"accept": null}]]}}
//! ]}
//! ```
//!
//! Which tuple field each literal fills depends on the key arity and the map:
//!
//! | literals | map                 | result                 |
//! |----------|---------------------|------------------------|
//! | 3        | any                 | `(ip, ifname, mac)`    |
//! | 2        | `dhcp_access`       | `("", ifname, mac)`    |
//! | 2        | `*_dst_access`      | `(ip, ifname, "")`     |
//!
//! Anything else is rejected per element; the remaining elements still decode.

use crate::core::error::{MapParseError, Result};
use serde::{Deserialize, Serialize};

/// Map keyed by `ifname . ether_addr`, maintained by the DHCP server
pub const DHCP_MAP: &str = "dhcp_access";

/// Suffix of the destination half of a custom zone
pub const DST_SUFFIX: &str = "_dst_access";

/// Suffix of the source half of a custom zone
pub const MAC_SRC_SUFFIX: &str = "_mac_src_access";

/// One element of a verdict map. Unused fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerdictMapEntry {
    #[serde(rename = "IP")]
    pub ipv4: String,
    pub ifname: String,
    pub mac: String,
}

impl VerdictMapEntry {
    pub fn new(ipv4: impl Into<String>, ifname: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            ipv4: ipv4.into(),
            ifname: ifname.into(),
            mac: mac.into(),
        }
    }

    /// Non-empty key fields in `(ip, ifname, mac)` order.
    pub fn key_fields(&self) -> Vec<&str> {
        [self.ipv4.as_str(), self.ifname.as_str(), self.mac.as_str()]
            .into_iter()
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// Result of decoding one map listing
#[derive(Debug, Default)]
pub struct ParsedMap {
    pub entries: Vec<VerdictMapEntry>,
    /// Elements that did not match the schema
    pub rejected: Vec<MapParseError>,
}

#[derive(Deserialize)]
struct Envelope {
    nftables: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct MapObjectWrapper {
    map: MapObject,
}

#[derive(Deserialize)]
struct MapObject {
    #[serde(default)]
    elem: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Element(ElementKey, #[allow(dead_code)] serde_json::Value);

#[derive(Deserialize)]
#[serde(untagged)]
enum ElementKey {
    Concat { concat: Vec<String> },
    /// Elements carrying a timeout or comment wrap their key
    Wrapped { elem: WrappedKey },
}

#[derive(Deserialize)]
struct WrappedKey {
    val: Box<ElementKey>,
}

impl ElementKey {
    fn into_literals(self) -> Vec<String> {
        match self {
            ElementKey::Concat { concat } => concat,
            ElementKey::Wrapped { elem } => elem.val.into_literals(),
        }
    }
}

/// Decodes the JSON listing of `map_name`.
///
/// # Errors
///
/// Returns `Err` when the envelope itself does not match the schema
/// (invalid JSON, no map object at position 1). Per-element problems are
/// collected in [`ParsedMap::rejected`] instead.
pub fn parse_map_listing(map_name: &str, json: &[u8]) -> Result<ParsedMap> {
    let envelope: Envelope = serde_json::from_slice(json)?;
    let map_value = envelope
        .nftables
        .into_iter()
        .nth(1)
        .ok_or(MapParseError::MissingMapObject)?;
    let wrapper: MapObjectWrapper =
        serde_json::from_value(map_value).map_err(|_| MapParseError::MissingMapObject)?;

    let mut parsed = ParsedMap::default();
    for (index, raw) in wrapper.map.elem.into_iter().enumerate() {
        match decode_element(map_name, index, raw) {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => parsed.rejected.push(e),
        }
    }

    Ok(parsed)
}

fn decode_element(
    map_name: &str,
    index: usize,
    raw: serde_json::Value,
) -> std::result::Result<VerdictMapEntry, MapParseError> {
    let Element(key, _verdict) =
        serde_json::from_value(raw).map_err(|e| MapParseError::Element {
            index,
            reason: e.to_string(),
        })?;

    entry_from_literals(map_name, key.into_literals()).map_err(|arity| {
        MapParseError::UnsupportedArity {
            index,
            arity,
            map: map_name.to_string(),
        }
    })
}

/// Applies the arity/map-name dispatch rule. `Err` carries the arity.
fn entry_from_literals(
    map_name: &str,
    literals: Vec<String>,
) -> std::result::Result<VerdictMapEntry, usize> {
    let arity = literals.len();
    let mut it = literals.into_iter();
    match (arity, it.next(), it.next(), it.next()) {
        (3, Some(ip), Some(ifname), Some(mac)) => Ok(VerdictMapEntry::new(ip, ifname, mac)),
        (2, Some(ifname), Some(mac), None) if map_name == DHCP_MAP => {
            Ok(VerdictMapEntry::new("", ifname, mac))
        }
        (2, Some(ip), Some(ifname), None) if map_name.ends_with(DST_SUFFIX) => {
            Ok(VerdictMapEntry::new(ip, ifname, ""))
        }
        _ => Err(arity),
    }
}
