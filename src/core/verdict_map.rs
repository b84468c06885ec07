//! Typed access to the kernel verdict maps in `inet filter`
//!
//! Builtin maps (`internet_access`, `dns_access`, `lan_access`) are keyed by
//! `ipv4_addr . ifname . ether_addr` and carry `accept`. Each custom zone is
//! backed by two maps:
//!
//! - `<zone>_dst_access` keyed by `ipv4_addr . ifname`, verdict `continue`
//! - `<zone>_mac_src_access` keyed by `ipv4_addr . ifname . ether_addr`,
//!   verdict `accept`
//!
//! joined by one FORWARD rule: a packet whose destination matches the first
//! map falls through to a lookup of its source identity in the second. A
//! packet enters a custom zone only when both halves match.

use crate::core::error::{Error, NftFailureKind, Result, parse_nft_errors};
use crate::core::nft_json::{
    DHCP_MAP, DST_SUFFIX, MAC_SRC_SUFFIX, VerdictMapEntry, parse_map_listing,
};
use crate::core::zones::{BuiltinZone, Zone};
use crate::tools::{ToolOutput, ToolRunner, argv};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_FAMILY: &str = "inet";
pub const TABLE_NAME: &str = "filter";
pub const FORWARD_CHAIN: &str = "FORWARD";

/// Builtin verdict maps, always synchronized
pub const BUILTIN_MAPS: [&str; 3] = ["internet_access", "dns_access", "lan_access"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    Accept,
    /// Only used by `_dst_access` maps to hand over to the source-half lookup
    Continue,
}

impl Verdict {
    /// Verdict carried by every element of `map_name`.
    pub fn for_map(map_name: &str) -> Self {
        if map_name.ends_with(DST_SUFFIX) {
            Verdict::Continue
        } else {
            Verdict::Accept
        }
    }
}

/// Names of the two maps backing a custom zone: `(dst, mac_src)`.
pub fn custom_zone_maps(zone: &str) -> (String, String) {
    (format!("{zone}{DST_SUFFIX}"), format!("{zone}{MAC_SRC_SUFFIX}"))
}

#[derive(Clone)]
pub struct VerdictMapClient {
    runner: Arc<dyn ToolRunner>,
    nft: String,
}

impl std::fmt::Debug for VerdictMapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictMapClient")
            .field("nft", &self.nft)
            .finish_non_exhaustive()
    }
}

impl VerdictMapClient {
    pub fn new(runner: Arc<dyn ToolRunner>, nft: impl Into<String>) -> Self {
        Self {
            runner,
            nft: nft.into(),
        }
    }

    /// Every map membership is synchronized into: the builtin maps plus the
    /// two derived maps of every non-default zone.
    pub fn map_names(zones: &[Zone]) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_MAPS.iter().map(ToString::to_string).collect();
        for zone in zones {
            if BuiltinZone::from_name(&zone.name).is_none() {
                let (dst, mac_src) = custom_zone_maps(&zone.name);
                names.push(mac_src);
                names.push(dst);
            }
        }
        names
    }

    async fn nft(&self, args: Vec<String>) -> Result<ToolOutput> {
        let output = self
            .runner
            .run(&self.nft, &args)
            .await
            .map_err(|e| Error::Tool {
                program: self.nft.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        if output.success {
            Ok(output)
        } else {
            let message = parse_nft_errors(&output.stderr)
                .into_iter()
                .next()
                .unwrap_or_else(|| format!("nft {} failed", args.join(" ")));
            Err(Error::Nftables {
                message,
                stderr: Some(output.stderr),
                exit_code: output.exit_code,
            })
        }
    }

    /// Raw JSON listing of one map, as printed by `nft -j list map`.
    pub async fn list_raw(&self, map_name: &str) -> Result<Vec<u8>> {
        let output = self
            .nft(argv(["-j", "list", "map", TABLE_FAMILY, TABLE_NAME, map_name]))
            .await?;
        Ok(output.stdout)
    }

    /// Decoded elements of one map.
    ///
    /// The map may legitimately not exist yet, so a failed listing is logged
    /// and yields an empty result. Elements that do not match the schema are
    /// logged individually and left out.
    pub async fn list_elements(&self, map_name: &str) -> Vec<VerdictMapEntry> {
        let raw = match self.list_raw(map_name).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(map = map_name, error = %e, "failed to list verdict map");
                return Vec::new();
            }
        };

        match parse_map_listing(map_name, &raw) {
            Ok(parsed) => {
                for rejected in &parsed.rejected {
                    warn!(map = map_name, error = %rejected, "skipping malformed map element");
                }
                parsed.entries
            }
            Err(e) => {
                warn!(map = map_name, error = %e, "unexpected verdict map listing");
                Vec::new()
            }
        }
    }

    fn element_args(
        op: &str,
        map_name: &str,
        entry: &VerdictMapEntry,
        verdict: Verdict,
    ) -> Vec<String> {
        let mut args = argv([op, "element", TABLE_FAMILY, TABLE_NAME, map_name, "{"]);
        for (i, field) in entry.key_fields().into_iter().enumerate() {
            if i > 0 {
                args.push(".".to_string());
            }
            args.push(field.to_string());
        }
        args.extend(argv([":", verdict.as_ref(), "}"]));
        args
    }

    pub async fn add_element(
        &self,
        map_name: &str,
        entry: &VerdictMapEntry,
        verdict: Verdict,
    ) -> Result<()> {
        self.nft(Self::element_args("add", map_name, entry, verdict))
            .await?;
        debug!(map = map_name, ?entry, %verdict, "added map element");
        Ok(())
    }

    pub async fn delete_element(
        &self,
        map_name: &str,
        entry: &VerdictMapEntry,
        verdict: Verdict,
    ) -> Result<()> {
        self.nft(Self::element_args("delete", map_name, entry, verdict))
            .await?;
        debug!(map = map_name, ?entry, %verdict, "deleted map element");
        Ok(())
    }

    /// Interface on which the DHCP server last admitted `mac`.
    pub async fn dhcp_interface_for(&self, mac: &str) -> Option<String> {
        self.list_elements(DHCP_MAP)
            .await
            .into_iter()
            .rev()
            .find(|e| crate::utils::equal_mac(&e.mac, mac))
            .map(|e| e.ifname)
    }

    /// Creates the two maps and the FORWARD rule of a custom zone if missing.
    ///
    /// `create map` on the destination half is the claim: it fails with
    /// "exists" for everyone but the first caller, so the rule is inserted
    /// exactly once even when two requests provision the same zone
    /// concurrently. If the rule cannot be inserted, the claim is released
    /// so the next attempt starts over.
    pub async fn ensure_custom_zone(&self, zone: &str) -> Result<()> {
        let (dst, mac_src) = custom_zone_maps(zone);

        // `add` is a no-op for an existing map
        self.nft(argv([
            "add", "map", TABLE_FAMILY, TABLE_NAME, &mac_src, "{", "type", "ipv4_addr", ".",
            "ifname", ".", "ether_addr", ":", "verdict", ";", "}",
        ]))
        .await?;

        match self
            .nft(argv([
                "create", "map", TABLE_FAMILY, TABLE_NAME, &dst, "{", "type", "ipv4_addr", ".",
                "ifname", ":", "verdict", ";", "}",
            ]))
            .await
        {
            Ok(_) => {}
            Err(e) if e.nft_failure_kind() == Some(NftFailureKind::AlreadyExists) => {
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let rule = self
            .nft(argv([
                "insert",
                "rule",
                TABLE_FAMILY,
                TABLE_NAME,
                FORWARD_CHAIN,
                "ip",
                "daddr",
                ".",
                "oifname",
                "vmap",
                &format!("@{dst}"),
                "ip",
                "saddr",
                ".",
                "iifname",
                ".",
                "ether",
                "saddr",
                "vmap",
                &format!("@{mac_src}"),
            ]))
            .await;

        if let Err(e) = rule {
            warn!(zone, error = %e, "forward rule insert failed, releasing zone maps");
            if let Err(e) = self
                .nft(argv(["delete", "map", TABLE_FAMILY, TABLE_NAME, &dst]))
                .await
            {
                warn!(zone, error = %e, "failed to release destination map");
            }
            return Err(e);
        }

        info!(zone, "provisioned custom zone maps");
        Ok(())
    }
}
