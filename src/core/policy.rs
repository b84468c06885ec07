//! Verdict-map synchronization for leases and zone edits
//!
//! Applying a lease is a four step sequence run under one lock:
//!
//! 1. **Flush** every element of every synchronized map that refers to the
//!    lease's MAC or IP (and, on trunk interfaces, its interface).
//! 2. **Re-bind** the router endpoint address and a static ARP entry.
//! 3. **Repopulate** the maps of every zone the MAC belongs to.
//! 4. **Rewrite** the local DNS mapping for the device name.
//!
//! A zone edit re-runs steps 1 and 3 for the edited MAC using its current
//! ARP and `dhcp_access` state; offline devices are picked up by their next
//! lease instead. Leaving a custom zone is the exception: the MAC is evicted
//! from that zone's maps right away, since a deleted zone drops out of the
//! map set later leases flush.

use crate::audit::{AuditLog, EventType};
use crate::core::arp::ArpTable;
use crate::core::error::{Error, NftFailureKind, Result};
use crate::core::local_mappings::LocalMappings;
use crate::core::nft_json::VerdictMapEntry;
use crate::core::verdict_map::{Verdict, VerdictMapClient, custom_zone_maps};
use crate::core::zones::{BuiltinZone, ZoneStore};
use crate::tools::{ToolRunner, argv};
use crate::utils::equal_mac;
use crate::validators;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lease notification from the DHCP server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpUpdate {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Iface")]
    pub iface: String,
    #[serde(rename = "Router")]
    pub router: String,
}

/// A lease whose fields passed validation
#[derive(Debug, Clone)]
struct Lease {
    ip: String,
    mac: String,
    iface: String,
    router: Option<Ipv4Network>,
    hostname: String,
}

impl DhcpUpdate {
    fn validate(&self) -> Result<Lease> {
        let ip = validators::validate_ipv4(&self.ip).map_err(|e| Error::validation("IP", e))?;
        let mac = validators::validate_mac(&self.mac).map_err(|e| Error::validation("MAC", e))?;
        let iface = validators::validate_interface(&self.iface)
            .map_err(|e| Error::validation("Iface", e))?;

        let router = if self.router.trim().is_empty() {
            None
        } else {
            let addr = validators::validate_ipv4(&self.router)
                .map_err(|e| Error::validation("Router", e))?;
            Some(
                Ipv4Network::new(addr, 30)
                    .map_err(|e| Error::validation("Router", e.to_string()))?,
            )
        };

        Ok(Lease {
            ip: ip.to_string(),
            mac,
            iface,
            router,
            hostname: validators::sanitize_hostname(&self.name),
        })
    }
}

/// Result of a zone-triggered re-sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// No ARP entry or no `dhcp_access` element for the MAC
    DeviceOffline,
}

/// `ip` and `arp` invocations used to re-bind a lease
#[derive(Clone)]
pub struct NetTools {
    runner: Arc<dyn ToolRunner>,
    ip: String,
    arp: String,
}

impl std::fmt::Debug for NetTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetTools")
            .field("ip", &self.ip)
            .field("arp", &self.arp)
            .finish_non_exhaustive()
    }
}

impl NetTools {
    pub fn new(runner: Arc<dyn ToolRunner>, ip: impl Into<String>, arp: impl Into<String>) -> Self {
        Self {
            runner,
            ip: ip.into(),
            arp: arp.into(),
        }
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<()> {
        let output = self
            .runner
            .run(program, &args)
            .await
            .map_err(|e| Error::Tool {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        if output.success {
            Ok(())
        } else {
            Err(Error::Tool {
                program: program.to_string(),
                message: format!("{} -> {}", args.join(" "), output.stderr.trim()),
            })
        }
    }

    /// `ip addr add <router>/30 dev <iface>`
    pub async fn add_router_address(&self, router: &Ipv4Network, iface: &str) -> Result<()> {
        let cidr = router.to_string();
        self.run(&self.ip, argv(["addr", "add", cidr.as_str(), "dev", iface]))
            .await
    }

    /// `arp -i <iface> -s <ip> <mac>`
    pub async fn set_static_arp(&self, iface: &str, ip: &str, mac: &str) -> Result<()> {
        self.run(&self.arp, argv(["-i", iface, "-s", ip, mac])).await
    }

    /// `ip -j addr`
    pub async fn addresses_json(&self) -> Result<Vec<u8>> {
        let args = argv(["-j", "addr"]);
        let output = self
            .runner
            .run(&self.ip, &args)
            .await
            .map_err(|e| Error::Tool {
                program: self.ip.clone(),
                message: e.to_string(),
            })?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::Tool {
                program: self.ip.clone(),
                message: output.stderr.trim().to_string(),
            })
        }
    }
}

pub struct PolicySynchronizer {
    zones: Arc<ZoneStore>,
    maps: VerdictMapClient,
    net: NetTools,
    arp: ArpTable,
    dns: LocalMappings,
    trunk_interfaces: Vec<String>,
    audit: AuditLog,
    lock: Mutex<()>,
}

impl PolicySynchronizer {
    pub fn new(
        zones: Arc<ZoneStore>,
        maps: VerdictMapClient,
        net: NetTools,
        arp: ArpTable,
        dns: LocalMappings,
    ) -> Self {
        Self {
            zones,
            maps,
            net,
            arp,
            dns,
            trunk_interfaces: Vec::new(),
            audit: AuditLog::disabled(),
            lock: Mutex::new(()),
        }
    }

    /// Interface name patterns treated as shared trunk/VLAN ports. An
    /// interface matches when its name contains a pattern.
    pub fn with_trunk_interfaces(mut self, patterns: Vec<String>) -> Self {
        self.trunk_interfaces = patterns.into_iter().filter(|p| !p.is_empty()).collect();
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn maps(&self) -> &VerdictMapClient {
        &self.maps
    }

    pub fn net(&self) -> &NetTools {
        &self.net
    }

    pub fn arp(&self) -> &ArpTable {
        &self.arp
    }

    fn is_trunk(&self, iface: &str) -> bool {
        self.trunk_interfaces.iter().any(|p| iface.contains(p.as_str()))
    }

    /// Applies a DHCP lease grant.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for malformed fields (nothing is touched), or an
    /// error reading the zone store. Tool failures during the sequence are
    /// logged and do not fail the call.
    pub async fn handle_dhcp_update(&self, update: &DhcpUpdate) -> Result<()> {
        let lease = update.validate()?;
        let _guard = self.lock.lock().await;

        info!(ip = %lease.ip, mac = %lease.mac, iface = %lease.iface, "applying lease");

        let result = self.apply_lease(&lease).await;
        self.audit
            .record(
                EventType::DhcpUpdate,
                result.is_ok(),
                serde_json::json!({
                    "ip": lease.ip,
                    "mac": lease.mac,
                    "iface": lease.iface,
                    "name": lease.hostname,
                }),
                result.as_ref().err().map(ToString::to_string),
            )
            .await;
        result
    }

    async fn apply_lease(&self, lease: &Lease) -> Result<()> {
        let zones = self.zones.get_all().await?;
        let map_names = VerdictMapClient::map_names(&zones);
        self.flush(&lease.ip, &lease.mac, &lease.iface, &map_names)
            .await;

        if let Some(router) = &lease.router
            && let Err(e) = self.net.add_router_address(router, &lease.iface).await
        {
            warn!(iface = %lease.iface, %router, error = %e, "failed to add router address");
        }
        if let Err(e) = self
            .net
            .set_static_arp(&lease.iface, &lease.ip, &lease.mac)
            .await
        {
            warn!(ip = %lease.ip, mac = %lease.mac, error = %e, "static arp failed, relying on dynamic resolution");
        }

        self.repopulate(&lease.ip, &lease.mac, &lease.iface).await?;

        if lease.hostname.is_empty() {
            debug!(ip = %lease.ip, "lease carries no usable host name, DNS mapping unchanged");
        } else if let Err(e) = self.dns.upsert(&lease.ip, &lease.hostname).await {
            warn!(ip = %lease.ip, error = %e, "failed to update local DNS mapping");
        }

        Ok(())
    }

    /// Re-synchronizes `mac` after a membership change in `zone_name`.
    ///
    /// Leaving a custom zone evicts `mac` from that zone's maps even when the
    /// device is offline or the zone was deleted with its last member.
    pub async fn refresh_member(&self, mac: &str, zone_name: &str) -> Result<RefreshOutcome> {
        let _guard = self.lock.lock().await;

        if BuiltinZone::from_name(zone_name).is_none()
            && !self
                .zones
                .zones_for(mac)
                .await?
                .iter()
                .any(|z| z.name == zone_name)
        {
            self.evict_from_custom_zone(zone_name, mac).await;
        }

        let ip = match self.arp.find_by_mac(mac).await {
            Ok(Some(entry)) => entry.ip,
            Ok(None) => {
                info!(mac, "no arp entry, skipping refresh until next lease");
                return Ok(RefreshOutcome::DeviceOffline);
            }
            Err(e) => {
                warn!(mac, error = %e, "arp table unreadable, skipping refresh");
                return Ok(RefreshOutcome::DeviceOffline);
            }
        };

        let Some(iface) = self.maps.dhcp_interface_for(mac).await else {
            info!(mac, "no dhcp_access element, skipping refresh until next lease");
            return Ok(RefreshOutcome::DeviceOffline);
        };

        let zones = self.zones.get_all().await?;
        let mut map_names = VerdictMapClient::map_names(&zones);
        if BuiltinZone::from_name(zone_name).is_none() {
            let (dst, mac_src) = custom_zone_maps(zone_name);
            for name in [mac_src, dst] {
                if !map_names.contains(&name) {
                    map_names.push(name);
                }
            }
        }

        self.flush(&ip, mac, &iface, &map_names).await;
        self.repopulate(&ip, mac, &iface).await?;

        self.audit
            .record(
                EventType::MemberRefreshed,
                true,
                serde_json::json!({ "mac": mac, "ip": ip, "iface": iface, "zone": zone_name }),
                None,
            )
            .await;
        Ok(RefreshOutcome::Applied)
    }

    /// Deletes every element matching `ip`, `mac`, or (on trunk interfaces)
    /// `iface` from each of `map_names`.
    ///
    /// The first unexpected delete failure stops work on that map; the other
    /// maps are still flushed.
    async fn flush(&self, ip: &str, mac: &str, iface: &str, map_names: &[String]) {
        let match_iface = self.is_trunk(iface);

        for name in map_names {
            let verdict = Verdict::for_map(name);
            for entry in self.maps.list_elements(name).await {
                let hit = (!ip.is_empty() && entry.ipv4 == ip)
                    || (match_iface && entry.ifname == iface)
                    || (!mac.is_empty() && equal_mac(&entry.mac, mac));
                if !hit {
                    continue;
                }

                if !self.remove(name, &entry, verdict).await {
                    warn!(map = %name, "abandoning flush of this map");
                    break;
                }
            }
        }
    }

    /// Clears `mac` out of a custom zone it no longer belongs to.
    ///
    /// Needs no ARP entry: the addresses come from the zone's own
    /// `_mac_src_access` elements, which also locate the `_dst_access`
    /// elements to drop.
    async fn evict_from_custom_zone(&self, zone_name: &str, mac: &str) {
        let (dst, mac_src) = custom_zone_maps(zone_name);

        let mut bindings = Vec::new();
        for entry in self.maps.list_elements(&mac_src).await {
            if !equal_mac(&entry.mac, mac) {
                continue;
            }
            bindings.push((entry.ipv4.clone(), entry.ifname.clone()));
            self.remove(&mac_src, &entry, Verdict::for_map(&mac_src))
                .await;
        }
        if bindings.is_empty() {
            return;
        }

        for entry in self.maps.list_elements(&dst).await {
            if bindings
                .iter()
                .any(|(ip, ifname)| entry.ipv4 == *ip && entry.ifname == *ifname)
            {
                self.remove(&dst, &entry, Verdict::for_map(&dst)).await;
            }
        }
        info!(zone = zone_name, mac, "evicted from custom zone maps");
    }

    /// Deletes one element. Returns `false` on any failure other than the
    /// element already being gone.
    async fn remove(&self, map: &str, entry: &VerdictMapEntry, verdict: Verdict) -> bool {
        match self.maps.delete_element(map, entry, verdict).await {
            Ok(()) => true,
            Err(e) if e.nft_failure_kind() == Some(NftFailureKind::Absent) => {
                debug!(map, ?entry, "element already gone");
                true
            }
            Err(e) => {
                warn!(map, ?entry, error = %e, "delete failed");
                false
            }
        }
    }

    /// Adds `mac` to the maps of every zone it belongs to.
    async fn repopulate(&self, ip: &str, mac: &str, iface: &str) -> Result<()> {
        for zone in self.zones.zones_for(mac).await? {
            match BuiltinZone::from_name(&zone.name) {
                Some(BuiltinZone::Isolated) => {}
                Some(builtin) => {
                    if let Some(map) = builtin.verdict_map() {
                        self.add(map, VerdictMapEntry::new(ip, iface, mac)).await;
                    }
                }
                None => {
                    if let Err(e) = self.maps.ensure_custom_zone(&zone.name).await {
                        warn!(zone = %zone.name, error = %e, "custom zone not provisioned");
                        continue;
                    }
                    let (dst, mac_src) = custom_zone_maps(&zone.name);
                    self.add(&dst, VerdictMapEntry::new(ip, iface, "")).await;
                    self.add(&mac_src, VerdictMapEntry::new(ip, iface, mac)).await;
                }
            }
        }
        Ok(())
    }

    async fn add(&self, map: &str, entry: VerdictMapEntry) {
        if let Err(e) = self
            .maps
            .add_element(map, &entry, Verdict::for_map(map))
            .await
        {
            warn!(map, ?entry, error = %e, "failed to add map element");
        }
    }
}

impl std::fmt::Debug for PolicySynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySynchronizer")
            .field("maps", &self.maps)
            .field("trunk_interfaces", &self.trunk_interfaces)
            .finish_non_exhaustive()
    }
}
