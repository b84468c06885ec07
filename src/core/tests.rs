//! Cross-module scenarios: lease handling, zone-edit re-sync, custom zone
//! provisioning and pending credential assignment, all against [`FakeNet`].

use crate::core::error::Error;
use crate::core::policy::{DhcpUpdate, RefreshOutcome};
use crate::core::psk::{CredentialFiles, PskType};
use crate::core::psk_coordinator::{
    AuthFailureReport, AuthSuccessReport, CLAIMED_STATUS, CredentialRequest, MASKED_PSK,
};
use crate::core::test_helpers::{FakeNet, Fixture};
use crate::core::zones::{Client, MembershipChange};
use std::collections::BTreeSet;

const MAC: &str = "AA:BB:CC:DD:EE:02";
const MAC_LC: &str = "aa:bb:cc:dd:ee:02";

fn client(mac: &str) -> Client {
    Client {
        mac: mac.to_string(),
        comment: String::new(),
    }
}

fn lease(ip: &str, mac: &str, iface: &str) -> DhcpUpdate {
    DhcpUpdate {
        ip: ip.to_string(),
        mac: mac.to_string(),
        name: "laptop".to_string(),
        iface: iface.to_string(),
        router: "10.0.0.6".to_string(),
    }
}

fn credential(psk_type: &str, mac: &str, psk: &str) -> CredentialRequest {
    CredentialRequest {
        psk_type: psk_type.to_string(),
        mac: mac.to_string(),
        psk: psk.to_string(),
        comment: String::new(),
    }
}

fn failure(auth_type: &str, mac: &str, reason: &str) -> AuthFailureReport {
    AuthFailureReport {
        auth_type: auth_type.to_string(),
        mac: mac.to_string(),
        reason: reason.to_string(),
        status: String::new(),
    }
}

fn connected(mac: &str) -> AuthSuccessReport {
    AuthSuccessReport {
        iface: "wlan0".to_string(),
        event: "AP-STA-CONNECTED".to_string(),
        mac: mac.to_string(),
        status: String::new(),
    }
}

/// Device in `lan` and `guests` with an applied lease on br-lan.
async fn lan_and_guests_fixture() -> Fixture {
    let fx = Fixture::new();
    let zones = &fx.services.zones;
    zones.add_member("lan", client(MAC)).await.unwrap();
    zones.add_member("guests", client(MAC)).await.unwrap();

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "br-lan"))
        .await
        .unwrap();
    fx
}

// ═══════════════════════════════════════════════════════════════════════════
// Lease handling
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_lease_populates_builtin_and_custom_maps() {
    let fx = lan_and_guests_fixture().await;

    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.5 . br-lan . aa:bb:cc:dd:ee:02 : accept"]
    );
    assert_eq!(
        fx.net.elements("guests_dst_access"),
        vec!["10.0.0.5 . br-lan : continue"]
    );
    assert_eq!(
        fx.net.elements("guests_mac_src_access"),
        vec!["10.0.0.5 . br-lan . aa:bb:cc:dd:ee:02 : accept"]
    );
    assert!(fx.net.elements("internet_access").is_empty());

    let rules = fx.net.rules();
    assert_eq!(rules.len(), 1);
    assert!(rules[0].contains("vmap @guests_dst_access"));
    assert!(rules[0].contains("vmap @guests_mac_src_access"));
}

#[tokio::test]
async fn test_lease_rebinds_address_and_arp() {
    let fx = lan_and_guests_fixture().await;

    assert_eq!(
        fx.net.calls_to("ip"),
        vec![vec!["addr", "add", "10.0.0.6/30", "dev", "br-lan"]]
    );
    assert_eq!(
        fx.net.calls_to("arp"),
        vec![vec!["-i", "br-lan", "-s", "10.0.0.5", MAC_LC]]
    );
}

#[tokio::test]
async fn test_lease_without_router_skips_address() {
    let fx = Fixture::new();
    let mut update = lease("10.0.0.5", MAC, "br-lan");
    update.router = String::new();

    fx.services.policy.handle_dhcp_update(&update).await.unwrap();

    assert!(fx.net.calls_to("ip").is_empty());
    assert_eq!(fx.net.calls_to("arp").len(), 1);
}

#[tokio::test]
async fn test_lease_rewrites_dns_mapping() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.config.paths.local_mappings.parent().unwrap()).unwrap();
    std::fs::write(
        &fx.config.paths.local_mappings,
        "10.0.0.5 oldhost.lan\n10.0.0.9 laptop.lan\n10.0.0.7 tv.lan\n",
    )
    .unwrap();

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "br-lan"))
        .await
        .unwrap();

    assert_eq!(
        fx.read(&fx.config.paths.local_mappings),
        "10.0.0.7 tv.lan\n10.0.0.5 laptop.lan\n"
    );
}

#[tokio::test]
async fn test_lease_keeps_dotted_host_name_labels() {
    let fx = Fixture::new();
    let mut update = lease("10.0.0.5", MAC, "br-lan");
    update.name = "Printer.Local".to_string();

    fx.services.policy.handle_dhcp_update(&update).await.unwrap();

    assert_eq!(
        fx.read(&fx.config.paths.local_mappings),
        "10.0.0.5 printer.local.lan\n"
    );
}

#[tokio::test]
async fn test_lease_flushes_stale_elements_by_mac_and_ip() {
    let fx = Fixture::new();
    fx.services.zones.add_member("wan", client(MAC)).await.unwrap();
    fx.net
        .insert_element("lan_access", &["10.0.0.4", "br-lan", MAC_LC], "accept");
    fx.net.insert_element(
        "lan_access",
        &["10.0.0.5", "br-lan", "aa:bb:cc:dd:ee:77"],
        "accept",
    );
    fx.net.insert_element(
        "lan_access",
        &["10.0.0.8", "br-lan", "aa:bb:cc:dd:ee:08"],
        "accept",
    );

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "br-lan"))
        .await
        .unwrap();

    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.8 . br-lan . aa:bb:cc:dd:ee:08 : accept"]
    );
    assert_eq!(
        fx.net.elements("internet_access"),
        vec!["10.0.0.5 . br-lan . aa:bb:cc:dd:ee:02 : accept"]
    );
}

#[tokio::test]
async fn test_isolated_zone_never_gets_elements() {
    let fx = Fixture::new();
    fx.services
        .zones
        .add_member("isolated", client(MAC))
        .await
        .unwrap();

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "br-lan"))
        .await
        .unwrap();

    for map in ["internet_access", "dns_access", "lan_access"] {
        assert!(fx.net.elements(map).is_empty(), "{map} should be empty");
    }
}

#[tokio::test]
async fn test_trunk_interface_flushes_other_macs() {
    let fx = Fixture::with_config(|c| c.trunk_interfaces = vec!["vlan".to_string()]);
    fx.net.insert_element(
        "lan_access",
        &["10.0.0.40", "vlan5", "aa:bb:cc:dd:ee:40"],
        "accept",
    );
    fx.net.insert_element(
        "lan_access",
        &["10.0.0.41", "br-lan", "aa:bb:cc:dd:ee:41"],
        "accept",
    );

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "vlan5"))
        .await
        .unwrap();

    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.41 . br-lan . aa:bb:cc:dd:ee:41 : accept"]
    );
}

#[tokio::test]
async fn test_non_trunk_interface_keeps_other_macs() {
    let fx = Fixture::new();
    fx.net.insert_element(
        "lan_access",
        &["10.0.0.40", "vlan5", "aa:bb:cc:dd:ee:40"],
        "accept",
    );

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "vlan5"))
        .await
        .unwrap();

    assert_eq!(fx.net.elements("lan_access").len(), 1);
}

#[tokio::test]
async fn test_delete_failure_abandons_only_that_map() {
    let fx = Fixture::new();
    fx.net
        .insert_element("lan_access", &["10.0.0.3", "br-lan", MAC_LC], "accept");
    fx.net
        .insert_element("lan_access", &["10.0.0.4", "br-lan", MAC_LC], "accept");
    fx.net
        .insert_element("dns_access", &["10.0.0.4", "br-lan", MAC_LC], "accept");
    fx.net.fail_deletes_in("lan_access");

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", MAC, "br-lan"))
        .await
        .unwrap();

    assert_eq!(fx.net.elements("lan_access").len(), 2);
    assert!(fx.net.elements("dns_access").is_empty());

    let lan_deletes = fx
        .net
        .calls_to("nft")
        .into_iter()
        .filter(|args| args[0] == "delete" && args[4] == "lan_access")
        .count();
    assert_eq!(lan_deletes, 1);
}

#[tokio::test]
async fn test_invalid_lease_touches_nothing() {
    let fx = Fixture::new();
    let result = fx
        .services
        .policy
        .handle_dhcp_update(&lease("10.0.0.5", "not-a-mac", "br-lan"))
        .await;

    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(fx.net.calls_to("nft").is_empty());
    assert!(fx.net.calls_to("arp").is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Zone-edit re-sync
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_remove_member_then_refresh_clears_custom_maps_only() {
    let fx = lan_and_guests_fixture().await;
    fx.write_arp(&[("10.0.0.5", MAC_LC, "br-lan")]);
    fx.net.insert_element("dhcp_access", &["br-lan", MAC_LC], "accept");

    let change = fx
        .services
        .zones
        .remove_member("guests", MAC)
        .await
        .unwrap();
    assert!(change.needs_refresh());

    let outcome = fx
        .services
        .policy
        .refresh_member(MAC_LC, "guests")
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::Applied);
    assert!(fx.net.elements("guests_dst_access").is_empty());
    assert!(fx.net.elements("guests_mac_src_access").is_empty());
    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.5 . br-lan . aa:bb:cc:dd:ee:02 : accept"]
    );
}

#[tokio::test]
async fn test_offline_removal_from_custom_zone_does_not_survive_next_lease() {
    let fx = lan_and_guests_fixture().await;
    fx.write_arp(&[]);

    fx.services
        .zones
        .remove_member("guests", MAC)
        .await
        .unwrap();
    let outcome = fx
        .services
        .policy
        .refresh_member(MAC_LC, "guests")
        .await
        .unwrap();
    assert_eq!(outcome, RefreshOutcome::DeviceOffline);
    assert!(fx.net.elements("guests_mac_src_access").is_empty());
    assert!(fx.net.elements("guests_dst_access").is_empty());

    fx.services
        .policy
        .handle_dhcp_update(&lease("10.0.0.9", MAC, "br-lan"))
        .await
        .unwrap();

    assert!(fx.net.elements("guests_mac_src_access").is_empty());
    assert!(fx.net.elements("guests_dst_access").is_empty());
    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.9 . br-lan . aa:bb:cc:dd:ee:02 : accept"]
    );
}

#[tokio::test]
async fn test_custom_zone_eviction_keeps_other_members() {
    let fx = lan_and_guests_fixture().await;
    fx.write_arp(&[]);
    fx.services
        .zones
        .add_member("guests", client("aa:bb:cc:dd:ee:03"))
        .await
        .unwrap();
    fx.net.insert_element(
        "guests_mac_src_access",
        &["10.0.0.7", "br-lan", "aa:bb:cc:dd:ee:03"],
        "accept",
    );
    fx.net
        .insert_element("guests_dst_access", &["10.0.0.7", "br-lan"], "continue");

    fx.services
        .zones
        .remove_member("guests", MAC)
        .await
        .unwrap();
    fx.services
        .policy
        .refresh_member(MAC_LC, "guests")
        .await
        .unwrap();

    assert_eq!(
        fx.net.elements("guests_mac_src_access"),
        vec!["10.0.0.7 . br-lan . aa:bb:cc:dd:ee:03 : accept"]
    );
    assert_eq!(
        fx.net.elements("guests_dst_access"),
        vec!["10.0.0.7 . br-lan : continue"]
    );
}

#[tokio::test]
async fn test_refresh_adds_new_zone_membership() {
    let fx = Fixture::new();
    fx.services
        .zones
        .add_member("lan", client("aa:bb:cc:dd:ee:03"))
        .await
        .unwrap();
    fx.write_arp(&[("10.0.0.5", MAC_LC, "wlan0")]);
    fx.net.insert_element("dhcp_access", &["wlan0", MAC_LC], "accept");

    let change = fx.services.zones.add_member("lan", client(MAC)).await.unwrap();
    assert_eq!(change, MembershipChange::Added);
    assert!(change.needs_refresh());

    fx.services
        .policy
        .refresh_member(MAC_LC, "lan")
        .await
        .unwrap();
    assert_eq!(
        fx.net.elements("lan_access"),
        vec!["10.0.0.5 . wlan0 . aa:bb:cc:dd:ee:02 : accept"]
    );
}

#[tokio::test]
async fn test_refresh_offline_device_is_noop() {
    let fx = Fixture::new();
    fx.write_arp(&[]);

    let outcome = fx
        .services
        .policy
        .refresh_member(MAC_LC, "lan")
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::DeviceOffline);
    assert!(fx.net.calls_to("nft").is_empty());
}

#[tokio::test]
async fn test_refresh_without_dhcp_element_is_noop() {
    let fx = Fixture::new();
    fx.write_arp(&[("10.0.0.5", MAC_LC, "br-lan")]);

    let outcome = fx
        .services
        .policy
        .refresh_member(MAC_LC, "lan")
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::DeviceOffline);
    assert!(
        fx.net
            .calls_to("nft")
            .iter()
            .all(|args| args[1] == "list")
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Custom zone provisioning
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_concurrent_provisioning_inserts_one_rule() {
    let fx = Fixture::new();
    let maps = fx.services.policy.maps();

    let (a, b) = tokio::join!(
        maps.ensure_custom_zone("iot"),
        maps.ensure_custom_zone("iot")
    );
    a.unwrap();
    b.unwrap();
    maps.ensure_custom_zone("iot").await.unwrap();

    assert_eq!(fx.net.rules().len(), 1);
    assert!(fx.net.has_map("iot_dst_access"));
    assert!(fx.net.has_map("iot_mac_src_access"));
}

#[tokio::test]
async fn test_failed_rule_insert_releases_claim() {
    let fx = Fixture::new();
    let maps = fx.services.policy.maps();

    fx.net.set_rule_insert_failure(true);
    assert!(maps.ensure_custom_zone("iot").await.is_err());
    assert!(!fx.net.has_map("iot_dst_access"));

    fx.net.set_rule_insert_failure(false);
    maps.ensure_custom_zone("iot").await.unwrap();
    assert_eq!(fx.net.rules().len(), 1);
}

#[tokio::test]
async fn test_listing_unknown_map_is_empty() {
    let fx = Fixture::new();
    let entries = fx
        .services
        .policy
        .maps()
        .list_elements("nosuch_dst_access")
        .await;
    assert!(entries.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Pending credential assignment
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_generated_pending_psk_claimed_by_noentry_failure() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;

    let stored = psk.set_credential(credential("wpa2", "", "")).await.unwrap();
    assert!(stored.psk.len() >= 16);
    assert!(psk.has_pending().await.unwrap());

    let report = psk
        .on_auth_failure(failure("wpa", "AA:BB:CC:DD:EE:01", "noentry"))
        .await
        .unwrap();
    assert_eq!(report.status, CLAIMED_STATUS);

    let book = psk.store().load().await.unwrap();
    assert!(book.pending.is_none());
    let entry = book.get("AA:BB:CC:DD:EE:01").unwrap();
    assert_eq!(entry.psk_type, PskType::Wpa2);
    assert_eq!(entry.psk, stored.psk);
    assert!(!psk.has_pending().await.unwrap());
}

#[tokio::test]
async fn test_claim_uses_attempted_auth_type() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "", "correcthorse"))
        .await
        .unwrap();

    psk.on_auth_failure(failure("wpa", "aa:bb:cc:dd:ee:01", "noentry"))
        .await
        .unwrap();

    let book = psk.store().load().await.unwrap();
    assert_eq!(book.get("aa:bb:cc:dd:ee:01").unwrap().psk_type, PskType::Wpa2);
}

#[tokio::test]
async fn test_mismatch_failure_does_not_claim() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "", "")).await.unwrap();

    let report = psk
        .on_auth_failure(failure("sae", "aa:bb:cc:dd:ee:01", "mismatch"))
        .await
        .unwrap();

    assert!(report.status.is_empty());
    assert!(psk.has_pending().await.unwrap());
}

#[tokio::test]
async fn test_malformed_failure_reports_rejected() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;

    for report in [
        failure("wpa2", "aa:bb:cc:dd:ee:01", "noentry"),
        failure("sae", "", "noentry"),
        failure("sae", "aa:bb:cc:dd:ee:01", "timeout"),
    ] {
        assert!(matches!(
            psk.on_auth_failure(report).await,
            Err(Error::Validation { .. })
        ));
    }
}

#[tokio::test]
async fn test_connect_claims_only_for_unknown_mac() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("wpa2", "aa:bb:cc:dd:ee:01", "knownknown"))
        .await
        .unwrap();
    psk.set_credential(credential("wpa2", "", "")).await.unwrap();

    let report = psk.on_auth_success(connected("AA:BB:CC:DD:EE:01")).await.unwrap();
    assert_eq!(report.status, "Okay");
    assert!(psk.has_pending().await.unwrap());

    let report = psk.on_auth_success(connected("aa:bb:cc:dd:ee:05")).await.unwrap();
    assert_eq!(report.status, CLAIMED_STATUS);
    assert!(!psk.has_pending().await.unwrap());
    assert!(psk.store().load().await.unwrap().contains("aa:bb:cc:dd:ee:05"));
}

#[tokio::test]
async fn test_other_station_events_ignored() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("wpa2", "", "")).await.unwrap();

    let mut report = connected("aa:bb:cc:dd:ee:05");
    report.event = "AP-STA-DISCONNECTED".to_string();
    let report = psk.on_auth_success(report).await.unwrap();

    assert_eq!(report.status, "Ignored");
    assert!(psk.has_pending().await.unwrap());
}

#[tokio::test]
async fn test_racing_reports_have_single_winner() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "", "")).await.unwrap();

    let (fail_report, success_report) = tokio::join!(
        psk.on_auth_failure(failure("sae", "aa:bb:cc:dd:ee:0a", "noentry")),
        psk.on_auth_success(connected("aa:bb:cc:dd:ee:0b")),
    );
    let claimed = [
        fail_report.unwrap().status == CLAIMED_STATUS,
        success_report.unwrap().status == CLAIMED_STATUS,
    ];
    assert_eq!(claimed.iter().filter(|c| **c).count(), 1);

    let book = psk.store().load().await.unwrap();
    assert!(book.pending.is_none());
    assert_eq!(book.entries.len(), 1);
}

#[tokio::test]
async fn test_second_pending_replaces_first() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "", "firstfirst"))
        .await
        .unwrap();
    psk.set_credential(credential("wpa2", "", "secondsecond"))
        .await
        .unwrap();

    let pending = psk.store().load().await.unwrap().pending.unwrap();
    assert_eq!(pending.psk, "secondsecond");
    assert_eq!(pending.psk_type, PskType::Wpa2);
}

#[tokio::test]
async fn test_psk_length_boundary() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    let mac = "aa:bb:cc:dd:ee:01";

    assert!(matches!(
        psk.set_credential(credential("wpa2", mac, "short12")).await,
        Err(Error::Validation { .. })
    ));
    assert!(!fx.config.paths.psks.exists());

    let stored = psk
        .set_credential(credential("wpa2", mac, "short123"))
        .await
        .unwrap();
    assert_eq!(stored.psk, MASKED_PSK);
    assert_eq!(
        psk.store().load().await.unwrap().get(mac).unwrap().psk,
        "short123"
    );
}

#[tokio::test]
async fn test_unknown_type_rejected() {
    let fx = Fixture::new();
    let result = fx
        .services
        .psk
        .set_credential(credential("wep", "aa:bb:cc:dd:ee:01", ""))
        .await;
    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(fx.net.calls_to("hostapd_cli").is_empty());
}

#[tokio::test]
async fn test_credential_files_round_trip() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "AA:BB:CC:DD:EE:01", "saesecret1"))
        .await
        .unwrap();
    psk.set_credential(credential("wpa2", "aa:bb:cc:dd:ee:02", "wpasecret2"))
        .await
        .unwrap();
    psk.set_credential(credential("wpa2", "", "pendingpsk"))
        .await
        .unwrap();

    let files = psk.read_credential_files().await.unwrap();
    assert!(files.sae.contains("saesecret1|mac=aa:bb:cc:dd:ee:01"));
    assert!(files.wpa2.starts_with("00:00:00:00:00:00 pendingpsk\n"));

    let parsed: BTreeSet<_> = files
        .parse()
        .into_iter()
        .map(|e| (e.psk_type, e.mac, e.psk))
        .collect();
    let stored: BTreeSet<_> = psk
        .store()
        .load()
        .await
        .unwrap()
        .entries
        .into_values()
        .map(|e| (e.psk_type, e.mac, e.psk))
        .collect();
    assert_eq!(parsed, stored);
    assert_eq!(parsed.len(), 2);
    assert_eq!(files, CredentialFiles::render(&psk.store().load().await.unwrap()));
}

#[tokio::test]
async fn test_every_mutation_reloads_authenticator() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("sae", "", "")).await.unwrap();
    psk.on_auth_failure(failure("sae", "aa:bb:cc:dd:ee:01", "noentry"))
        .await
        .unwrap();
    psk.delete_credential("aa:bb:cc:dd:ee:01").await.unwrap();
    psk.reload_credentials().await.unwrap();

    let reloads = fx
        .net
        .calls_to("hostapd_cli")
        .into_iter()
        .filter(|args| args.last().map(String::as_str) == Some("reload_wpa_psk"))
        .count();
    assert_eq!(reloads, 4);
}

#[tokio::test]
async fn test_delete_empty_mac_clears_pending() {
    let fx = Fixture::new();
    let psk = &fx.services.psk;
    psk.set_credential(credential("wpa2", "", "")).await.unwrap();

    assert!(psk.delete_credential("").await.unwrap());
    assert!(!psk.has_pending().await.unwrap());
    assert!(!psk.delete_credential("").await.unwrap());
}

#[tokio::test]
async fn test_reload_failure_is_fatal() {
    let fx = Fixture::new();
    fx.net.set_hostapd_failure(true);

    let err = fx
        .services
        .psk
        .set_credential(credential("wpa2", "aa:bb:cc:dd:ee:01", ""))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_fake_net_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FakeNet>();
}
