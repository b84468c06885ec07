//! Shared test utilities for core module tests
//!
//! [`FakeNet`] stands in for every external program: it keeps verdict maps
//! in memory and answers `nft` the way the real tool does (including its
//! "File exists" / "No such file or directory" failures), and records
//! `ip`, `arp` and `hostapd_cli` invocations.
//!
//! This module is only compiled in test mode.

use crate::config::AppConfig;
use crate::daemon::Services;
use crate::tools::{RunFuture, ToolOutput, ToolRunner};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One map element: key literals and verdict
type Element = (Vec<String>, String);

#[derive(Default)]
struct FakeState {
    maps: BTreeMap<String, Vec<Element>>,
    rules: Vec<String>,
    calls: Vec<(String, Vec<String>)>,
    fail_hostapd: bool,
    fail_rule_insert: bool,
    fail_deletes_in: Vec<String>,
}

#[derive(Default)]
pub struct FakeNet {
    state: Mutex<FakeState>,
}

fn ok(stdout: impl Into<Vec<u8>>) -> ToolOutput {
    ToolOutput {
        success: true,
        exit_code: Some(0),
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn fail(stderr: &str) -> ToolOutput {
    ToolOutput {
        success: false,
        exit_code: Some(1),
        stdout: Vec::new(),
        stderr: stderr.to_string(),
    }
}

/// Key literals and verdict of an `{ a . b . c : verdict }` argument tail.
fn parse_element(tail: &[String]) -> Option<Element> {
    let open = tail.iter().position(|a| a == "{")?;
    let colon = tail.iter().position(|a| a == ":")?;
    let key = tail[open + 1..colon]
        .iter()
        .filter(|a| *a != ".")
        .cloned()
        .collect();
    let verdict = tail.get(colon + 1)?.clone();
    Some((key, verdict))
}

impl FakeNet {
    /// A packet filter with the builtin maps and `dhcp_access` present.
    pub fn with_builtin_maps() -> Arc<Self> {
        let net = Self::default();
        for name in ["internet_access", "dns_access", "lan_access", "dhcp_access"] {
            net.create_map(name);
        }
        Arc::new(net)
    }

    pub fn create_map(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .maps
            .entry(name.to_string())
            .or_default();
    }

    pub fn has_map(&self, name: &str) -> bool {
        self.state.lock().unwrap().maps.contains_key(name)
    }

    pub fn insert_element(&self, map: &str, key: &[&str], verdict: &str) {
        self.state
            .lock()
            .unwrap()
            .maps
            .entry(map.to_string())
            .or_default()
            .push((key.iter().map(ToString::to_string).collect(), verdict.to_string()));
    }

    /// Elements of `map` as `"k1 . k2 : verdict"` strings.
    pub fn elements(&self, map: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .maps
            .get(map)
            .map(|elems| {
                elems
                    .iter()
                    .map(|(key, verdict)| format!("{} : {verdict}", key.join(" . ")))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn rules(&self) -> Vec<String> {
        self.state.lock().unwrap().rules.clone()
    }

    /// Argument lists of every call to `program`.
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn set_hostapd_failure(&self, fail: bool) {
        self.state.lock().unwrap().fail_hostapd = fail;
    }

    pub fn set_rule_insert_failure(&self, fail: bool) {
        self.state.lock().unwrap().fail_rule_insert = fail;
    }

    /// Deletes from `map` fail with a non-"absent" error.
    pub fn fail_deletes_in(&self, map: &str) {
        self.state.lock().unwrap().fail_deletes_in.push(map.to_string());
    }

    fn listing(name: &str, elems: &[Element]) -> Vec<u8> {
        let elem: Vec<serde_json::Value> = elems
            .iter()
            .map(|(key, verdict)| {
                let mut action = serde_json::Map::new();
                action.insert(verdict.clone(), serde_json::Value::Null);
                serde_json::json!([{ "concat": key }, action])
            })
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "nftables": [
                { "metainfo": { "json_schema_version": 1 } },
                { "map": {
                    "family": "inet", "table": "filter", "name": name,
                    "map": "verdict", "elem": elem
                } }
            ]
        }))
        .unwrap()
    }

    fn nft(&self, args: &[String]) -> ToolOutput {
        let mut state = self.state.lock().unwrap();
        let words: Vec<&str> = args.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["-j", "list", "map", "inet", "filter", name] => match state.maps.get(*name) {
                Some(elems) => ok(Self::listing(name, elems)),
                None => fail("Error: No such file or directory\nlist map inet filter x"),
            },
            ["add", "element", "inet", "filter", name, ..] => {
                let Some(element) = parse_element(&args[5..]) else {
                    return fail("Error: syntax error");
                };
                match state.maps.get_mut(*name) {
                    Some(elems) => {
                        if !elems.contains(&element) {
                            elems.push(element);
                        }
                        ok("")
                    }
                    None => fail("Error: Could not process rule: No such file or directory"),
                }
            }
            ["delete", "element", "inet", "filter", name, ..] => {
                if state.fail_deletes_in.iter().any(|m| m.as_str() == *name) {
                    return fail("Error: Could not process rule: Device or resource busy");
                }
                let Some(element) = parse_element(&args[5..]) else {
                    return fail("Error: syntax error");
                };
                let Some(elems) = state.maps.get_mut(*name) else {
                    return fail("Error: Could not process rule: No such file or directory");
                };
                match elems.iter().position(|e| *e == element) {
                    Some(idx) => {
                        elems.remove(idx);
                        ok("")
                    }
                    None => fail("Error: Could not process rule: No such file or directory"),
                }
            }
            ["add", "map", "inet", "filter", name, ..] => {
                state.maps.entry((*name).to_string()).or_default();
                ok("")
            }
            ["create", "map", "inet", "filter", name, ..] => {
                if state.maps.contains_key(*name) {
                    return fail("Error: Could not process rule: File exists");
                }
                state.maps.insert((*name).to_string(), Vec::new());
                ok("")
            }
            ["delete", "map", "inet", "filter", name] => {
                state.maps.remove(*name);
                ok("")
            }
            ["insert", "rule", ..] => {
                if state.fail_rule_insert {
                    return fail("Error: Could not process rule: No such file or directory");
                }
                state.rules.push(words[2..].join(" "));
                ok("")
            }
            _ => fail("Error: unsupported command"),
        }
    }

    fn hostapd(&self, args: &[String]) -> ToolOutput {
        if self.state.lock().unwrap().fail_hostapd {
            return fail("Failed to connect to hostapd");
        }
        match args.last().map(String::as_str) {
            Some("status") => ok("state=ENABLED\nssid[0]=home\n"),
            Some("all_sta") => ok("aa:bb:cc:dd:ee:01\nrx_packets=10\n"),
            _ => ok("OK\n"),
        }
    }
}

impl ToolRunner for FakeNet {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            self.state
                .lock()
                .unwrap()
                .calls
                .push((program.to_string(), args.to_vec()));

            Ok(match program {
                "nft" => self.nft(args),
                "hostapd_cli" => self.hostapd(args),
                "ip" if args.first().map(String::as_str) == Some("-j") => ok("[]"),
                _ => ok(""),
            })
        })
    }
}

/// Services wired to a [`FakeNet`] with every file in a scratch directory.
pub struct Fixture {
    pub dir: TempDir,
    pub net: Arc<FakeNet>,
    pub config: AppConfig,
    pub services: Services,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let net = FakeNet::with_builtin_maps();
        let config = test_config(dir.path(), adjust);
        let runner: Arc<dyn ToolRunner> = net.clone();
        let services = Services::build(&config, runner);
        Self {
            dir,
            net,
            config,
            services,
        }
    }

    /// Replaces the ARP table with `(ip, mac, device)` rows.
    pub fn write_arp(&self, rows: &[(&str, &str, &str)]) {
        let mut text =
            String::from("IP address       HW type     Flags       HW address            Mask     Device\n");
        for (ip, mac, dev) in rows {
            text.push_str(&format!("{ip}         0x1         0x2         {mac}     *        {dev}\n"));
        }
        std::fs::write(&self.config.paths.arp_table, text).unwrap();
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }
}

pub fn test_config(root: &Path, adjust: impl FnOnce(&mut AppConfig)) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.zones = root.join("zones/zones.json");
    config.paths.psks = root.join("wifi/psks.json");
    config.paths.local_mappings = root.join("dns/local_mappings");
    config.paths.arp_table = root.join("arp");
    config.paths.audit_log = Some(root.join("audit.log"));
    config.credentials.sae_passwords = root.join("wifi/sae_passwords");
    config.credentials.wpa2_pskfile = root.join("wifi/wpa2pskfile");
    config.hostapd.config_file = root.join("wifi/hostapd.conf");
    config.listeners.dhcp_socket = root.join("dhcp.sock");
    config.listeners.wifi_socket = root.join("wifi.sock");
    adjust(&mut config);
    config
}
