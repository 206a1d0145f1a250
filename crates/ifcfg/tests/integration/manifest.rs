//! Manifests and capture of existing files.

use ifcfg::config::capture::capture_dir;
use ifcfg::config::{InterfaceKind, NetworkConfig};

use crate::common::TestHost;

const MANIFEST: &str = r#"
settings:
  tool: initscripts
  cleanup: false
interfaces:
  - name: bond0
    kind: bond
    ipaddress: 10.10.0.2
    netmask: 255.255.0.0
    bonding_opts: "mode=active-backup miimon=100"
  - name: eth2
    kind: bond_slave
    master: bond0
  - name: eth0
    kind: dynamic
    peerdns: no
    dhcp_hostname: web01
  - name: eth0.100
    kind: vlan
    ipaddress: 172.16.100.2
    netmask: 255.255.255.0
    options:
      zone_extra: "1"
"#;

#[tokio::test]
async fn test_yaml_manifest_applies() {
    let config = NetworkConfig::from_yaml_str(MANIFEST).unwrap();
    let t = TestHost::with_settings(|mut s| {
        s.tool = config.settings().tool;
        s.cleanup = config.settings().cleanup;
        s
    });

    let result = config.apply(&t.host).await.unwrap();
    assert!(result.is_success());
    assert_eq!(
        t.runner.calls(),
        vec!["ifup bond0", "ifup eth2", "ifup eth0", "ifup eth0.100"]
    );

    let bond = t.read("bond0");
    assert!(
        bond.lines()
            .any(|l| l == "BONDING_OPTS=\"mode=active-backup miimon=100\"")
    );
    let slave = t.read("eth2");
    assert!(slave.lines().any(|l| l == "MASTER=bond0"));
    assert!(slave.lines().any(|l| l == "SLAVE=yes"));
    let dynamic = t.read("eth0");
    assert!(dynamic.lines().any(|l| l == "BOOTPROTO=dhcp"));
    assert!(dynamic.lines().any(|l| l == "PEERDNS=no"));
    let vlan = t.read("eth0.100");
    assert!(vlan.lines().any(|l| l == "VLAN=yes"));
    assert!(vlan.lines().any(|l| l == "ZONE_EXTRA=1"));
    assert!(vlan.lines().any(|l| l == "HWADDR=52:54:00:12:34:56"));
}

#[test]
fn test_unknown_manifest_key_is_validation_error() {
    let config = NetworkConfig::from_yaml_str(
        r#"
interfaces:
  - name: eth0
    kind: dynamic
    peer_dns: yes
"#,
    )
    .unwrap();
    let t = TestHost::new();
    let err = config.render(&t.host).unwrap_err();
    assert!(err.violations().iter().any(|v| v.field == "peer_dns"));
}

#[test]
fn test_json_manifest() {
    let config = NetworkConfig::from_json_str(
        r#"{"interfaces": [{"name": "br0", "kind": "bridge", "stp": true, "delay": "0"}]}"#,
    )
    .unwrap();
    let t = TestHost::new();
    let rendered = config.render(&t.host).unwrap();
    assert_eq!(rendered[0].get("STP"), Some("yes"));
    assert_eq!(rendered[0].get("DELAY"), Some("0"));
}

#[tokio::test]
async fn test_capture_reproduces_applied_files() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .bridge("br0", |b| b.address("192.168.100.1", "255.255.255.0").stp(false))
        .bridge_port("eth1", |p| p.bridge("br0"))
        .static_interface("eth0", |i| {
            i.ipaddress(["10.0.0.5", "10.0.0.6"])
                .netmask(["255.255.255.0", "255.255.255.0"])
                .gateway("10.0.0.1")
                .dns("10.0.0.53", None)
        });
    config.apply(&t.host).await.unwrap();

    let captured = capture_dir(&t.host.settings().config_dir, &[]).unwrap();
    let kinds: Vec<(&str, InterfaceKind)> = captured
        .interfaces()
        .iter()
        .map(|i| (i.name(), i.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("br0", InterfaceKind::Bridge),
            ("eth0", InterfaceKind::Static),
            ("eth1", InterfaceKind::BridgePort),
        ]
    );

    // Applying the captured manifest changes nothing.
    t.runner.clear();
    let result = captured.apply(&t.host).await.unwrap();
    assert_eq!(result.changes_made, 0);
    assert!(t.runner.calls().is_empty());
}
