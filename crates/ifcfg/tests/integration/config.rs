//! Whole-configuration behavior.

use ifcfg::Error;
use ifcfg::config::{ApplyOptions, BRIDGE_PACKAGE, NetworkConfig};

use crate::common::{RecordingPackages, TestHost};

fn topology() -> NetworkConfig {
    NetworkConfig::new()
        .alias("eth0:1", |i| i.address("10.0.0.9", "255.255.255.0"))
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
        .bridge_port("eth1", |p| p.bridge("br0"))
        .bridge("br0", |b| b.address("192.168.100.1", "255.255.255.0").stp(false))
}

#[tokio::test]
async fn test_invalid_interface_writes_nothing() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .static_interface("eth1", |i| i.address("10.0.1.5", "255.255.255.0"))
        .static_interface("eth0", |i| {
            i.ipaddress(["10.0.0.5", "10.0.0.6"])
                .netmask("255.255.255.0")
        });

    let err = config.apply(&t.host).await.unwrap_err();
    assert!(err.is_validation());
    assert!(err.violations().iter().any(|v| v.field == "netmask"));
    assert!(!t.exists("eth0"));
    assert!(!t.exists("eth1"));
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_addresses_rejected() {
    let t = TestHost::new();
    for config in [
        NetworkConfig::new().static_interface("eth0", |i| i.address("10.0.0.256", "255.255.255.0")),
        NetworkConfig::new().static_interface("eth0", |i| i.address("10.0.0.5", "255.0.255.0")),
        NetworkConfig::new().dynamic_interface("eth0", |i| i.ipv6address("2001:db8::1/129")),
        NetworkConfig::new().dynamic_interface("eth0", |i| i.macaddress("52:54:00:zz:34:56")),
    ] {
        let err = config.render(&t.host).unwrap_err();
        assert!(err.is_validation(), "{err}");
    }
    assert!(!t.exists("eth0"));
}

#[tokio::test]
async fn test_duplicate_names_rejected() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .dynamic_interface("eth0", |i| i)
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"));

    let err = config
        .apply_with_options(
            &t.host,
            ApplyOptions {
                continue_on_error: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(!t.exists("eth0"));
}

#[tokio::test]
async fn test_masters_before_ports_before_aliases() {
    let t = TestHost::new();
    let result = topology().apply(&t.host).await.unwrap();

    let order: Vec<&str> = result.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["br0", "eth1", "eth0", "eth0:1"]);
    assert_eq!(result.changes_made, 4);
    assert!(result.is_success());

    let port = t.read("eth1");
    assert!(port.lines().any(|l| l == "BRIDGE=br0"));
    assert!(!port.contains("IPADDR"));
    let bridge = t.read("br0");
    assert!(bridge.lines().any(|l| l == "TYPE=Bridge"));
    assert!(bridge.lines().any(|l| l == "STP=no"));
    let alias = t.read("eth0:1");
    assert!(!alias.contains("HWADDR"));
}

#[tokio::test]
async fn test_bridge_package_ensured() {
    let t = TestHost::new();
    topology().apply(&t.host).await.unwrap();
    assert_eq!(t.packages.requested(), vec![BRIDGE_PACKAGE.to_string()]);
}

#[tokio::test]
async fn test_converged_bridge_skips_package_check() {
    let t = TestHost::new();
    topology().apply(&t.host).await.unwrap();
    assert_eq!(t.packages.requested().len(), 1);

    t.runner.clear();
    let result = topology().apply(&t.host).await.unwrap();
    assert_eq!(result.changes_made, 0);
    assert_eq!(t.packages.requested().len(), 1);
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_skips_packages() {
    let t = TestHost::new();
    topology()
        .apply_with_options(
            &t.host,
            ApplyOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(t.packages.requested().is_empty());
}

#[tokio::test]
async fn test_missing_package_fails_bridge_only() {
    let t = TestHost::with(|s| s, RecordingPackages::failing());

    let err = topology().apply(&t.host).await.unwrap_err();
    assert_eq!(err.exit_status(), Some(1));
    assert!(!t.exists("br0"));

    let result = topology()
        .apply_with_options(
            &t.host,
            ApplyOptions {
                continue_on_error: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].name, "br0");
    assert!(!t.exists("br0"));
    assert!(t.exists("eth0"));
    assert!(result.summary_text().contains("install bridge-utils br0"));
}

#[tokio::test]
async fn test_cleanup_only_touches_this_interface() {
    let t = TestHost::new();
    let managed = t.ifcfg_path("eth0");
    t.runner.answer(
        "nmcli -t",
        &format!(
            "eth0:11111111-aaaa:/etc/NetworkManager/system-connections/eth0.nmconnection\n\
             System eth0:22222222-bbbb:{}\n\
             System eth0:33333333-cccc:/etc/sysconfig/network-scripts/ifcfg-eth0.old\n\
             eth1:44444444-dddd:/etc/NetworkManager/system-connections/eth1.nmconnection\n\
             Wired connection 1:55555555-eeee:/run/NetworkManager/system-connections/w1.nmconnection\n",
            managed.display()
        ),
    );

    let result = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
        .apply(&t.host)
        .await
        .unwrap();

    assert_eq!(
        result.results[0].removed_connections,
        vec!["11111111-aaaa".to_string(), "33333333-cccc".to_string()]
    );
    let deletes: Vec<String> = t
        .runner
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("nmcli connection delete"))
        .collect();
    assert_eq!(
        deletes,
        vec![
            "nmcli connection delete uuid 11111111-aaaa".to_string(),
            "nmcli connection delete uuid 33333333-cccc".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_cleanup_failure_is_not_fatal() {
    let t = TestHost::new();
    t.runner.answer("nmcli -t", "eth0:11111111-aaaa:/tmp/other\n");
    t.runner.fail("nmcli connection delete", 10, "Error: not found");

    let result = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
        .apply(&t.host)
        .await
        .unwrap();

    let outcome = &result.results[0];
    assert!(outcome.is_success());
    assert_eq!(outcome.cleanup_errors.len(), 1);
    assert!(outcome.removed_connections.is_empty());
    assert!(outcome.summary().contains("1 cleanup error(s)"));
    assert!(!t.pending_path("eth0").exists());
}

#[tokio::test]
async fn test_diff_tracks_disk() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"));

    let diff = config.diff(&t.host).await.unwrap();
    assert_eq!(diff.files.len(), 1);
    assert!(diff.files[0].created);
    assert!(diff.summary().starts_with("+ file "));

    config.apply(&t.host).await.unwrap();
    let diff = config.diff(&t.host).await.unwrap();
    assert!(diff.is_empty());
    assert_eq!(diff.unchanged, vec!["eth0".to_string()]);
    assert_eq!(diff.summary(), "No changes needed");

    let changed = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.128"));
    let diff = changed.diff(&t.host).await.unwrap();
    assert_eq!(diff.change_count(), 1);
    assert!(diff.summary().contains("~ NETMASK: 255.255.255.0 -> 255.255.255.128"));
}

#[tokio::test]
async fn test_diff_reports_unreadable_marker() {
    let t = TestHost::new();
    let state_dir = t.host.settings().state_dir.clone();
    std::fs::write(&state_dir, "").unwrap();

    let err = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
        .diff(&t.host)
        .await
        .unwrap_err();
    match err {
        Error::File { path, .. } => assert_eq!(path, t.pending_path("eth0")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_render_is_deterministic() {
    let t = TestHost::new();
    let config = topology();
    let first: Vec<String> = config
        .render(&t.host)
        .unwrap()
        .iter()
        .map(|r| r.content())
        .collect();
    let second: Vec<String> = config
        .render(&t.host)
        .unwrap()
        .iter()
        .map(|r| r.content())
        .collect();
    assert_eq!(first, second);
}
