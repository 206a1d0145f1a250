//! Reconciliation of single interfaces.

use ifcfg::config::{ApplyOptions, NetworkConfig, ReconcileState};
use ifcfg::runner::ActivationTool;
use ifcfg::Error;

use crate::common::{Reply, TestHost, make_read_only, restore_writable};

fn eth0(mask: &str) -> NetworkConfig {
    NetworkConfig::new().static_interface("eth0", |i| i.address("10.0.0.5", mask))
}

fn reload_cmd(t: &TestHost, name: &str) -> String {
    format!("nmcli connection load {}", t.ifcfg_path(name).display())
}

const LIST: &str = "nmcli -t -f NAME,UUID,FILENAME connection show";

#[tokio::test]
async fn test_second_apply_runs_no_commands() {
    let t = TestHost::new();
    let config = eth0("255.255.255.0");

    let first = config.apply(&t.host).await.unwrap();
    assert_eq!(first.changes_made, 1);
    assert!(first.results[0].changed);
    assert_eq!(first.results[0].state, ReconcileState::Applied);
    let written = t.read("eth0");

    t.runner.clear();
    let second = config.apply(&t.host).await.unwrap();
    assert_eq!(second.changes_made, 0);
    assert!(!second.results[0].changed);
    assert_eq!(second.results[0].command_count(), 0);
    assert!(t.runner.calls().is_empty());
    assert_eq!(t.read("eth0"), written);
}

#[tokio::test]
async fn test_changed_netmask_writes_then_reloads_then_activates() {
    let t = TestHost::new();
    eth0("255.255.255.0").apply(&t.host).await.unwrap();
    t.runner.clear();

    let result = eth0("255.255.255.128").apply(&t.host).await.unwrap();
    assert_eq!(result.changes_made, 1);
    assert!(t.read("eth0").contains("NETMASK=255.255.255.128\n"));
    assert_eq!(
        t.runner.calls(),
        vec![
            reload_cmd(&t, "eth0"),
            "nmcli connection up ifname eth0".to_string(),
            LIST.to_string(),
        ]
    );

    let outcome = &result.results[0];
    assert!(outcome.actions[0].to_string().starts_with("write "));
    assert_eq!(outcome.command_count(), 3);
    assert!(!t.pending_path("eth0").exists());
}

#[tokio::test]
async fn test_multi_homed_file() {
    let t = TestHost::new();
    let config = NetworkConfig::new().static_interface("eth0", |i| {
        i.up()
            .device("eth0")
            .ipaddress(["10.0.0.5", "10.0.0.6"])
            .netmask(["255.255.255.0", "255.255.255.0"])
    });
    config.apply(&t.host).await.unwrap();

    let content = t.read("eth0");
    assert!(content.starts_with("# Managed by ifcfg\n"));
    for line in [
        "DEVICE=eth0",
        "BOOTPROTO=none",
        "IPADDR=10.0.0.5",
        "IPADDR1=10.0.0.6",
        "NETMASK=255.255.255.0",
        "NETMASK1=255.255.255.0",
        "HWADDR=52:54:00:12:34:56",
        "ONBOOT=yes",
    ] {
        assert!(content.lines().any(|l| l == line), "missing {line} in\n{content}");
    }
    assert!(content.find("IPADDR1=").unwrap() < content.find("NETMASK=").unwrap());
}

#[tokio::test]
async fn test_ensure_down_never_brings_up() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .static_interface("eth0", |i| i.down().address("10.0.0.5", "255.255.255.0"));

    config.apply(&t.host).await.unwrap();
    assert!(t.read("eth0").lines().any(|l| l == "ONBOOT=no"));

    let calls = t.runner.calls();
    assert!(calls.contains(&"nmcli device disconnect eth0".to_string()));
    assert!(!calls.iter().any(|c| c.contains("connection up")));
}

#[tokio::test]
async fn test_failed_activation_resumes_on_retry() {
    let t = TestHost::new();
    t.runner.fail("nmcli connection up", 4, "Error: no device found");
    let config = eth0("255.255.255.0");

    let err = config.apply(&t.host).await.unwrap_err();
    assert!(err.is_activation());
    assert_eq!(err.exit_status(), Some(4));
    assert!(err.to_string().contains("no device found"));
    assert!(t.exists("eth0"));
    assert!(t.pending_path("eth0").exists());

    // Same content, but activation never finished.
    t.runner.reset_script();
    t.runner.clear();
    let retry = config.apply(&t.host).await.unwrap();
    assert!(!retry.results[0].changed);
    assert_eq!(
        t.runner.calls(),
        vec![
            reload_cmd(&t, "eth0"),
            "nmcli connection up ifname eth0".to_string(),
            LIST.to_string(),
        ]
    );
    assert!(!t.pending_path("eth0").exists());

    t.runner.clear();
    config.apply(&t.host).await.unwrap();
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_failed_reload_stops_before_activation() {
    let t = TestHost::new();
    t.runner.fail("nmcli connection load", 1, "Error: failed to load");

    let result = eth0("255.255.255.0")
        .apply_with_options(
            &t.host,
            ApplyOptions {
                continue_on_error: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.failure_count(), 1);
    let outcome = &result.results[0];
    assert_eq!(outcome.state, ReconcileState::Failed);
    assert_eq!(outcome.reached, ReconcileState::Written);
    assert_eq!(t.runner.calls(), vec![reload_cmd(&t, "eth0")]);
    assert!(result.summary_text().contains("failed after written"));
}

#[tokio::test]
async fn test_timeout_is_activation_failure() {
    let t = TestHost::new();
    t.runner.reply("nmcli connection up", Reply::Timeout);

    let err = eth0("255.255.255.0").apply(&t.host).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(err.is_activation());
    assert!(t.pending_path("eth0").exists());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let t = TestHost::new();
    let result = eth0("255.255.255.0")
        .apply_with_options(
            &t.host,
            ApplyOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.changes_made, 1);
    assert!(!t.exists("eth0"));
    assert!(!t.pending_path("eth0").exists());
    assert!(t.runner.calls().is_empty());

    let planned: Vec<String> = result.results[0]
        .actions
        .iter()
        .map(|a| a.to_string())
        .collect();
    assert_eq!(planned.len(), 4);
    assert!(planned[0].starts_with("write "));
    assert!(planned[1].starts_with("reload: nmcli connection load"));
    assert_eq!(planned[2], "up: nmcli connection up ifname eth0");
}

#[tokio::test]
async fn test_no_activate_only_writes() {
    let t = TestHost::new();
    let result = eth0("255.255.255.0")
        .apply_with_options(
            &t.host,
            ApplyOptions {
                activate: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.changes_made, 1);
    assert!(t.exists("eth0"));
    assert!(t.runner.calls().is_empty());
    assert!(!t.pending_path("eth0").exists());
}

#[tokio::test]
async fn test_initscripts_tool() {
    let t = TestHost::with_settings(|mut s| {
        s.tool = ActivationTool::Initscripts;
        s
    });
    let config = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
        .alias("eth0:1", |i| i.address("10.0.0.9", "255.255.255.0"));

    config.apply(&t.host).await.unwrap();
    assert_eq!(
        t.runner.calls(),
        vec!["ifup eth0".to_string(), "ifup eth0:1".to_string()]
    );
    assert!(t.read("eth0:1").lines().any(|l| l == "ONPARENT=yes"));
}

#[tokio::test]
async fn test_network_manager_alias_activates_parent() {
    let t = TestHost::new();
    NetworkConfig::new()
        .alias("eth0:1", |i| i.address("10.0.0.9", "255.255.255.0"))
        .apply(&t.host)
        .await
        .unwrap();

    assert_eq!(
        t.runner.calls(),
        vec![
            reload_cmd(&t, "eth0:1"),
            "nmcli connection up ifname eth0".to_string(),
            LIST.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_network_manager_alias_down_keeps_parent() {
    let t = TestHost::new();
    let result = NetworkConfig::new()
        .alias("eth0:1", |i| i.down().address("10.0.0.9", "255.255.255.0"))
        .apply(&t.host)
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(t.read("eth0:1").lines().any(|l| l == "ONPARENT=no"));
    let calls = t.runner.calls();
    assert_eq!(calls, vec![reload_cmd(&t, "eth0:1"), LIST.to_string()]);
    assert!(!t.pending_path("eth0:1").exists());
}

#[tokio::test]
async fn test_write_failure_keeps_previous_file() {
    let t = TestHost::new();
    eth0("255.255.255.0").apply(&t.host).await.unwrap();
    let before = t.read("eth0");
    t.runner.clear();

    let dir = t.host.settings().config_dir.clone();
    if !make_read_only(&dir) {
        eprintln!("Skipping test: directory permissions are not enforced");
        return;
    }

    let result = eth0("255.255.255.128")
        .apply_with_options(
            &t.host,
            ApplyOptions {
                continue_on_error: true,
                ..Default::default()
            },
        )
        .await;
    restore_writable(&dir);
    let result = result.unwrap();

    let outcome = &result.results[0];
    assert_eq!(outcome.state, ReconcileState::Failed);
    assert_eq!(outcome.reached, ReconcileState::Start);
    assert!(outcome.failure.as_ref().unwrap().is_permission_denied());
    assert_eq!(t.read("eth0"), before);
    assert!(!t.pending_path("eth0").exists());
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_unusable_config_dir_fails_before_commands() {
    let t = TestHost::new();
    let dir = t.host.settings().config_dir.clone();
    std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
    std::fs::write(&dir, "not a directory\n").unwrap();

    let err = eth0("255.255.255.0").apply(&t.host).await.unwrap_err();
    assert!(matches!(err, Error::File { .. }), "{err}");
    assert!(!err.is_activation());
    assert_eq!(std::fs::read_to_string(&dir).unwrap(), "not a directory\n");
    assert!(!t.pending_path("eth0").exists());
    assert!(t.runner.calls().is_empty());
}

#[tokio::test]
async fn test_flush_before_up() {
    let t = TestHost::new();
    let config = NetworkConfig::new()
        .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0").flush(true));

    config.apply(&t.host).await.unwrap();
    let calls = t.runner.calls();
    let flush = calls
        .iter()
        .position(|c| c == "ip addr flush dev eth0")
        .unwrap();
    let up = calls
        .iter()
        .position(|c| c == "nmcli connection up ifname eth0")
        .unwrap();
    assert!(flush < up);
}
