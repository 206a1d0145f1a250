//! Example command - print example manifests.

use clap::{Args, ValueEnum};
use ifcfg::config::{BootProto, NetworkConfig};

use crate::manifest::OutputFormat;

#[derive(Args)]
pub struct ExampleArgs {
    /// Kind of setup to show
    #[arg(short, long, value_enum, default_value = "static")]
    pub kind: ExampleKind,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExampleKind {
    /// Multi-homed static interface
    Static,
    /// DHCP client
    Dynamic,
    /// Bridge with one port
    Bridge,
    /// Active-backup bond with two slaves
    Bond,
    /// Tagged VLAN on a physical interface
    Vlan,
    /// IP alias on a physical interface
    Alias,
}

pub fn run(args: ExampleArgs) -> anyhow::Result<()> {
    let config = example(args.kind);
    print!("{}", args.format.serialize(&config)?);
    Ok(())
}

fn example(kind: ExampleKind) -> NetworkConfig {
    let config = NetworkConfig::new();
    match kind {
        ExampleKind::Static => config.static_interface("eth0", |i| {
            i.address("10.0.0.5", "255.255.255.0")
                .address("10.0.0.6", "255.255.255.0")
                .gateway("10.0.0.1")
                .dns("10.0.0.53", Some("10.0.1.53"))
                .domain("example.com")
        }),
        ExampleKind::Dynamic => config.dynamic_interface("eth0", |i| {
            i.bootproto(BootProto::Dhcp)
                .peerdns(true)
                .dhcp_hostname("web01")
        }),
        ExampleKind::Bridge => config
            .bridge("br0", |b| {
                b.address("192.168.100.1", "255.255.255.0")
                    .stp(false)
                    .delay("0")
            })
            .bridge_port("eth1", |p| p.bridge("br0")),
        ExampleKind::Bond => config
            .bond("bond0", |b| {
                b.address("10.10.0.2", "255.255.0.0")
                    .bonding_opts("mode=active-backup miimon=100")
            })
            .bond_slave("eth2", |s| s.master("bond0"))
            .bond_slave("eth3", |s| s.master("bond0")),
        ExampleKind::Vlan => config.vlan("eth0.100", |v| {
            v.address("172.16.100.2", "255.255.255.0").mtu(1500)
        }),
        ExampleKind::Alias => config
            .static_interface("eth0", |i| i.address("10.0.0.5", "255.255.255.0"))
            .alias("eth0:1", |a| a.address("10.0.0.9", "255.255.255.0")),
    }
}
