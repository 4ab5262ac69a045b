//! Operator-facing CLI surface (spec §6 "CLI"; ambient flags expanding on it
//! per SPEC_FULL.md "[AMBIENT: Configuration / CLI]").

use std::net::SocketAddr;

use clap::Parser;

use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(
    name = "rist-netem-proxy",
    about = "Userspace loopback network-impairment proxy"
)]
pub struct Cli {
    /// Top-level Runs directory name (`./Runs/<project>/`). The literal
    /// name `Test` gets a timestamped directory instead.
    #[arg(long)]
    pub project: String,

    /// Named impairment scenario.
    #[arg(long, value_enum)]
    pub scenario: Scenario,

    /// Address the proxy listens on.
    #[arg(long, default_value = "127.0.0.1:2003")]
    pub listen: SocketAddr,

    /// Canonical peer endpoint seeded into the peer table before the first
    /// packet arrives (the spec's default receiver, 127.0.0.1:2004).
    #[arg(long, default_value = "127.0.0.1:2004")]
    pub known_peer: SocketAddr,

    /// Master PRNG seed; re-running with the same seed reproduces every
    /// provider stream bit for bit.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Impairment refresh cadence, in seconds.
    #[arg(long, default_value_t = 0.5)]
    pub update_every: f64,

    /// Maximum datagram size accepted per receive call.
    #[arg(long, default_value_t = 4096)]
    pub mtu: usize,
}
