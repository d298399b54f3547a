//! Command implementations

pub mod add;
pub mod capacity;
pub mod clients;
pub mod remove;
pub mod servers;
pub mod toggle;
pub mod url;
pub mod wg_conf;

use clap::Args;
use vpnctl_common::ProtocolKind;

/// Server and protocol every client operation is scoped to.
#[derive(Args, Debug)]
pub struct Target {
    /// Server name from the inventory
    pub server: String,
    /// Tunnel protocol
    #[arg(value_enum)]
    pub protocol: ProtocolKind,
}
