//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`
//! sockets. All functions are synchronous and take data in, returning data out.

pub mod address_pool;
pub mod awg;
pub mod config;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod shell;
pub mod xray;

pub use address_pool::AddressPool;
pub use awg::AwgConfig;
pub use config::{HostKeyPolicy, SessionSettings, SshSettings, VpnctlConfig};
pub use error::{CommandTimeout, ConfigError, DocumentError, ProvisionError};
pub use keys::WgKeyPair;
pub use ledger::{Ledger, LedgerEntry};
pub use xray::{VlessLink, XrayConfig};
