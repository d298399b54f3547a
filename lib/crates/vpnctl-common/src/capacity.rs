//! Capacity counters read by the external placement routine.
//!
//! Placement picks the active server with the fewest issued configs and
//! declines when even that one is overloaded. Only the counters live here.

use serde::{Deserialize, Serialize};

use crate::types::{ClientRecord, Server};

/// Issued/maximum config counts for one server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerLoad {
    pub max_configs: u32,
    pub issued: u32,
}

impl ServerLoad {
    #[must_use]
    pub fn new(max_configs: u32, issued: u32) -> Self {
        Self {
            max_configs,
            issued,
        }
    }

    /// Load of `server` computed from the records of every protocol on it.
    pub fn for_server<'a>(
        server: &Server,
        records: impl IntoIterator<Item = &'a ClientRecord>,
    ) -> Self {
        Self::new(server.max_configs, issued_count(server, records))
    }

    #[must_use]
    pub fn available_slots(&self) -> u32 {
        self.max_configs.saturating_sub(self.issued)
    }

    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.issued >= self.max_configs
    }
}

/// Number of client records on `server`, enabled or not, across protocols.
pub fn issued_count<'a>(
    server: &Server,
    records: impl IntoIterator<Item = &'a ClientRecord>,
) -> u32 {
    let count = records
        .into_iter()
        .filter(|r| r.server == server.name)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// One row of a fleet capacity listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityReport {
    pub server: String,
    pub is_active: bool,
    pub max_configs: u32,
    pub issued: u32,
    pub available_slots: u32,
    pub overloaded: bool,
}

impl CapacityReport {
    #[must_use]
    pub fn new(server: &Server, load: ServerLoad) -> Self {
        Self {
            server: server.name.clone(),
            is_active: server.is_active,
            max_configs: load.max_configs,
            issued: load.issued,
            available_slots: load.available_slots(),
            overloaded: load.is_overloaded(),
        }
    }
}

/// Capacity of every server in `servers`, in inventory order.
pub fn fleet_capacity(servers: &[Server], records: &[ClientRecord]) -> Vec<CapacityReport> {
    servers
        .iter()
        .map(|s| CapacityReport::new(s, ServerLoad::for_server(s, records)))
        .collect()
}
