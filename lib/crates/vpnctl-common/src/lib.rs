//! Types shared between the vpnctl core and the external collaborators
//! that keep client records and place new clients.

pub mod capacity;
pub mod types;

pub use capacity::{CapacityReport, ServerLoad, fleet_capacity, issued_count};
pub use types::*;
