//! Client address allocation for AmneziaWG peers.
//!
//! Addresses come from a single /24. The next address is one past the
//! highest octet in use; gaps left by removed peers are not reused.

use std::net::Ipv4Addr;

use crate::domain::error::ProvisionError;

/// A /24 client pool with an inclusive host-octet range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPool {
    network: [u8; 3],
    first_host: u8,
    last_host: u8,
}

impl Default for AddressPool {
    /// `10.8.1.1` – `10.8.1.254`, the AmneziaWG server default.
    fn default() -> Self {
        Self::new(Ipv4Addr::new(10, 8, 1, 0), 1, 254)
    }
}

impl AddressPool {
    #[must_use]
    pub fn new(network: Ipv4Addr, first_host: u8, last_host: u8) -> Self {
        let [a, b, c, _] = network.octets();
        Self {
            network: [a, b, c],
            first_host,
            last_host,
        }
    }

    /// Dotted prefix shared by every pool address, e.g. `10.8.1.`.
    #[must_use]
    pub fn prefix(&self) -> String {
        let [a, b, c] = self.network;
        format!("{a}.{b}.{c}.")
    }

    fn host_octet(&self, addr: Ipv4Addr) -> Option<u8> {
        let [a, b, c, d] = addr.octets();
        ([a, b, c] == self.network).then_some(d)
    }

    /// Next free `/32` given the `AllowedIPs` values of every existing peer.
    ///
    /// Each value may hold several comma-separated CIDRs; entries outside
    /// the pool are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::PoolExhausted`] when the highest address in
    /// use is already the pool's last host.
    pub fn next_address<'a>(
        &self,
        allowed_ips: impl IntoIterator<Item = &'a str>,
    ) -> Result<String, ProvisionError> {
        let highest = allowed_ips
            .into_iter()
            .flat_map(|value| value.split(','))
            .filter_map(|cidr| cidr.trim().split('/').next()?.parse::<Ipv4Addr>().ok())
            .filter_map(|addr| self.host_octet(addr))
            .max();

        let next = match highest {
            None => Some(self.first_host),
            Some(octet) => octet.checked_add(1).map(|n| n.max(self.first_host)),
        };
        match next {
            Some(octet) if octet <= self.last_host => Ok(format!("{}{octet}/32", self.prefix())),
            _ => Err(ProvisionError::PoolExhausted {
                pool: format!("{}0/24", self.prefix()),
            }),
        }
    }
}
