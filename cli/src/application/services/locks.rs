//! In-process serialization of sessions that touch the same remote files.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use vpnctl_common::ProtocolKind;

type LockKey = (String, ProtocolKind);

/// One async mutex per (server, protocol) pair.
///
/// Cloning shares the registry. Two sessions for the same pair run one
/// after the other; sessions for different pairs never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `server`'s `kind` files.
    pub async fn acquire(&self, server: &str, kind: ProtocolKind) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry((server.to_string(), kind)).or_default())
        };
        slot.lock_owned().await
    }
}
