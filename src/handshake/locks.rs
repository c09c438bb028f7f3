//! Per-caller serialization of handshake requests.
//!
//! Two tabs submitting a code for the same caller would otherwise race on
//! the provider session and the pending command. Entries are dropped once
//! nothing holds or waits on them.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct CallerLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CallerLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`'s handshake.
    pub async fn acquire(&self, identity: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(identity.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
