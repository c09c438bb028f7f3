//! In-process registry used when no database is configured.

use super::{CallerRecord, PendingCommand, Registry, Whitelist};
use crate::protocol::Profile;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
struct Entry {
    pending_command: Option<String>,
    profile: Option<Profile>,
}

#[derive(Debug)]
pub struct MemoryRegistry {
    whitelist: Whitelist,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new(whitelist: Whitelist) -> Self {
        Self {
            whitelist,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Set the pending command unconditionally, as the chat interface does
    /// when a user starts a command.
    pub async fn set_pending(&self, identity: &str, command: Option<&str>) {
        let mut entries = self.entries.write().await;
        entries.entry(identity.to_string()).or_default().pending_command =
            command.map(ToString::to_string);
    }

    pub async fn pending(&self, identity: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(identity)
            .and_then(|entry| entry.pending_command.clone())
    }

    pub async fn profile(&self, identity: &str) -> Option<Profile> {
        let entries = self.entries.read().await;
        entries.get(identity).and_then(|entry| entry.profile.clone())
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn lookup(&self, identity: &str) -> Result<CallerRecord> {
        if !self.whitelist.allows(identity) {
            return Ok(CallerRecord::denied(identity));
        }

        let entries = self.entries.read().await;
        Ok(CallerRecord {
            identity: identity.to_string(),
            whitelisted: true,
            pending_command: entries
                .get(identity)
                .and_then(|entry| entry.pending_command.clone()),
        })
    }

    async fn compare_and_set_pending(
        &self,
        identity: &str,
        expected: PendingCommand,
        next: Option<PendingCommand>,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(identity) else {
            return Ok(false);
        };

        if entry.pending_command.as_deref() != Some(expected.as_str()) {
            return Ok(false);
        }

        entry.pending_command = next.map(|command| command.as_str().to_string());
        Ok(true)
    }

    async fn record_login(&self, identity: &str, profile: &Profile) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.entry(identity.to_string()).or_default().profile = Some(profile.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
