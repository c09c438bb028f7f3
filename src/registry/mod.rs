//! Caller registry: whitelist lookups, pending commands and login records.
//!
//! The registry owns the only state that survives between handshake
//! requests. Pending command changes are compare-and-set so a web request
//! and the chat interface cannot overwrite each other's transitions.

mod memory;
mod postgres;
mod whitelist;

pub use memory::MemoryRegistry;
pub use postgres::PgRegistry;
pub use whitelist::Whitelist;

use crate::protocol::Profile;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Chat-driven command waiting on the web handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingCommand {
    Login,
    LoginPasswordEntry,
}

impl PendingCommand {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::LoginPasswordEntry => "Login (password entry)",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Login" => Some(Self::Login),
            "Login (password entry)" => Some(Self::LoginPasswordEntry),
            _ => None,
        }
    }
}

impl fmt::Display for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a caller as seen by the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerRecord {
    pub identity: String,
    pub whitelisted: bool,
    /// Raw marker; other chat commands may be pending too.
    pub pending_command: Option<String>,
}

impl CallerRecord {
    /// Record for a caller the whitelist rejects.
    #[must_use]
    pub fn denied(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            whitelisted: false,
            pending_command: None,
        }
    }
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Resolve a caller. Callers outside the whitelist are answered without
    /// touching storage, and lookups never create records.
    async fn lookup(&self, identity: &str) -> Result<CallerRecord>;

    /// Replace the pending command with `next` only if it currently equals
    /// `expected`. Returns whether the update was applied.
    async fn compare_and_set_pending(
        &self,
        identity: &str,
        expected: PendingCommand,
        next: Option<PendingCommand>,
    ) -> Result<bool>;

    /// Persist the provider profile resolved at login.
    async fn record_login(&self, identity: &str, profile: &Profile) -> Result<()>;

    /// Backend liveness for health checks.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_command_round_trips_marker_text() {
        for command in [PendingCommand::Login, PendingCommand::LoginPasswordEntry] {
            assert_eq!(PendingCommand::parse(command.as_str()), Some(command));
        }
        assert_eq!(PendingCommand::parse("Logout"), None);
        assert_eq!(
            PendingCommand::LoginPasswordEntry.to_string(),
            "Login (password entry)"
        );
    }
}
