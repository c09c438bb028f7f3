//! Whitelist policy for callers allowed to log in.
//!
//! Entries are `*` (everyone), a homeserver domain (`example.com`) or a full
//! identity (`@alice:example.com`). A domain entry without a port also
//! matches that server on any port.

use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct Whitelist {
    everyone: bool,
    domains: HashSet<String>,
    identities: HashSet<String>,
}

impl Whitelist {
    /// Parse a comma separated list of entries. Empty entries are skipped.
    #[must_use]
    pub fn parse(entries: &str) -> Self {
        entries.split(',').fold(Self::default(), |mut list, entry| {
            let entry = entry.trim();
            if entry == "*" {
                list.everyone = true;
            } else if entry.starts_with('@') {
                list.identities.insert(entry.to_string());
            } else if !entry.is_empty() {
                list.domains.insert(entry.to_ascii_lowercase());
            }
            list
        })
    }

    #[must_use]
    pub fn everyone() -> Self {
        Self {
            everyone: true,
            ..Self::default()
        }
    }

    /// True when no caller can pass.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.everyone && self.domains.is_empty() && self.identities.is_empty()
    }

    #[must_use]
    pub fn allows(&self, identity: &str) -> bool {
        if self.everyone || self.identities.contains(identity) {
            return true;
        }

        identity.split_once(':').is_some_and(|(_, server)| {
            let server = server.to_ascii_lowercase();
            self.domains.contains(&server) || self.domains.contains(host(&server))
        })
    }
}

/// Server name without a trailing `:port`. Bracketed IPv6 literals keep
/// their brackets.
fn host(server: &str) -> &str {
    match server.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => server,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_allows_nobody() {
        let list = Whitelist::parse(" , ");
        assert!(list.is_empty());
        assert!(!list.allows("@alice:example.com"));
        assert!(!Whitelist::everyone().is_empty());
    }

    #[test]
    fn wildcard_allows_everyone() {
        let list = Whitelist::parse("*");
        assert!(list.allows("@anyone:anywhere.org"));
        assert!(Whitelist::everyone().allows("@bob:example.net"));
    }

    #[test]
    fn domain_entries_match_server_part() {
        let list = Whitelist::parse("Example.com, other.org");
        assert!(list.allows("@alice:example.com"));
        assert!(list.allows("@bob:other.org"));
        assert!(!list.allows("@mallory:evil.example.com"));
        assert!(!list.allows("example.com"));
    }

    #[test]
    fn domain_entries_ignore_server_port() {
        let list = Whitelist::parse("example.com,[::1],matrix.org:8448");
        assert!(list.allows("@alice:example.com:8448"));
        assert!(list.allows("@bob:[::1]:8448"));
        assert!(list.allows("@carol:matrix.org:8448"));
        assert!(!list.allows("@carol:matrix.org:443"));
        assert!(!list.allows("@mallory:example.com.evil.org:8448"));
    }

    #[test]
    fn host_strips_port_only() {
        assert_eq!(host("example.com:8448"), "example.com");
        assert_eq!(host("example.com"), "example.com");
        assert_eq!(host("[::1]:8448"), "[::1]");
        assert_eq!(host("[::1]"), "[::1]");
    }

    #[test]
    fn identity_entries_match_exactly() {
        let list = Whitelist::parse("@alice:example.com,,");
        assert!(list.allows("@alice:example.com"));
        assert!(!list.allows("@bob:example.com"));
    }
}
