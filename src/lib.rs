//! # Passage (bridge login handshake)
//!
//! `passage` lets the owner of a bridged account finish the third-party
//! login handshake from a browser instead of a native client.
//!
//! ## Handshake
//!
//! The remote account provider expects three steps, driven one HTTP request
//! at a time:
//!
//! 1. **Phone:** the caller submits a phone number and the provider sends a
//!    one-time code.
//! 2. **Code:** the caller submits the code. Accounts without two-factor
//!    authentication are logged in at this point.
//! 3. **Password:** accounts with two-factor authentication submit their
//!    password to finish.
//!
//! The step is inferred from the submitted form fields, not from a stored
//! session: the remote protocol client owns the session and knows which step
//! it expects next.
//!
//! ## Pending Commands
//!
//! A login may also be driven from the bridge's chat interface. The caller
//! record carries a `pending_command` marker (`Login` or
//! `Login (password entry)`) that is moved forward or cleared with
//! compare-and-set updates as the web handshake progresses, so the two
//! surfaces never clobber each other.
//!
//! ## Errors
//!
//! Named provider failures are surfaced with a tailored message and a 4xx
//! status. Anything else is reported as a generic 500; the cause is logged
//! and never echoed to the caller.

pub mod api;
pub mod cli;
pub mod finalize;
pub mod handshake;
pub mod protocol;
pub mod registry;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
