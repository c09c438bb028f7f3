//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, ARG_PUBLIC_DIR, finalize, protocol, registry};
use anyhow::Result;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let public_dir = matches
        .get_one::<String>(ARG_PUBLIC_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    let registry_opts = registry::Options::parse(matches);
    let protocol_opts = protocol::Options::parse(matches)?;
    let finalize_opts = finalize::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        public_dir,
        dsn: registry_opts.dsn,
        whitelist: registry_opts.whitelist,
        protocol_url: protocol_opts.url,
        protocol_token: protocol_opts.token,
        protocol_timeout_seconds: protocol_opts.timeout_seconds,
        finalize_max_attempts: finalize_opts.max_attempts,
        finalize_backoff_seconds: finalize_opts.backoff_seconds,
    }))
}
