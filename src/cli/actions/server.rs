use crate::{
    api,
    cli::telemetry,
    finalize::{FinalizeConfig, RecordProfile, spawn_worker},
    handshake::Orchestrator,
    protocol::{AuthProtocol, GatewayClient, GatewayConfig},
    registry::{MemoryRegistry, PgRegistry, Registry, Whitelist},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub public_dir: Option<PathBuf>,
    pub dsn: Option<String>,
    pub whitelist: String,
    pub protocol_url: String,
    pub protocol_token: Option<SecretString>,
    pub protocol_timeout_seconds: u64,
    pub finalize_max_attempts: u32,
    pub finalize_backoff_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the gateway config is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let whitelist = Whitelist::parse(&args.whitelist);
    if whitelist.is_empty() {
        warn!("Whitelist is empty, every login attempt will be refused");
    }

    let registry: Arc<dyn Registry> = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;

            let registry = PgRegistry::new(pool, whitelist);
            registry
                .ensure_schema()
                .await
                .context("Failed to prepare registry schema")?;
            Arc::new(registry)
        }
        None => {
            warn!("No DSN given, caller registry is kept in memory");
            Arc::new(MemoryRegistry::new(whitelist))
        }
    };

    let gateway = GatewayConfig::new(&args.protocol_url)?
        .with_token(args.protocol_token)
        .with_timeout_seconds(args.protocol_timeout_seconds);
    let protocol: Arc<dyn AuthProtocol> = Arc::new(GatewayClient::new(gateway)?);

    let finalize = FinalizeConfig::new()
        .with_max_attempts(args.finalize_max_attempts)
        .with_backoff_base_seconds(args.finalize_backoff_seconds);
    let (post_login, worker) = spawn_worker(Arc::new(RecordProfile::new(registry.clone())), finalize);

    let orchestrator = Arc::new(Orchestrator::new(registry.clone(), protocol, post_login));
    let app = api::router(orchestrator, registry, args.public_dir);

    let result = api::new(args.port, app).await;

    // Dropping the router closes the queue; the worker returns once in-flight jobs finish.
    if let Err(err) = worker.await {
        warn!("post-login worker ended abnormally: {err}");
    }
    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("whitelist", args.whitelist.clone()),
        ("protocol_url", args.protocol_url.clone()),
        (
            "protocol_token_set",
            args.protocol_token.is_some().to_string(),
        ),
        (
            "protocol_timeout_seconds",
            args.protocol_timeout_seconds.to_string(),
        ),
        (
            "public_dir",
            args.public_dir
                .as_ref()
                .map_or_else(|| "none".to_string(), |dir| dir.display().to_string()),
        ),
        (
            "finalize_max_attempts",
            args.finalize_max_attempts.to_string(),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
