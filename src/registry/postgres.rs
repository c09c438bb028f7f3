//! Postgres-backed registry.
//!
//! Callers live in `bridge_users`. The whitelist is configuration, not data,
//! so it is evaluated on every lookup instead of being stored.

use super::{CallerRecord, PendingCommand, Registry, Whitelist};
use crate::protocol::Profile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use tracing::{Instrument, info_span};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Debug, Clone)]
pub struct PgRegistry {
    pool: PgPool,
    whitelist: Whitelist,
}

impl PgRegistry {
    #[must_use]
    pub fn new(pool: PgPool, whitelist: Whitelist) -> Self {
        Self { pool, whitelist }
    }

    /// Create `bridge_users` if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "CREATE",
            db.statement = SCHEMA_SQL
        );
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to apply bridge_users schema")?;
        Ok(())
    }
}

#[async_trait]
impl Registry for PgRegistry {
    async fn lookup(&self, identity: &str) -> Result<CallerRecord> {
        if !self.whitelist.allows(identity) {
            return Ok(CallerRecord::denied(identity));
        }

        let query = "SELECT pending_command FROM bridge_users WHERE identity = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up bridge user")?;

        let pending_command = match row {
            Some(row) => row.try_get("pending_command")?,
            None => None,
        };

        Ok(CallerRecord {
            identity: identity.to_string(),
            whitelisted: true,
            pending_command,
        })
    }

    async fn compare_and_set_pending(
        &self,
        identity: &str,
        expected: PendingCommand,
        next: Option<PendingCommand>,
    ) -> Result<bool> {
        let query = r"
            UPDATE bridge_users
            SET pending_command = $3
            WHERE identity = $1
              AND pending_command IS NOT DISTINCT FROM $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(identity)
            .bind(expected.as_str())
            .bind(next.map(PendingCommand::as_str))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update pending command")?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_login(&self, identity: &str, profile: &Profile) -> Result<()> {
        // Only whitelisted callers get this far, so this is where rows are created.
        let query = r"
            INSERT INTO bridge_users (identity, remote_id, remote_username, logged_in_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (identity) DO UPDATE
            SET remote_id = EXCLUDED.remote_id,
                remote_username = EXCLUDED.remote_username,
                logged_in_at = EXCLUDED.logged_in_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity)
            .bind(profile.id)
            .bind(profile.username.as_deref())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login profile")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}
