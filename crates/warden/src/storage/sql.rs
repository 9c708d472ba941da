//! SQLite-backed storage via sqlx.
//!
//! Tables:
//! - `linked_accounts`: Discord user id -> Roblox user id and username
//! - `shift_logs`: shift start/end records per Discord user

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::account_link::{AccountLinkStore, LinkedAccount};
use crate::error::WardenError;
use crate::shift_ledger::{ShiftEnd, ShiftLedger, ShiftRecord};
use crate::types::{ExternalId, GameId};

/// Open (creating if missing) the SQLite database at `path`.
///
/// `sqlite::memory:` is accepted; the pool is then pinned to one connection
/// so every query sees the same in-memory database.
pub async fn connect(path: &str) -> Result<SqlitePool, WardenError> {
    let in_memory = path == ":memory:" || path.starts_with("sqlite::memory:");
    let url = if path == ":memory:" {
        "sqlite::memory:".to_string()
    } else if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}")
    };
    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|e| WardenError::persistence(format!("invalid database path '{path}'"), e))?
        .create_if_missing(true);
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };
    pool_options
        .connect_with(options)
        .await
        .map_err(|e| WardenError::persistence(format!("failed to open database '{path}'"), e))
}

/// Run database migrations. Safe to call multiple times.
pub async fn migrate(pool: &SqlitePool) -> Result<(), WardenError> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| WardenError::PersistenceError {
            reason: format!("migration failed: {e}"),
            source: Some(Box::new(e)),
        })
}

/// SQLite-backed [`AccountLinkStore`].
#[derive(Clone)]
pub struct SqlAccountLinkStore {
    pool: SqlitePool,
}

impl SqlAccountLinkStore {
    /// Create a store over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn linked_account_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LinkedAccount, WardenError> {
    let read = |column: &str| -> Result<String, WardenError> {
        row.try_get(column)
            .map_err(|e| WardenError::persistence(format!("failed to read '{column}' column"), e))
    };
    Ok(LinkedAccount {
        external_id: ExternalId::new(read("discord_id")?),
        game_id: GameId::new(read("roblox_id")?),
        game_display_name: read("roblox_username")?,
    })
}

#[async_trait]
impl AccountLinkStore for SqlAccountLinkStore {
    async fn lookup_by_game_id(
        &self,
        game_id: &GameId,
    ) -> Result<Option<LinkedAccount>, WardenError> {
        // Several members may claim the same game account; the latest link wins.
        let row = sqlx::query(
            "SELECT discord_id, roblox_id, roblox_username FROM linked_accounts
             WHERE roblox_id = ?1 ORDER BY linked_at DESC LIMIT 1",
        )
        .bind(game_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WardenError::persistence("linked account lookup failed", e))?;
        row.as_ref().map(linked_account_from_row).transpose()
    }

    async fn lookup_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<LinkedAccount>, WardenError> {
        let row = sqlx::query(
            "SELECT discord_id, roblox_id, roblox_username FROM linked_accounts
             WHERE discord_id = ?1",
        )
        .bind(external_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WardenError::persistence("linked account lookup failed", e))?;
        row.as_ref().map(linked_account_from_row).transpose()
    }

    async fn upsert(
        &self,
        external_id: &ExternalId,
        game_id: &GameId,
        display_name: &str,
    ) -> Result<(), WardenError> {
        sqlx::query(
            "INSERT INTO linked_accounts (discord_id, roblox_id, roblox_username, linked_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (discord_id) DO UPDATE SET
                roblox_id = excluded.roblox_id,
                roblox_username = excluded.roblox_username,
                linked_at = excluded.linked_at",
        )
        .bind(external_id.as_ref())
        .bind(game_id.as_ref())
        .bind(display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| WardenError::persistence("linked account upsert failed", e))?;
        Ok(())
    }
}

/// SQLite-backed [`ShiftLedger`].
#[derive(Clone)]
pub struct SqlShiftLedger {
    pool: SqlitePool,
}

impl SqlShiftLedger {
    /// Create a ledger over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftLedger for SqlShiftLedger {
    async fn start_shift(&self, external_id: &ExternalId) -> Result<i64, WardenError> {
        let result = sqlx::query(
            "INSERT INTO shift_logs (discord_id, start_time, end_time) VALUES (?1, ?2, NULL)",
        )
        .bind(external_id.as_ref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| WardenError::persistence("shift start failed", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn end_shift(&self, external_id: &ExternalId) -> Result<ShiftEnd, WardenError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WardenError::persistence("shift end: failed to begin transaction", e))?;
        let now = Utc::now();

        let open: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM shift_logs WHERE discord_id = ?1 AND end_time IS NULL
             ORDER BY start_time DESC, id DESC LIMIT 1",
        )
        .bind(external_id.as_ref())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| WardenError::persistence("shift end: open shift lookup failed", e))?;

        let outcome = match open {
            Some(id) => {
                sqlx::query("UPDATE shift_logs SET end_time = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| WardenError::persistence("shift end: update failed", e))?;
                ShiftEnd::Closed { id }
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO shift_logs (discord_id, start_time, end_time) VALUES (?1, ?2, ?2)",
                )
                .bind(external_id.as_ref())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| WardenError::persistence("shift end: insert failed", e))?;
                ShiftEnd::RecordedEmpty {
                    id: result.last_insert_rowid(),
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| WardenError::persistence("shift end: commit failed", e))?;
        Ok(outcome)
    }

    async fn list_shifts(&self) -> Result<Vec<ShiftRecord>, WardenError> {
        let rows = sqlx::query(
            "SELECT id, discord_id, start_time, end_time FROM shift_logs
             ORDER BY start_time DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WardenError::persistence("shift listing failed", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row
                    .try_get("id")
                    .map_err(|e| WardenError::persistence("failed to read 'id' column", e))?;
                let discord_id: String = row.try_get("discord_id").map_err(|e| {
                    WardenError::persistence("failed to read 'discord_id' column", e)
                })?;
                let start_time: DateTime<Utc> = row.try_get("start_time").map_err(|e| {
                    WardenError::persistence("failed to read 'start_time' column", e)
                })?;
                let end_time: Option<DateTime<Utc>> = row.try_get("end_time").map_err(|e| {
                    WardenError::persistence("failed to read 'end_time' column", e)
                })?;
                Ok(ShiftRecord {
                    id,
                    external_id: ExternalId::new(discord_id),
                    start_time,
                    end_time,
                })
            })
            .collect()
    }
}
