//! Linear, numbered schema migrations.
//!
//! Applied migrations are recorded by name in `_migrations`; re-running
//! after success is a no-op.

use crate::error::StoreError;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// A single migration: a stable name and its statements, applied in order
/// inside one transaction.
pub struct Migration {
    /// Unique, ordered name (`NNN_description`)
    pub name: &'static str,
    /// DDL statements executed in order
    pub statements: &'static [&'static str],
}

/// All known migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_create_api_keys",
        statements: &[
            "CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key_hash TEXT NOT NULL UNIQUE,
                key_prefix TEXT NOT NULL,
                name TEXT,
                created_at TEXT NOT NULL,
                last_used_at TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                usage_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_api_keys_active ON api_keys(is_active)",
        ],
    },
    Migration {
        name: "002_create_provider_settings",
        statements: &[
            "CREATE TABLE IF NOT EXISTS provider_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_key TEXT NOT NULL UNIQUE,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ],
    },
];

/// Apply every pending migration; returns how many were applied.
///
/// # Errors
/// Returns an error naming the first migration that failed. Migrations
/// already recorded in `_migrations` are skipped.
pub async fn apply_pending(pool: &SqlitePool) -> Result<usize, StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let applied: Vec<String> = sqlx::query("SELECT name FROM _migrations ORDER BY name")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            debug!(name = migration.name, "Migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::migration(migration.name, e.to_string()))?;
        }
        sqlx::query("INSERT INTO _migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration.name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::migration(migration.name, e.to_string()))?;
        tx.commit().await?;

        info!(name = migration.name, "Migration applied");
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_in_memory;

    #[tokio::test]
    async fn test_apply_pending_creates_tables() {
        let pool = connect_in_memory().await.expect("pool");
        let applied = apply_pending(&pool).await.expect("migrate");
        assert_eq!(applied, MIGRATIONS.len());

        // Both tables exist and are queryable.
        sqlx::query("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&pool)
            .await
            .expect("api_keys table");
        sqlx::query("SELECT COUNT(*) FROM provider_settings")
            .fetch_one(&pool)
            .await
            .expect("provider_settings table");
    }

    #[tokio::test]
    async fn test_apply_pending_is_idempotent() {
        let pool = connect_in_memory().await.expect("pool");
        assert_eq!(apply_pending(&pool).await.expect("first"), MIGRATIONS.len());
        assert_eq!(apply_pending(&pool).await.expect("second"), 0);
    }

    #[tokio::test]
    async fn test_migration_names_are_ordered_and_unique() {
        let names: Vec<_> = MIGRATIONS.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
