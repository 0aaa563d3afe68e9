//! Per-provider enable flag and priority persistence.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

/// A provider's stored setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSetting {
    /// Row id
    pub id: i64,
    /// Stable provider key (e.g. `cerebras`)
    pub provider_key: String,
    /// Whether the provider may serve requests
    pub is_enabled: bool,
    /// Ascending dispatch order; ties resolved by insertion order
    pub priority: i64,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Persistent store for provider settings.
#[derive(Clone)]
pub struct ProviderSettingsStore {
    pool: SqlitePool,
}

impl ProviderSettingsStore {
    /// Create a store over an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure every known provider has a row.
    ///
    /// Missing rows are created enabled, with priority one past the current
    /// maximum, in the order given.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn sync_known(&self, provider_keys: &[&str]) -> Result<(), StoreError> {
        for key in provider_keys {
            let now = Utc::now().to_rfc3339();
            let result = sqlx::query(
                "INSERT INTO provider_settings (provider_key, is_enabled, priority, created_at, updated_at)
                 SELECT ?, 1, COALESCE((SELECT MAX(priority) FROM provider_settings), -1) + 1, ?, ?
                 WHERE NOT EXISTS (SELECT 1 FROM provider_settings WHERE provider_key = ?)",
            )
            .bind(key)
            .bind(&now)
            .bind(&now)
            .bind(key)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                debug!(provider = key, "Provider settings row created");
            }
        }
        Ok(())
    }

    /// All settings, ordered by priority then insertion order.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_all(&self) -> Result<Vec<ProviderSetting>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, provider_key, is_enabled, priority, created_at, updated_at
             FROM provider_settings ORDER BY priority ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(setting_from_row).collect())
    }

    /// A single provider's setting, if present.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn get(&self, provider_key: &str) -> Result<Option<ProviderSetting>, StoreError> {
        let row = sqlx::query(
            "SELECT id, provider_key, is_enabled, priority, created_at, updated_at
             FROM provider_settings WHERE provider_key = ?",
        )
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(setting_from_row))
    }

    /// Enable or disable a provider. Returns whether a row was affected.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn set_enabled(&self, provider_key: &str, enabled: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE provider_settings SET is_enabled = ?, updated_at = ? WHERE provider_key = ?",
        )
        .bind(i64::from(enabled))
        .bind(Utc::now().to_rfc3339())
        .bind(provider_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change a provider's priority. Returns whether a row was affected.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn set_priority(&self, provider_key: &str, priority: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE provider_settings SET priority = ?, updated_at = ? WHERE provider_key = ?",
        )
        .bind(priority)
        .bind(Utc::now().to_rfc3339())
        .bind(provider_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn setting_from_row(row: &SqliteRow) -> ProviderSetting {
    ProviderSetting {
        id: row.get("id"),
        provider_key: row.get("provider_key"),
        is_enabled: row.get::<i64, _>("is_enabled") != 0,
        priority: row.get("priority"),
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_in_memory, migrations::apply_pending};

    async fn store() -> ProviderSettingsStore {
        let pool = connect_in_memory().await.expect("pool");
        apply_pending(&pool).await.expect("migrate");
        ProviderSettingsStore::new(pool)
    }

    #[tokio::test]
    async fn test_sync_known_assigns_insertion_order() {
        let store = store().await;
        store
            .sync_known(&["cerebras", "groq", "gemini"])
            .await
            .expect("sync");

        let settings = store.get_all().await.expect("get_all");
        assert_eq!(settings.len(), 3);
        assert_eq!(settings[0].provider_key, "cerebras");
        assert_eq!(settings[0].priority, 0);
        assert_eq!(settings[1].priority, 1);
        assert_eq!(settings[2].priority, 2);
        assert!(settings.iter().all(|s| s.is_enabled));
    }

    #[tokio::test]
    async fn test_sync_known_is_idempotent() {
        let store = store().await;
        store.sync_known(&["cerebras", "groq"]).await.expect("sync");
        store.set_enabled("groq", false).await.expect("disable");

        store.sync_known(&["cerebras", "groq"]).await.expect("resync");
        let groq = store.get("groq").await.expect("get").expect("row");
        assert!(!groq.is_enabled);
        assert_eq!(store.get_all().await.expect("get_all").len(), 2);
    }

    #[tokio::test]
    async fn test_sync_appends_new_providers_after_existing() {
        let store = store().await;
        store.sync_known(&["cerebras"]).await.expect("sync");
        store.set_priority("cerebras", 9).await.expect("bump");
        store.sync_known(&["cerebras", "groq"]).await.expect("sync");

        let groq = store.get("groq").await.expect("get").expect("row");
        assert_eq!(groq.priority, 10);
    }

    #[tokio::test]
    async fn test_get_all_orders_by_priority() {
        let store = store().await;
        store
            .sync_known(&["cerebras", "groq", "gemini"])
            .await
            .expect("sync");
        store.set_priority("gemini", -5).await.expect("priority");

        let settings = store.get_all().await.expect("get_all");
        assert_eq!(settings[0].provider_key, "gemini");
    }

    #[tokio::test]
    async fn test_set_enabled_unknown_provider() {
        let store = store().await;
        assert!(!store.set_enabled("nope", true).await.expect("update"));
        assert!(!store.set_priority("nope", 3).await.expect("update"));
    }
}
