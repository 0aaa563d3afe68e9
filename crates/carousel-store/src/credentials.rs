//! Caller API-key persistence and validation.
//!
//! Plaintext keys are shown once at creation and never stored; the table
//! holds a SHA-256 hash plus a short display prefix.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

/// Prefix every issued key carries.
const KEY_PREFIX: &str = "sk-";
/// Random bytes per key; hex-encoded to 64 characters.
const KEY_BYTES: usize = 32;
/// Characters of the plaintext kept for display.
const DISPLAY_CHARS: usize = 7;

/// A stored API key, without hash material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    /// Row id
    pub id: i64,
    /// Display prefix (`sk-xxxx...`)
    pub key_prefix: String,
    /// Optional operator-assigned label
    pub name: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last successful validation, if any
    pub last_used_at: Option<DateTime<Utc>>,
    /// Whether the key is accepted by validation
    pub is_active: bool,
    /// Successful validations so far
    pub usage_count: i64,
}

/// Persistent store for caller API keys.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    /// Create a store over an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mint a new key.
    ///
    /// Returns the plaintext (shown exactly once) and the stored record.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn create(
        &self,
        name: Option<&str>,
    ) -> Result<(String, ApiKeyRecord), StoreError> {
        let mut material = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut material);
        let plaintext = format!("{KEY_PREFIX}{}", hex::encode(material));

        let key_hash = hash_key(&plaintext);
        let key_prefix = format!("{}...", &plaintext[..DISPLAY_CHARS]);
        let created_at = Utc::now();

        let row = sqlx::query(
            "INSERT INTO api_keys (key_hash, key_prefix, name, created_at, is_active, usage_count)
             VALUES (?, ?, ?, ?, 1, 0)
             RETURNING id, key_prefix, name, created_at, last_used_at, is_active, usage_count",
        )
        .bind(&key_hash)
        .bind(&key_prefix)
        .bind(name)
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let record = record_from_row(&row);
        info!(id = record.id, prefix = %record.key_prefix, "API key created");
        Ok((plaintext, record))
    }

    /// Validate a presented key.
    ///
    /// Returns the matching record when the key is known and active, after
    /// atomically bumping its usage statistics. Anything else returns
    /// `None` without touching the store.
    ///
    /// # Errors
    /// Returns an error only on database failure.
    pub async fn validate(&self, presented: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        // Cheap rejection before any hashing.
        if !presented.starts_with(KEY_PREFIX) {
            return Ok(None);
        }

        let key_hash = hash_key(presented);
        let row = sqlx::query(
            "UPDATE api_keys
             SET last_used_at = ?, usage_count = usage_count + 1
             WHERE key_hash = ? AND is_active = 1
             RETURNING id, key_prefix, name, created_at, last_used_at, is_active, usage_count",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| record_from_row(&row)))
    }

    /// List all keys, newest first, without hash material.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, key_prefix, name, created_at, last_used_at, is_active, usage_count
             FROM api_keys ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Deactivate a key; the row is kept.
    ///
    /// Returns whether a row was affected.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn revoke(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            debug!(id, "API key revoked");
        }
        Ok(revoked)
    }

    /// Remove a key entirely.
    ///
    /// Returns whether a row was affected.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(id, "API key deleted");
        }
        Ok(deleted)
    }
}

/// SHA-256 hex digest of a plaintext key.
fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

fn record_from_row(row: &SqliteRow) -> ApiKeyRecord {
    ApiKeyRecord {
        id: row.get("id"),
        key_prefix: row.get("key_prefix"),
        name: row.get("name"),
        created_at: parse_timestamp(row.get("created_at")),
        last_used_at: row
            .get::<Option<String>, _>("last_used_at")
            .map(parse_timestamp),
        is_active: row.get::<i64, _>("is_active") != 0,
        usage_count: row.get("usage_count"),
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
