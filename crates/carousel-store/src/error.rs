//! Error types for the persistence layer.

/// Errors reported by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply
    #[error("migration {name} failed: {message}")]
    Migration {
        /// Migration name (e.g. `001_create_api_keys`)
        name: String,
        /// Failure description
        message: String,
    },
}

impl StoreError {
    /// Build a migration error
    pub fn migration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Migration {
            name: name.into(),
            message: message.into(),
        }
    }
}
