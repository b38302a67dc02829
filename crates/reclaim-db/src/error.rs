//! Error types for the SQLite store.
//!
//! Every failure is reported through [`DbError`], which wraps the underlying
//! [`sqlx`] errors and the integrity problems found during maintenance.

/// Errors that can occur in the store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A bookkeeping migration failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// `PRAGMA integrity_check` reported problems.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A count read from the database does not fit the entity type.
    #[error("value out of range in {table}: {value}")]
    OutOfRange {
        /// Table the value came from.
        table: &'static str,
        /// The offending value.
        value: i64,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
