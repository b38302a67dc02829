//! Error types for the reclaim engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode of a run, from configuration to the pass itself.

/// Top-level error for the reclaim engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: reclaim_core::ConfigError,
    },

    /// Opening or migrating the game database failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: reclaim_db::DbError,
    },

    /// The sweep pass failed.
    #[error("pass error: {source}")]
    Pass {
        /// The underlying pass error.
        #[from]
        source: reclaim_core::PassError,
    },
}
