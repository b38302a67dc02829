//! Error types for the `reclaim-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`].

use reclaim_types::OwnerId;

/// Errors that can occur while sweeping the world state.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A class-match pattern could not be compiled.
    #[error("invalid class pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern as configured.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// The sentinel owner is missing even after it was ensured.
    #[error("sentinel owner {0} does not exist")]
    MissingSentinel(OwnerId),

    /// The sentinel id collides with a character, which cannot collect objects.
    #[error("sentinel owner {0} is a character, expected a guild")]
    SentinelIsCharacter(OwnerId),
}
