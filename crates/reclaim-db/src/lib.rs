//! `SQLite` world store for the reclaim sweep.
//!
//! The game server keeps its world in one `SQLite` file. This crate reads
//! the tables the sweep reasons about into a [`WorldState`], writes a
//! [`UnitOfWork`] back in a single transaction and maintains the file
//! afterwards.
//!
//! ```text
//! run_pass
//!     |
//!     +-- load_world ---> loader       (game tables + bookkeeping)
//!     +-- commit -------> flush        (one transaction)
//!     +-- maintain -----> maintenance  (VACUUM, ANALYZE, integrity_check)
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- Connection pool and bookkeeping migrations
//! - [`loader`] -- Game tables into a [`WorldState`]
//! - [`flush`] -- A [`UnitOfWork`] into the game tables
//! - [`maintenance`] -- Post-commit maintenance
//! - [`store`] -- The [`WorldStore`] implementation
//! - [`error`] -- Shared error types
//!
//! [`WorldState`]: reclaim_world::WorldState
//! [`UnitOfWork`]: reclaim_world::UnitOfWork
//! [`WorldStore`]: reclaim_world::WorldStore

pub mod error;
pub mod flush;
pub mod loader;
pub mod maintenance;
pub mod sqlite;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use maintenance::MaintenanceOptions;
pub use sqlite::{GameDb, SqliteConfig};
pub use store::SqliteStore;
