//! The persistence seam of a sweep.
//!
//! A [`WorldStore`] loads the whole world once, accepts exactly one
//! [`UnitOfWork`] per pass and runs maintenance afterwards. The SQLite
//! implementation lives in `reclaim-db`; tests use an in-memory one.

use std::future::Future;

use crate::state::WorldState;
use crate::unit_of_work::UnitOfWork;

/// Rows touched by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Rows inserted, updated or deleted across all tables.
    pub rows_affected: u64,
}

/// Maintenance steps that ran after a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// The database file was rebuilt.
    pub vacuumed: bool,
    /// Planner statistics were refreshed.
    pub analyzed: bool,
    /// The integrity check ran and reported no problems.
    pub integrity_checked: bool,
}

/// Source and sink of the world state.
pub trait WorldStore {
    /// Error reported by the backing store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read every table the sweep needs, including both snapshots.
    fn load_world(&mut self) -> impl Future<Output = Result<WorldState, Self::Error>> + Send;

    /// Persist `work` atomically. On error nothing is written.
    fn commit(
        &mut self,
        work: UnitOfWork,
    ) -> impl Future<Output = Result<CommitReport, Self::Error>> + Send;

    /// Rebuild, analyze and verify the store. Runs after a commit.
    fn maintain(&mut self) -> impl Future<Output = Result<MaintenanceReport, Self::Error>> + Send;
}
