//! [`WorldStore`] over the game database.

use chrono::Utc;
use reclaim_world::{CommitReport, MaintenanceReport, UnitOfWork, WorldState, WorldStore};

use crate::error::DbError;
use crate::flush::flush;
use crate::loader::load_world;
use crate::maintenance::{MaintenanceOptions, maintain};
use crate::sqlite::GameDb;

/// The game database as the sweep sees it.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: GameDb,
    maintenance: MaintenanceOptions,
}

impl SqliteStore {
    /// Wrap an open database.
    pub const fn new(db: GameDb, maintenance: MaintenanceOptions) -> Self {
        Self { db, maintenance }
    }
}

impl WorldStore for SqliteStore {
    type Error = DbError;

    async fn load_world(&mut self) -> Result<WorldState, Self::Error> {
        load_world(self.db.pool()).await
    }

    async fn commit(&mut self, work: UnitOfWork) -> Result<CommitReport, Self::Error> {
        flush(self.db.pool(), &work, Utc::now()).await
    }

    async fn maintain(&mut self) -> Result<MaintenanceReport, Self::Error> {
        maintain(self.db.pool(), self.maintenance).await
    }
}
