//! Post-commit maintenance of the game database.
//!
//! Deleting thousands of rows leaves the file fragmented, so the sweep
//! rebuilds it, refreshes the planner statistics and verifies the result.
//! `VACUUM` cannot run inside a transaction and always runs on the pool.

use reclaim_world::MaintenanceReport;
use sqlx::SqlitePool;

use crate::error::DbError;

/// Which maintenance steps run after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MaintenanceOptions {
    /// Rebuild the database file.
    pub vacuum: bool,
    /// Refresh planner statistics.
    pub analyze: bool,
    /// Run `PRAGMA integrity_check`.
    pub integrity_check: bool,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            vacuum: true,
            analyze: true,
            integrity_check: true,
        }
    }
}

/// Run the enabled maintenance steps in order.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if a statement fails and
/// [`DbError::Integrity`] if the integrity check reports problems.
pub async fn maintain(
    pool: &SqlitePool,
    options: MaintenanceOptions,
) -> Result<MaintenanceReport, DbError> {
    let mut report = MaintenanceReport::default();

    if options.vacuum {
        sqlx::query("VACUUM").execute(pool).await?;
        report.vacuumed = true;
    }
    if options.analyze {
        sqlx::query("ANALYZE").execute(pool).await?;
        report.analyzed = true;
    }
    if options.integrity_check {
        let problems: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_all(pool)
            .await?;
        if problems.iter().any(|line| line != "ok") {
            return Err(DbError::Integrity(problems.join("; ")));
        }
        report.integrity_checked = true;
    }

    tracing::debug!(
        vacuumed = report.vacuumed,
        analyzed = report.analyzed,
        integrity_checked = report.integrity_checked,
        "Maintenance completed"
    );
    Ok(report)
}
