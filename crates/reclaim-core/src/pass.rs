//! One complete sweep against a store: load, run the phases, commit once,
//! then maintain.
//!
//! Anything that fails before the commit aborts the pass with nothing
//! written. A maintenance failure is reported after the commit has already
//! succeeded; the commit stays in place.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use reclaim_world::{CommitReport, MaintenanceReport, Session, WorldError, WorldStore};
use tracing::{error, info};

use crate::pipeline::{PassSummary, SweepParams, run_phases};

/// Boxed error raised by a store.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can end a pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The world could not be read. Nothing was written.
    #[error("failed to load world: {source}")]
    Load {
        /// The underlying store error.
        source: StoreError,
    },

    /// A phase failed. Nothing was written.
    #[error("sweep aborted: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// The commit failed and was rolled back.
    #[error("failed to commit sweep: {source}")]
    Commit {
        /// The underlying store error.
        source: StoreError,
    },

    /// Maintenance failed after a successful commit.
    #[error("maintenance failed after commit of {committed} rows: {source}")]
    Maintenance {
        /// Rows written by the commit that preceded the failure.
        committed: u64,
        /// The underlying store error.
        source: StoreError,
    },
}

/// Result of a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// Per-phase outcome.
    pub summary: PassSummary,
    /// What the commit wrote.
    pub commit: CommitReport,
    /// Maintenance steps that ran.
    pub maintenance: MaintenanceReport,
}

/// Run one full pass at instant `now`.
///
/// # Errors
///
/// Returns [`PassError`] if loading, a phase, the commit or maintenance
/// fails. Only a [`PassError::Maintenance`] leaves committed changes behind.
pub async fn run_pass<S, R>(
    store: &mut S,
    params: &SweepParams,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<PassOutcome, PassError>
where
    S: WorldStore,
    R: Rng + ?Sized,
{
    let started = Instant::now();

    let state = store.load_world().await.map_err(|e| PassError::Load {
        source: Box::new(e),
    })?;
    info!(
        characters = state.characters.len(),
        guilds = state.guilds.len(),
        objects = state.objects.len(),
        thrall_links = state.thrall_links.len(),
        "world loaded"
    );

    let mut session = Session::new(state, now);
    let summary = run_phases(&mut session, params, rng)?;
    let (_, work) = session.into_parts();

    let commit = store.commit(work).await.map_err(|e| PassError::Commit {
        source: Box::new(e),
    })?;
    info!(
        rows_affected = commit.rows_affected,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "sweep committed"
    );

    let maintenance = match store.maintain().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "maintenance failed after commit");
            return Err(PassError::Maintenance {
                committed: commit.rows_affected,
                source: Box::new(e),
            });
        }
    };
    info!(
        vacuumed = maintenance.vacuumed,
        analyzed = maintenance.analyzed,
        integrity_checked = maintenance.integrity_checked,
        "maintenance finished"
    );

    Ok(PassOutcome {
        summary,
        commit,
        maintenance,
    })
}
