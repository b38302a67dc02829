//! The sentinel owner and the ownerless funnel.
//!
//! Every object without a living owner ends up held by one reserved guild,
//! the sentinel. Its name is always `Ruins`, so its objects decay like any
//! other ruin.

use chrono::{DateTime, Utc};
use reclaim_types::{OwnerId, RUINS_NAME};
use tracing::{debug, info, warn};

use crate::error::WorldError;
use crate::session::Session;
use crate::snapshot::refresh_ownerless;

/// What [`ensure_sentinel`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelStatus {
    /// The sentinel guild existed under its proper name.
    Present,
    /// The sentinel guild was missing and has been created.
    Created,
    /// The sentinel guild had been renamed and got its name back.
    Renamed,
}

/// Make sure the sentinel guild exists and is named `Ruins`.
///
/// # Errors
///
/// Returns [`WorldError::SentinelIsCharacter`] if the id belongs to a
/// character.
pub fn ensure_sentinel(
    session: &mut Session,
    sentinel: OwnerId,
) -> Result<SentinelStatus, WorldError> {
    if session.state().characters.contains_key(&sentinel) {
        return Err(WorldError::SentinelIsCharacter(sentinel));
    }
    let Some(guild) = session.state().guilds.get(&sentinel) else {
        warn!(sentinel_id = %sentinel, "sentinel guild missing, creating it");
        session.create_guild(sentinel, RUINS_NAME);
        return Ok(SentinelStatus::Created);
    };
    if guild.is_ruins() {
        return Ok(SentinelStatus::Present);
    }
    warn!(
        sentinel_id = %sentinel,
        name = guild.name.as_str(),
        "sentinel guild was renamed, restoring its name"
    );
    session.rename_owner(sentinel, RUINS_NAME);
    Ok(SentinelStatus::Renamed)
}

/// Outcome of [`reclaim_ownerless`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Objects tracked by the ownerless snapshot after the refresh.
    pub tracked: usize,
    /// Objects handed to the sentinel.
    pub reassigned: usize,
}

/// Refresh the ownerless snapshot and hand every tracked object that the
/// sentinel does not hold yet to the sentinel. Running it again without new
/// abandoned objects changes nothing.
///
/// `forced_since` stamps objects of characters expired in this pass.
///
/// # Errors
///
/// Returns [`WorldError::MissingSentinel`] if the sentinel guild does not
/// exist.
pub fn reclaim_ownerless(
    session: &mut Session,
    sentinel: OwnerId,
    forced_since: DateTime<Utc>,
) -> Result<ReclaimReport, WorldError> {
    if !session.state().guilds.contains_key(&sentinel) {
        return Err(WorldError::MissingSentinel(sentinel));
    }
    refresh_ownerless(session, sentinel, forced_since);

    let pending: Vec<_> = {
        let state = session.state();
        state
            .ownerless
            .keys()
            .filter(|id| state.objects.get(id).is_some_and(|o| o.owner_id != sentinel))
            .copied()
            .collect()
    };

    let mut report = ReclaimReport {
        tracked: session.state().ownerless.len(),
        reassigned: 0,
    };
    for id in pending {
        if session.reassign_object(id, sentinel) {
            debug!(object_id = %id, sentinel_id = %sentinel, "reclaimed ownerless object");
            report.reassigned = report.reassigned.saturating_add(1);
        }
    }
    if report.reassigned > 0 {
        info!(
            tracked = report.tracked,
            reassigned = report.reassigned,
            "reclaimed ownerless objects"
        );
    }
    Ok(report)
}
