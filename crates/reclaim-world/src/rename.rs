//! The `Ruins` rename state machine.
//!
//! An owner is either displayed under its real name or as [`RUINS_NAME`].
//! Inactive owners still holding objects become ruins; owners that return or
//! lose every object get their real name back from the name history. When
//! the history has no entry the name stays `Ruins` and a warning is logged.

use std::collections::BTreeSet;

use reclaim_types::{OwnerId, RUINS_NAME};
use tracing::{debug, info, warn};

use crate::inventory::InventoryIndex;
use crate::lifecycle::Thresholds;
use crate::session::Session;
use crate::state::{Activity, login_activity};

/// Outcome of a rename phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// Owners that got their real name back.
    pub restored: usize,
    /// Owners renamed to `Ruins`.
    pub ruined: usize,
    /// Member-less guilds deleted.
    pub deleted_guilds: usize,
    /// Owners that should have been restored but have no history entry.
    pub unrestorable: usize,
}

impl RenameReport {
    fn log(self, phase: &'static str) {
        if self != Self::default() {
            info!(
                phase,
                restored = self.restored,
                ruined = self.ruined,
                deleted_guilds = self.deleted_guilds,
                unrestorable = self.unrestorable,
                "renamed owners"
            );
        }
    }
}

/// Restore the real name of `id` from the name history.
fn restore(session: &mut Session, id: OwnerId, report: &mut RenameReport) {
    let Some(name) = session.state().name_history.get(&id).cloned() else {
        warn!(owner_id = %id, "no name history for ruins owner, keeping placeholder name");
        report.unrestorable = report.unrestorable.saturating_add(1);
        return;
    };
    if session.rename_owner(id, &name) {
        debug!(owner_id = %id, name = name.as_str(), "restored owner name");
        report.restored = report.restored.saturating_add(1);
    }
}

fn ruin(session: &mut Session, id: OwnerId, report: &mut RenameReport) {
    if session.rename_owner(id, RUINS_NAME) {
        report.ruined = report.ruined.saturating_add(1);
    }
}

/// Give every `Ruins`-named owner that is active again its real name back.
/// The sentinel is never touched.
pub fn revert_names(
    session: &mut Session,
    sentinel: OwnerId,
    thresholds: &Thresholds,
) -> RenameReport {
    let returning: Vec<OwnerId> = {
        let state = session.state();
        let characters = state.characters.keys().copied();
        let guilds = state.guilds.keys().copied();
        characters
            .chain(guilds)
            .filter(|id| *id != sentinel)
            .filter_map(|id| state.owner(id))
            .filter(|o| o.is_ruins() && o.activity(thresholds.inactivity) == Activity::Active)
            .map(|o| o.id())
            .collect()
    };

    let mut report = RenameReport::default();
    for id in returning {
        restore(session, id, &mut report);
    }
    report.log("revert");
    report
}

/// Re-evaluate every inactive, non-whitelisted owner outside the sentinel:
/// guildless characters and all guilds. Member-less guilds are deleted,
/// owners without objects get their real name back and owners still holding
/// objects become ruins.
///
/// `index` must reflect the state after quota enforcement and expiry.
pub fn apply_names(
    session: &mut Session,
    sentinel: OwnerId,
    whitelist: &BTreeSet<OwnerId>,
    thresholds: &Thresholds,
    index: &InventoryIndex,
) -> RenameReport {
    let mut report = RenameReport::default();

    let characters: Vec<(OwnerId, bool)> = session
        .state()
        .characters
        .values()
        .filter(|c| !whitelist.contains(&c.id) && c.guild_id.is_none())
        .filter(|c| login_activity(c.last_login, thresholds.inactivity) == Activity::Inactive)
        .map(|c| (c.id, c.is_ruins()))
        .collect();
    for (id, is_ruins) in characters {
        settle_owner(session, id, is_ruins, index.has_tiles(id), &mut report);
    }

    let guilds: Vec<(OwnerId, bool, bool)> = {
        let state = session.state();
        state
            .guilds
            .keys()
            .copied()
            .filter(|id| *id != sentinel && !whitelist.contains(id))
            .filter_map(|id| state.owner(id))
            .filter(|o| o.is_inactive(thresholds.inactivity))
            .map(|o| (o.id(), o.is_ruins(), o.member_count(true, thresholds.inactivity) == 0))
            .collect()
    };
    for (id, is_ruins, memberless) in guilds {
        if memberless {
            if session.delete_guild(id) {
                debug!(guild_id = %id, "deleted member-less guild");
                report.deleted_guilds = report.deleted_guilds.saturating_add(1);
            }
            continue;
        }
        settle_owner(session, id, is_ruins, index.has_tiles(id), &mut report);
    }

    report.log("apply");
    report
}

fn settle_owner(
    session: &mut Session,
    id: OwnerId,
    is_ruins: bool,
    has_tiles: bool,
    report: &mut RenameReport,
) {
    if is_ruins && !has_tiles {
        restore(session, id, report);
    } else if !is_ruins && has_tiles {
        ruin(session, id, report);
    }
}

/// Restore every non-sentinel `Ruins` owner left without objects, typically
/// because decay removed its last structure in this pass. Owners without a
/// history entry keep the placeholder name and are counted as unrestorable.
pub fn settle_names(
    session: &mut Session,
    sentinel: OwnerId,
    index: &InventoryIndex,
) -> RenameReport {
    let emptied: Vec<OwnerId> = {
        let state = session.state();
        let characters = state.characters.values().filter(|c| c.is_ruins()).map(|c| c.id);
        let guilds = state.guilds.values().filter(|g| g.is_ruins()).map(|g| g.id);
        characters
            .chain(guilds)
            .filter(|id| *id != sentinel && !index.has_tiles(*id))
            .collect()
    };

    let mut report = RenameReport::default();
    for id in emptied {
        restore(session, id, &mut report);
    }
    report.log("settle");
    report
}
