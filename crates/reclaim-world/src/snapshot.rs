//! Refreshable snapshot indices persisted between passes.
//!
//! - The **name history** remembers the last real name of every owner, so a
//!   `Ruins` owner can get its name back when it returns or runs out of
//!   structures.
//! - The **ownerless snapshot** remembers when each object was first seen
//!   without a living owner (unowned value, deleted owner, or already held by
//!   the sentinel). Its timestamps anchor decay for those objects.
//!
//! Both are refreshed from the current session state right before they are
//! consulted, and only their differences go into the unit of work.

use chrono::{DateTime, Utc};
use reclaim_types::{OwnerId, RUINS_NAME};
use tracing::debug;

use crate::session::Session;
use crate::state::WorldState;

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotDelta {
    /// Entries that were not tracked before.
    pub added: usize,
    /// Entries whose value changed.
    pub updated: usize,
    /// Entries dropped.
    pub removed: usize,
}

/// Record the current real name of every owner except the sentinel and
/// owners currently named `Ruins`. Entries of owners that no longer exist
/// are pruned.
pub fn refresh_name_history(session: &mut Session, sentinel: OwnerId) -> SnapshotDelta {
    let current: Vec<(OwnerId, String)> = {
        let state = session.state();
        let characters = state.characters.values().map(|c| (c.id, c.name.as_str()));
        let guilds = state.guilds.values().map(|g| (g.id, g.name.as_str()));
        characters
            .chain(guilds)
            .filter(|(id, name)| *id != sentinel && *name != RUINS_NAME)
            .map(|(id, name)| (id, name.to_owned()))
            .collect()
    };

    let (state, pending) = session.parts_mut();
    let mut delta = SnapshotDelta::default();

    for (id, name) in current {
        match state.name_history.get(&id) {
            Some(known) if *known == name => {}
            Some(_) => {
                delta.updated = delta.updated.saturating_add(1);
                pending.name_history_upserts.insert(id, name.clone());
                state.name_history.insert(id, name);
            }
            None => {
                delta.added = delta.added.saturating_add(1);
                pending.name_history_upserts.insert(id, name.clone());
                state.name_history.insert(id, name);
            }
        }
    }

    let stale: Vec<OwnerId> = state
        .name_history
        .keys()
        .copied()
        .filter(|id| !state.characters.contains_key(id) && !state.guilds.contains_key(id))
        .collect();
    for id in stale {
        state.name_history.remove(&id);
        pending.name_history_upserts.remove(&id);
        pending.name_history_removals.insert(id);
        delta.removed = delta.removed.saturating_add(1);
    }

    debug!(
        added = delta.added,
        updated = delta.updated,
        removed = delta.removed,
        "refreshed name history"
    );
    delta
}

/// Whether an object held by `owner` counts as ownerless.
pub fn is_ownerless(state: &WorldState, owner: OwnerId, sentinel: OwnerId) -> bool {
    owner.is_unowned() || owner == sentinel || !state.owner_exists(owner)
}

/// Track every ownerless object. Already tracked objects keep their
/// timestamp; new ones are stamped with the session's `now`, except objects
/// of characters expired in this pass, which are stamped `forced_since`.
/// Entries for objects that are gone or have a living owner again are
/// dropped.
pub fn refresh_ownerless(
    session: &mut Session,
    sentinel: OwnerId,
    forced_since: DateTime<Utc>,
) -> SnapshotDelta {
    let now = session.now();
    let expired = session.expired_objects().clone();
    let (state, pending) = session.parts_mut();
    let mut delta = SnapshotDelta::default();

    let ownerless: Vec<_> = state
        .objects
        .values()
        .filter(|o| is_ownerless(state, o.owner_id, sentinel))
        .map(|o| o.id)
        .collect();

    for id in &ownerless {
        if state.ownerless.contains_key(id) {
            continue;
        }
        let since = if expired.contains(id) { forced_since } else { now };
        state.ownerless.insert(*id, since);
        pending.ownerless_removals.remove(id);
        pending.ownerless_upserts.insert(*id, since);
        delta.added = delta.added.saturating_add(1);
    }

    let keep: std::collections::BTreeSet<_> = ownerless.into_iter().collect();
    let stale: Vec<_> = state
        .ownerless
        .keys()
        .copied()
        .filter(|id| !keep.contains(id))
        .collect();
    for id in stale {
        state.ownerless.remove(&id);
        pending.ownerless_upserts.remove(&id);
        pending.ownerless_removals.insert(id);
        delta.removed = delta.removed.saturating_add(1);
    }

    debug!(
        tracked = state.ownerless.len(),
        added = delta.added,
        removed = delta.removed,
        "refreshed ownerless snapshot"
    );
    delta
}
