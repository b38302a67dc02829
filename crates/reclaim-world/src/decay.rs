//! Linear decay of ruins.
//!
//! Every object held by a `Ruins` owner loses health linearly over the purge
//! window, starting when its owner became inactive. Once the window has
//! passed the object is deleted together with the thralls and pets bound to
//! it. Health only ever goes down.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use reclaim_types::{ObjectId, OwnerId};
use tracing::{info, warn};

use crate::lifecycle::Windows;
use crate::session::Session;
use crate::state::WorldState;

/// The instant an object's decay is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOrigin {
    /// Tracked by the ownerless snapshot since this instant, which already
    /// lies past the former owner's inactivity.
    Abandoned(DateTime<Utc>),
    /// The owning character expired in this pass; the object is already past
    /// the purge window.
    Expired,
    /// The owner's last login.
    LastLogin(DateTime<Utc>),
}

impl DecayOrigin {
    /// Pick the origin of `object`, or `None` when neither the snapshot nor
    /// the owner provide a timestamp.
    pub fn of(
        state: &WorldState,
        expired: &BTreeSet<ObjectId>,
        object: ObjectId,
        owner: OwnerId,
    ) -> Option<Self> {
        if let Some(since) = state.ownerless.get(&object) {
            return Some(Self::Abandoned(*since));
        }
        if expired.contains(&object) {
            return Some(Self::Expired);
        }
        state
            .owner(owner)
            .and_then(|o| o.last_login())
            .map(Self::LastLogin)
    }

    /// Time elapsed since the owner counts as inactive.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn time_since_inactive(self, now: DateTime<Utc>, windows: &Windows) -> Duration {
        match self {
            Self::Abandoned(since) => now - since,
            Self::Expired => windows.purge,
            Self::LastLogin(at) => now - at - windows.inactivity,
        }
    }
}

/// Remaining health fraction after `time_since_inactive` of a `purge`
/// window: 1 at the start, 0 or below once the window has passed. Never
/// above 1.
pub fn damage(time_since_inactive: Duration, purge: Duration) -> f64 {
    let window = purge.num_milliseconds();
    if window <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = time_since_inactive.num_milliseconds() as f64 / window as f64;
    (1.0 - ratio).min(1.0)
}

/// Outcome of [`apply_decay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Objects held by ruins that were considered.
    pub examined: usize,
    /// Health parts lowered.
    pub damaged_parts: usize,
    /// Objects deleted.
    pub removed_objects: usize,
    /// Thralls and pets deleted with them.
    pub removed_thralls: usize,
    /// Objects skipped because no origin timestamp exists.
    pub skipped: usize,
}

enum Verdict {
    Remove(BTreeSet<ObjectId>),
    Damage(f64),
}

/// Decay every object whose owner is named `Ruins` and is not whitelisted.
pub fn apply_decay(
    session: &mut Session,
    whitelist: &BTreeSet<OwnerId>,
    windows: &Windows,
) -> DecayReport {
    let mut report = DecayReport::default();
    let verdicts = judge(session, whitelist, windows, &mut report);

    for (id, verdict) in verdicts {
        match verdict {
            Verdict::Damage(ceiling) => {
                let lowered = session.lower_health(id, ceiling);
                report.damaged_parts = report.damaged_parts.saturating_add(lowered);
            }
            Verdict::Remove(thralls) => {
                if let Some(object) = session.state().objects.get(&id) {
                    let teleport = object
                        .position
                        .map(|p| p.teleport_command())
                        .unwrap_or_default();
                    info!(
                        object_id = %id,
                        owner_id = %object.owner_id,
                        class = object.class.as_str(),
                        thralls = thralls.len(),
                        teleport,
                        "removing decayed object"
                    );
                }
                let removed = session.remove_objects([id]);
                report.removed_objects = report.removed_objects.saturating_add(removed);
                if !thralls.is_empty() {
                    report.removed_thralls = report.removed_thralls.saturating_add(thralls.len());
                    session.remove_thrall_links(thralls);
                }
            }
        }
    }

    info!(
        examined = report.examined,
        damaged_parts = report.damaged_parts,
        removed_objects = report.removed_objects,
        removed_thralls = report.removed_thralls,
        skipped = report.skipped,
        "decayed ruins"
    );
    report
}

fn judge(
    session: &Session,
    whitelist: &BTreeSet<OwnerId>,
    windows: &Windows,
    report: &mut DecayReport,
) -> BTreeMap<ObjectId, Verdict> {
    let state = session.state();
    let ruins: BTreeSet<OwnerId> = state
        .characters
        .values()
        .filter(|c| c.is_ruins())
        .map(|c| c.id)
        .chain(state.guilds.values().filter(|g| g.is_ruins()).map(|g| g.id))
        .filter(|id| !whitelist.contains(id))
        .collect();

    let mut verdicts = BTreeMap::new();
    for object in state.objects.values() {
        if !ruins.contains(&object.owner_id) {
            continue;
        }
        report.examined = report.examined.saturating_add(1);
        let origin = DecayOrigin::of(state, session.expired_objects(), object.id, object.owner_id);
        let Some(origin) = origin else {
            warn!(
                object_id = %object.id,
                owner_id = %object.owner_id,
                "ruins owner has no recorded activity, skipping decay"
            );
            report.skipped = report.skipped.saturating_add(1);
            continue;
        };
        let dmg = damage(origin.time_since_inactive(session.now(), windows), windows.purge);
        let verdict = if dmg <= 0.0 {
            Verdict::Remove(state.thralls_linked_to(object.id))
        } else {
            Verdict::Damage(dmg)
        };
        verdicts.insert(object.id, verdict);
    }
    verdicts
}
