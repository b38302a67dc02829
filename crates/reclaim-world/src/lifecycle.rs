//! Owner lifecycle: time windows, character classification and expiry.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use reclaim_types::{Character, OwnerId};
use tracing::{debug, info};

use crate::session::Session;
use crate::state::{Activity, WorldState, login_activity};

/// The configured time windows of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Owners idle for longer than this are inactive.
    pub inactivity: Duration,
    /// Characters idle for longer than this are deleted.
    pub long_inactive: Duration,
    /// Time over which an abandoned structure decays from full health to
    /// removal.
    pub purge: Duration,
    /// Event-log rows older than this are deleted.
    pub event_log_retention: Duration,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            inactivity: Duration::days(14),
            long_inactive: Duration::days(30),
            purge: Duration::days(5),
            event_log_retention: Duration::days(7),
        }
    }
}

/// Absolute boundaries derived from [`Windows`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// The instant the boundaries were derived from.
    pub now: DateTime<Utc>,
    /// Logins at or before this are inactive.
    pub inactivity: DateTime<Utc>,
    /// Logins at or before this expire the character.
    pub long_inactive: DateTime<Utc>,
    /// Event-log rows at or before this are deleted.
    pub event_log: DateTime<Utc>,
}

impl Thresholds {
    /// Subtract every window from `now`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn derive(now: DateTime<Utc>, windows: &Windows) -> Self {
        Self {
            now,
            inactivity: now - windows.inactivity,
            long_inactive: now - windows.long_inactive,
            event_log: now - windows.event_log_retention,
        }
    }
}

/// Lifecycle state of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Logged in after the inactivity boundary.
    Active,
    /// Idle past the inactivity boundary but not yet expired.
    Inactive,
    /// Idle past the long-inactive boundary.
    Expired,
    /// No login recorded.
    Unknown,
}

/// Classify one character.
pub fn classify_character(character: &Character, thresholds: &Thresholds) -> Lifecycle {
    match login_activity(character.last_login, thresholds.inactivity) {
        Activity::Active => Lifecycle::Active,
        Activity::Unknown => Lifecycle::Unknown,
        Activity::Inactive => match login_activity(character.last_login, thresholds.long_inactive) {
            Activity::Inactive => Lifecycle::Expired,
            _ => Lifecycle::Inactive,
        },
    }
}

/// Number of characters in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    /// Active characters.
    pub active: usize,
    /// Inactive characters.
    pub inactive: usize,
    /// Characters due for expiry (whitelisted ones included).
    pub expired: usize,
    /// Characters without a recorded login.
    pub unknown: usize,
}

/// Count the characters of `state` by lifecycle state.
pub fn classify(state: &WorldState, thresholds: &Thresholds) -> Classification {
    let mut counts = Classification::default();
    for character in state.characters.values() {
        let slot = match classify_character(character, thresholds) {
            Lifecycle::Active => &mut counts.active,
            Lifecycle::Inactive => &mut counts.inactive,
            Lifecycle::Expired => &mut counts.expired,
            Lifecycle::Unknown => &mut counts.unknown,
        };
        *slot = slot.saturating_add(1);
    }
    counts
}

/// Outcome of [`expire_characters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    /// Characters deleted.
    pub characters: usize,
    /// Accounts put on the downstream deletion list.
    pub queued_accounts: usize,
    /// Objects left behind by the deleted characters.
    pub orphaned_objects: usize,
}

/// Delete every non-whitelisted character idle past the long-inactive
/// boundary. Their objects are marked so the ownerless snapshot anchors them
/// past the purge window, and their accounts are queued for downstream
/// deletion.
pub fn expire_characters(
    session: &mut Session,
    thresholds: &Thresholds,
    whitelist: &BTreeSet<OwnerId>,
) -> ExpiryReport {
    let expired: Vec<(OwnerId, String, String)> = session
        .state()
        .characters
        .values()
        .filter(|c| !whitelist.contains(&c.id))
        .filter(|c| classify_character(c, thresholds) == Lifecycle::Expired)
        .map(|c| (c.id, c.player_id.clone(), c.name.clone()))
        .collect();

    let mut report = ExpiryReport::default();
    for (id, player_id, name) in &expired {
        let objects = session.state().objects_of(*id);
        debug!(
            character_id = %id,
            character = name.as_str(),
            objects = objects.len(),
            "expiring character"
        );
        report.orphaned_objects = report.orphaned_objects.saturating_add(objects.len());
        session.mark_expired_objects(objects);
        session.queue_account_deletion(player_id, name);
    }
    report.queued_accounts = session.pending().account_deletion_queue.len();

    let removed = session.remove_characters(expired.into_iter().map(|(id, ..)| id), whitelist);
    report.characters = removed.len();
    if report.characters > 0 {
        info!(
            characters = report.characters,
            orphaned_objects = report.orphaned_objects,
            "expired long-inactive characters"
        );
    }
    report
}
