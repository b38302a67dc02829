//! Pending mutations of one sweep, keyed by entity id.
//!
//! The [`UnitOfWork`] is the only thing a store needs to persist a pass.
//! Entries are keyed so that a later mutation of the same entity replaces an
//! earlier one, and a deletion cancels whatever was pending for the entity.
//! [`Session`](crate::session::Session) keeps these rules; the store writes
//! the result in one transaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use reclaim_types::{Guild, ObjectId, OwnerId};

/// Primary key of a `buildable_health` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HealthKey {
    /// Object the part belongs to.
    pub object_id: ObjectId,
    /// Building instance of the part.
    pub instance_id: i64,
    /// Template of the part.
    pub template_id: i64,
}

/// Every change a pass wants to make, waiting for the single commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    /// Event-log rows at or before this instant are deleted.
    pub event_log_cutoff: Option<DateTime<Utc>>,
    /// Guilds to insert (the sentinel, when missing).
    pub created_guilds: BTreeMap<OwnerId, Guild>,
    /// New display names of existing characters.
    pub character_renames: BTreeMap<OwnerId, String>,
    /// New display names of existing guilds.
    pub guild_renames: BTreeMap<OwnerId, String>,
    /// Characters to delete together with their dependent rows.
    pub deleted_characters: BTreeSet<OwnerId>,
    /// Accounts left without any character.
    pub deleted_accounts: BTreeSet<String>,
    /// Guilds to delete.
    pub deleted_guilds: BTreeSet<OwnerId>,
    /// Buildable objects to delete together with their dependent rows.
    pub deleted_objects: BTreeSet<ObjectId>,
    /// Thralls and pets to delete together with their dependent rows.
    pub deleted_thralls: BTreeSet<ObjectId>,
    /// New owner of reassigned objects.
    pub reassigned_objects: BTreeMap<ObjectId, OwnerId>,
    /// New health fraction of lowered parts.
    pub health_updates: BTreeMap<HealthKey, f64>,
    /// Name-history entries to insert or overwrite.
    pub name_history_upserts: BTreeMap<OwnerId, String>,
    /// Name-history entries to drop.
    pub name_history_removals: BTreeSet<OwnerId>,
    /// Ownerless-snapshot entries to insert or overwrite.
    pub ownerless_upserts: BTreeMap<ObjectId, DateTime<Utc>>,
    /// Ownerless-snapshot entries to drop.
    pub ownerless_removals: BTreeSet<ObjectId>,
    /// Player accounts handed to the downstream deletion list, with the name
    /// of the character that triggered it.
    pub account_deletion_queue: BTreeMap<String, String>,
}

impl UnitOfWork {
    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Compact per-kind counts for logging.
    pub fn summary(&self) -> PendingSummary {
        PendingSummary {
            created_guilds: self.created_guilds.len(),
            renames: self
                .character_renames
                .len()
                .saturating_add(self.guild_renames.len()),
            deleted_characters: self.deleted_characters.len(),
            deleted_guilds: self.deleted_guilds.len(),
            deleted_objects: self.deleted_objects.len(),
            deleted_thralls: self.deleted_thralls.len(),
            reassigned_objects: self.reassigned_objects.len(),
            health_updates: self.health_updates.len(),
        }
    }

    /// Drop every pending change that targets `object`.
    pub(crate) fn forget_object(&mut self, object: ObjectId) {
        self.reassigned_objects.remove(&object);
        self.health_updates.retain(|key, _| key.object_id != object);
        self.ownerless_upserts.remove(&object);
    }

    /// Drop every pending change that targets `owner`.
    pub(crate) fn forget_owner(&mut self, owner: OwnerId) {
        self.character_renames.remove(&owner);
        self.guild_renames.remove(&owner);
    }
}

/// Counts of pending changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSummary {
    /// Guilds inserted.
    pub created_guilds: usize,
    /// Characters and guilds renamed.
    pub renames: usize,
    /// Characters deleted.
    pub deleted_characters: usize,
    /// Guilds deleted.
    pub deleted_guilds: usize,
    /// Objects deleted.
    pub deleted_objects: usize,
    /// Thralls and pets deleted.
    pub deleted_thralls: usize,
    /// Objects handed to another owner.
    pub reassigned_objects: usize,
    /// Health parts lowered.
    pub health_updates: usize,
}
