//! Mutable sweep session: the world state plus its pending unit of work.
//!
//! Every mutation is applied to the in-memory [`WorldState`] at once, so each
//! later phase re-derives its decisions from the post-mutation view, and is
//! recorded in the [`UnitOfWork`] for the single commit at the end of the pass.
//!
//! The three cascading bulk primitives of the store live here:
//! [`Session::remove_objects`], [`Session::remove_thrall_links`] and
//! [`Session::remove_characters`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use reclaim_types::{Character, Guild, ObjectId, OwnerId};
use tracing::debug;

use crate::state::WorldState;
use crate::unit_of_work::{HealthKey, UnitOfWork};

/// World state and pending changes for one pass.
#[derive(Debug, Clone)]
pub struct Session {
    state: WorldState,
    pending: UnitOfWork,
    now: DateTime<Utc>,
    expired_objects: BTreeSet<ObjectId>,
}

impl Session {
    /// Start a pass over `state` at instant `now`.
    pub fn new(state: WorldState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            pending: UnitOfWork::default(),
            now,
            expired_objects: BTreeSet::new(),
        }
    }

    /// The current (post-mutation) world view.
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// Changes recorded so far.
    pub const fn pending(&self) -> &UnitOfWork {
        &self.pending
    }

    /// The instant the pass runs at.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Objects whose owning character was expired during this pass.
    pub const fn expired_objects(&self) -> &BTreeSet<ObjectId> {
        &self.expired_objects
    }

    /// Split into the final state and the unit of work to commit.
    pub fn into_parts(self) -> (WorldState, UnitOfWork) {
        (self.state, self.pending)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut WorldState, &mut UnitOfWork) {
        (&mut self.state, &mut self.pending)
    }

    /// Insert a new guild.
    pub fn create_guild(&mut self, id: OwnerId, name: &str) {
        let guild = Guild {
            id,
            name: name.to_owned(),
        };
        self.state.guilds.insert(id, guild.clone());
        self.pending.deleted_guilds.remove(&id);
        self.pending.created_guilds.insert(id, guild);
    }

    /// Change the display name of a character or guild. Returns `false` when
    /// the owner does not exist or already carries that name.
    pub fn rename_owner(&mut self, id: OwnerId, name: &str) -> bool {
        if let Some(character) = self.state.characters.get_mut(&id) {
            if character.name == name {
                return false;
            }
            debug!(owner_id = %id, from = character.name, to = name, "renaming character");
            name.clone_into(&mut character.name);
            self.pending.character_renames.insert(id, name.to_owned());
            return true;
        }
        if let Some(guild) = self.state.guilds.get_mut(&id) {
            if guild.name == name {
                return false;
            }
            debug!(owner_id = %id, from = guild.name, to = name, "renaming guild");
            name.clone_into(&mut guild.name);
            if let Some(created) = self.pending.created_guilds.get_mut(&id) {
                name.clone_into(&mut created.name);
            } else {
                self.pending.guild_renames.insert(id, name.to_owned());
            }
            return true;
        }
        false
    }

    /// Delete a guild. Its objects keep the now dangling owner id and are
    /// picked up by the ownerless snapshot.
    pub fn delete_guild(&mut self, id: OwnerId) -> bool {
        if self.state.guilds.remove(&id).is_none() {
            return false;
        }
        self.pending.forget_owner(id);
        if self.pending.created_guilds.remove(&id).is_none() {
            self.pending.deleted_guilds.insert(id);
        }
        true
    }

    /// Delete objects and their dependent rows (health, position, properties).
    /// Returns how many existed.
    pub fn remove_objects<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let mut removed = 0_usize;
        for id in ids {
            if self.state.objects.remove(&id).is_none() {
                continue;
            }
            removed = removed.saturating_add(1);
            self.state.thrall_links.retain(|link| link.thrall_id != id);
            if self.state.ownerless.remove(&id).is_some() {
                self.pending.ownerless_removals.insert(id);
            }
            self.pending.forget_object(id);
            self.pending.deleted_objects.insert(id);
        }
        removed
    }

    /// Delete thralls or pets and their dependent rows, including the
    /// ownership markers they carry. Returns how many carried a marker.
    pub fn remove_thrall_links<I>(&mut self, thrall_ids: I) -> usize
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let ids: BTreeSet<ObjectId> = thrall_ids.into_iter().collect();
        let before = self.state.thrall_links.len();
        self.state
            .thrall_links
            .retain(|link| !ids.contains(&link.thrall_id));
        let removed = before.saturating_sub(self.state.thrall_links.len());
        self.pending.deleted_thralls.extend(ids);
        removed
    }

    /// Delete characters and their dependent rows. Whitelisted ids are
    /// skipped. An account is deleted as well once none of its characters
    /// remain. Objects the characters owned stay behind, ownerless.
    ///
    /// Returns the removed characters.
    pub fn remove_characters<I>(
        &mut self,
        ids: I,
        whitelist: &BTreeSet<OwnerId>,
    ) -> Vec<Character>
    where
        I: IntoIterator<Item = OwnerId>,
    {
        let mut removed = Vec::new();
        for id in ids {
            if whitelist.contains(&id) {
                continue;
            }
            let Some(character) = self.state.characters.remove(&id) else {
                continue;
            };
            self.pending.forget_owner(id);
            self.pending.deleted_characters.insert(id);
            removed.push(character);
        }
        for character in &removed {
            let account_in_use = self
                .state
                .characters
                .values()
                .any(|c| c.player_id == character.player_id);
            if !account_in_use {
                self.pending
                    .deleted_accounts
                    .insert(character.player_id.clone());
            }
        }
        removed
    }

    /// Hand an object to another owner. Returns `false` when the object does
    /// not exist or already belongs to `owner`.
    pub fn reassign_object(&mut self, id: ObjectId, owner: OwnerId) -> bool {
        let Some(object) = self.state.objects.get_mut(&id) else {
            return false;
        };
        if object.owner_id == owner {
            return false;
        }
        object.owner_id = owner;
        self.pending.reassigned_objects.insert(id, owner);
        true
    }

    /// Lower every health part of `id` that is above `ceiling` to `ceiling`.
    /// Parts already at or below it are left alone. Returns how many parts
    /// were lowered.
    pub fn lower_health(&mut self, id: ObjectId, ceiling: f64) -> usize {
        let Some(object) = self.state.objects.get_mut(&id) else {
            return 0;
        };
        let mut lowered = 0_usize;
        for part in &mut object.health {
            if part.health > ceiling {
                part.health = ceiling;
                self.pending.health_updates.insert(
                    HealthKey {
                        object_id: id,
                        instance_id: part.instance_id,
                        template_id: part.template_id,
                    },
                    ceiling,
                );
                lowered = lowered.saturating_add(1);
            }
        }
        lowered
    }

    /// Delete every event-log row at or before `cutoff`.
    pub fn cull_event_log(&mut self, cutoff: DateTime<Utc>) {
        self.pending.event_log_cutoff = Some(cutoff);
    }

    /// Put an account on the downstream deletion list.
    pub fn queue_account_deletion(&mut self, player_id: &str, character_name: &str) {
        self.pending
            .account_deletion_queue
            .insert(player_id.to_owned(), character_name.to_owned());
    }

    /// Remember that `ids` belonged to a character expired in this pass.
    pub(crate) fn mark_expired_objects<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ObjectId>,
    {
        self.expired_objects.extend(ids);
    }
}
