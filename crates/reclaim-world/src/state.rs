//! In-memory view of the game database for one sweep.
//!
//! [`WorldState`] holds every table the sweep reasons about, already joined
//! into entity form. [`OwnerView`] gives characters and guilds a common face
//! (activity, member counting, last login) so the phases never branch on
//! the owner kind themselves.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use reclaim_types::{BuildableObject, Character, Guild, ObjectId, OwnerId, ThrallLink};

/// Everything the sweep reads from the store, plus the two persisted
/// snapshots (name history and ownerless objects).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    /// Characters by id.
    pub characters: BTreeMap<OwnerId, Character>,
    /// Guilds by id.
    pub guilds: BTreeMap<OwnerId, Guild>,
    /// Owned objects (building root pieces and placeables) by id.
    pub objects: BTreeMap<ObjectId, BuildableObject>,
    /// Ownership markers carried by thralls and pets.
    pub thrall_links: Vec<ThrallLink>,
    /// Last known real name of every owner, keyed by owner id.
    pub name_history: BTreeMap<OwnerId, String>,
    /// When each tracked object was first seen without a living owner.
    pub ownerless: BTreeMap<ObjectId, DateTime<Utc>>,
}

/// Coarse activity of an owner relative to a boundary timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    /// Logged in after the boundary.
    Active,
    /// Last login at or before the boundary.
    Inactive,
    /// No login was ever recorded.
    Unknown,
}

impl WorldState {
    /// Whether `id` refers to an existing character or guild.
    pub fn owner_exists(&self, id: OwnerId) -> bool {
        self.characters.contains_key(&id) || self.guilds.contains_key(&id)
    }

    /// Characters whose guild is `guild_id`, in id order.
    pub fn members(&self, guild_id: OwnerId) -> Vec<&Character> {
        self.characters
            .values()
            .filter(|c| c.guild_id == Some(guild_id))
            .collect()
    }

    /// Look up an owner as a character or guild.
    pub fn owner(&self, id: OwnerId) -> Option<OwnerView<'_>> {
        if let Some(character) = self.characters.get(&id) {
            return Some(OwnerView::Character(character));
        }
        self.guilds.get(&id).map(|guild| OwnerView::Guild {
            guild,
            members: self.members(id),
        })
    }

    /// Ids of all objects currently held by `owner`.
    pub fn objects_of(&self, owner: OwnerId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.owner_id == owner)
            .map(|o| o.id)
            .collect()
    }

    /// Ids of the thralls and pets whose ownership marker points at `target`.
    pub fn thralls_linked_to(&self, target: ObjectId) -> BTreeSet<ObjectId> {
        self.thrall_links
            .iter()
            .filter(|link| link.target == target.into_inner())
            .map(|link| link.thrall_id)
            .collect()
    }
}

/// A character or guild seen through the behaviour both share.
#[derive(Debug, Clone)]
pub enum OwnerView<'a> {
    /// A lone or guilded character.
    Character(&'a Character),
    /// A guild together with its current members.
    Guild {
        /// The guild row.
        guild: &'a Guild,
        /// Characters whose `guild_id` points at the guild.
        members: Vec<&'a Character>,
    },
}

impl OwnerView<'_> {
    /// Owner id.
    pub const fn id(&self) -> OwnerId {
        match self {
            Self::Character(c) => c.id,
            Self::Guild { guild, .. } => guild.id,
        }
    }

    /// Current display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Character(c) => &c.name,
            Self::Guild { guild, .. } => &guild.name,
        }
    }

    /// Whether the owner is currently displayed as a ruin.
    pub fn is_ruins(&self) -> bool {
        match self {
            Self::Character(c) => c.is_ruins(),
            Self::Guild { guild, .. } => guild.is_ruins(),
        }
    }

    /// Most recent login: the character's own, or the latest among a guild's
    /// members. `None` when nothing was recorded.
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Character(c) => c.last_login,
            Self::Guild { members, .. } => members.iter().filter_map(|m| m.last_login).max(),
        }
    }

    /// Activity relative to `boundary`. A guild without members is inactive.
    pub fn activity(&self, boundary: DateTime<Utc>) -> Activity {
        if matches!(self, Self::Guild { members, .. } if members.is_empty()) {
            return Activity::Inactive;
        }
        login_activity(self.last_login(), boundary)
    }

    /// Whether the owner's last activity lies at or before `boundary`.
    pub fn is_inactive(&self, boundary: DateTime<Utc>) -> bool {
        self.activity(boundary) == Activity::Inactive
    }

    /// Members counted towards per-member allowances: 1 for a character,
    /// all members or only the active ones for a guild.
    pub fn member_count(&self, include_inactive: bool, boundary: DateTime<Utc>) -> u32 {
        match self {
            Self::Character(_) => 1,
            Self::Guild { members, .. } => {
                let counted = if include_inactive {
                    members.len()
                } else {
                    members
                        .iter()
                        .filter(|m| login_activity(m.last_login, boundary) == Activity::Active)
                        .count()
                };
                u32::try_from(counted).unwrap_or(u32::MAX)
            }
        }
    }
}

/// Classify a single login timestamp against `boundary`.
pub fn login_activity(login: Option<DateTime<Utc>>, boundary: DateTime<Utc>) -> Activity {
    match login {
        None => Activity::Unknown,
        Some(at) if at <= boundary => Activity::Inactive,
        Some(_) => Activity::Active,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_default()
    }

    fn character(id: i64, guild: Option<i64>, days_ago: Option<i64>) -> Character {
        Character {
            id: OwnerId::new(id),
            player_id: format!("7656119800000{id:04}"),
            name: format!("char-{id}"),
            guild_id: guild.map(OwnerId::new),
            last_login: days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    fn state() -> WorldState {
        let mut state = WorldState::default();
        for c in [
            character(1, Some(100), Some(3)),
            character(2, Some(100), Some(20)),
            character(3, None, None),
        ] {
            state.characters.insert(c.id, c);
        }
        state.guilds.insert(
            OwnerId::new(100),
            Guild {
                id: OwnerId::new(100),
                name: String::from("Wolves"),
            },
        );
        state.guilds.insert(
            OwnerId::new(200),
            Guild {
                id: OwnerId::new(200),
                name: String::from("Empty"),
            },
        );
        state
    }

    #[test]
    fn guild_last_login_is_latest_member() {
        let state = state();
        let guild = state.owner(OwnerId::new(100));
        assert!(guild.is_some());
        let login = guild.and_then(|g| g.last_login());
        assert_eq!(login, Some(now() - Duration::days(3)));
    }

    #[test]
    fn guild_activity_follows_latest_member() {
        let state = state();
        let boundary = now() - Duration::days(14);
        let guild = state.owner(OwnerId::new(100));
        assert_eq!(guild.map(|g| g.activity(boundary)), Some(Activity::Active));
    }

    #[test]
    fn memberless_guild_is_inactive() {
        let state = state();
        let boundary = now() - Duration::days(14);
        let guild = state.owner(OwnerId::new(200));
        assert_eq!(guild.map(|g| g.is_inactive(boundary)), Some(true));
    }

    #[test]
    fn character_without_login_is_unknown() {
        let state = state();
        let boundary = now() - Duration::days(14);
        let c = state.owner(OwnerId::new(3));
        assert_eq!(c.map(|c| c.activity(boundary)), Some(Activity::Unknown));
    }

    #[test]
    fn member_count_respects_inactive_flag() {
        let state = state();
        let boundary = now() - Duration::days(14);
        let guild = state.owner(OwnerId::new(100));
        assert_eq!(guild.as_ref().map(|g| g.member_count(true, boundary)), Some(2));
        assert_eq!(guild.as_ref().map(|g| g.member_count(false, boundary)), Some(1));
        let lone = state.owner(OwnerId::new(3));
        assert_eq!(lone.map(|c| c.member_count(false, boundary)), Some(1));
    }
}
