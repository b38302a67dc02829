//! Tile allowance audit.
//!
//! Every active owner may hold `base` tiles, plus `per_member` for each
//! counted guild member after the first. The audit only reports owners above
//! their allowance; enforcement is left to the admins.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use reclaim_types::OwnerId;
use rust_decimal::Decimal;
use tracing::info;

use crate::inventory::InventoryIndex;
use crate::state::{Activity, WorldState, login_activity};

/// Tile allowance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowancePolicy {
    /// Tiles allowed for a single owner.
    pub base: u32,
    /// Extra tiles per counted guild member after the first.
    pub per_member: u32,
    /// Count inactive guild members as well.
    pub include_inactives: bool,
}

impl AllowancePolicy {
    /// Tiles allowed for an owner with `members` counted members.
    pub fn allowed(&self, members: u32) -> Decimal {
        let extra = Decimal::from(members).saturating_sub(Decimal::ONE);
        let bonus = extra.saturating_mul(Decimal::from(self.per_member));
        Decimal::from(self.base).saturating_add(bonus)
    }
}

/// An owner holding more tiles than allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceBreach {
    /// The owner.
    pub owner_id: OwnerId,
    /// Its display name.
    pub name: String,
    /// Members counted towards the allowance.
    pub members: u32,
    /// Weighted, rounded tile count.
    pub tiles: Decimal,
    /// Tiles allowed.
    pub allowed: Decimal,
}

impl AllowanceBreach {
    /// Tiles above the allowance.
    pub fn excess(&self) -> Decimal {
        self.tiles.saturating_sub(self.allowed)
    }
}

/// List owners above their allowance, largest first. Whitelisted owners,
/// `Ruins` guilds, guilded or inactive characters and, when inactive members
/// do not count, guilds without active members are left out.
pub fn audit_allowance(
    state: &WorldState,
    index: &InventoryIndex,
    policy: &AllowancePolicy,
    whitelist: &BTreeSet<OwnerId>,
    inactivity_boundary: DateTime<Utc>,
) -> Vec<AllowanceBreach> {
    let mut breaches = Vec::new();

    for guild in state.guilds.values() {
        if whitelist.contains(&guild.id) || guild.is_ruins() {
            continue;
        }
        let Some(owner) = state.owner(guild.id) else {
            continue;
        };
        let members = owner.member_count(policy.include_inactives, inactivity_boundary);
        if !policy.include_inactives && members == 0 {
            continue;
        }
        push_breach(&mut breaches, index, guild.id, &guild.name, members, policy);
    }

    for character in state.characters.values() {
        if whitelist.contains(&character.id) || character.guild_id.is_some() {
            continue;
        }
        if login_activity(character.last_login, inactivity_boundary) != Activity::Active {
            continue;
        }
        push_breach(&mut breaches, index, character.id, &character.name, 1, policy);
    }

    breaches.sort_by(|a, b| b.tiles.cmp(&a.tiles).then_with(|| b.excess().cmp(&a.excess())));
    for breach in &breaches {
        info!(
            owner_id = %breach.owner_id,
            owner = breach.name.as_str(),
            members = breach.members,
            tiles = %breach.tiles,
            allowed = %breach.allowed,
            excess = %breach.excess(),
            "owner above tile allowance"
        );
    }
    breaches
}

fn push_breach(
    breaches: &mut Vec<AllowanceBreach>,
    index: &InventoryIndex,
    owner_id: OwnerId,
    name: &str,
    members: u32,
    policy: &AllowancePolicy,
) {
    let tiles = index.tiles(owner_id).rounded_total();
    let allowed = policy.allowed(members);
    if tiles > allowed {
        breaches.push(AllowanceBreach {
            owner_id,
            name: name.to_owned(),
            members,
            tiles,
            allowed,
        });
    }
}
