//! Entity types mirrored from the game database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, OwnerId};

/// Display name given to owners whose structures are being reclaimed.
pub const RUINS_NAME: &str = "Ruins";

/// Suffix of the property key that marks a thrall or pet as belonging to
/// another entity (e.g. `BP_ThrallComponent_C.OwnerUniqueID`).
pub const OWNER_MARKER_SUFFIX: &str = "OwnerUniqueID";

/// A player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Character id (shares the owner id space with guilds).
    pub id: OwnerId,
    /// External account id of the player controlling the character.
    pub player_id: String,
    /// Current display name.
    pub name: String,
    /// Guild the character belongs to, if any.
    pub guild_id: Option<OwnerId>,
    /// Last time the character was online. `None` when the game never
    /// recorded a login.
    pub last_login: Option<DateTime<Utc>>,
}

impl Character {
    /// Whether the character is currently displayed as a ruin.
    pub fn is_ruins(&self) -> bool {
        self.name == RUINS_NAME
    }
}

/// A guild (clan). Members are the characters whose `guild_id` points here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Guild id (shares the owner id space with characters).
    pub id: OwnerId,
    /// Current display name.
    pub name: String,
}

impl Guild {
    /// Whether the guild is currently displayed as a ruin.
    pub fn is_ruins(&self) -> bool {
        self.name == RUINS_NAME
    }
}

/// World coordinates of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// The admin console command that teleports to this position.
    pub fn teleport_command(&self) -> String {
        format!("TeleportPlayer {:.0} {:.0} {:.0}", self.x, self.y, self.z)
    }
}

/// Health record of one part of a buildable object.
///
/// Building root pieces carry one record per placed piece; placeables
/// usually carry a single record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPart {
    /// Building instance the record belongs to.
    pub instance_id: i64,
    /// Template of the part.
    pub template_id: i64,
    /// Current health as a fraction in `[0, 1]`.
    pub health: f64,
}

/// An owned object placed in the world: a building root piece or a placeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildableObject {
    /// Object id.
    pub id: ObjectId,
    /// Owning character or guild. May be [`OwnerId::UNOWNED`] or refer to an
    /// owner that no longer exists.
    pub owner_id: OwnerId,
    /// Blueprint class path of the actor.
    pub class: String,
    /// Position of the actor, when the game recorded one.
    pub position: Option<Position>,
    /// Number of building pieces attached to this object. Non-zero means the
    /// object is the root of a multi-part structure.
    pub instance_count: u32,
    /// Health records of the object's parts.
    pub health: Vec<HealthPart>,
}

impl BuildableObject {
    /// Whether this object is the root piece of a multi-part structure.
    pub const fn is_root_piece(&self) -> bool {
        self.instance_count > 0
    }
}

/// An ownership marker stored on a thrall or pet, pointing at the entity it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrallLink {
    /// The thrall or pet object carrying the marker.
    pub thrall_id: ObjectId,
    /// Full property key (ends with [`OWNER_MARKER_SUFFIX`]).
    pub property: String,
    /// Raw id the marker points at.
    pub target: i64,
}
