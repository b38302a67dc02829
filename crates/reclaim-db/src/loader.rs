//! Reading the game tables into a [`WorldState`].
//!
//! | Table | Becomes |
//! |-------|---------|
//! | `characters` | [`Character`] (`lastTimeOnline` is unix seconds) |
//! | `guilds` | [`Guild`] |
//! | `buildings` + `actor_position` | [`BuildableObject`] owner, class, position |
//! | `building_instances` | piece count of root pieces |
//! | `buildable_health` | [`HealthPart`] |
//! | `properties` (`*OwnerUniqueID`) | [`ThrallLink`] |
//! | `reclaim_name_history` | name-history snapshot |
//! | `reclaim_ownerless_objects` | ownerless snapshot |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reclaim_types::{
    BuildableObject, Character, Guild, HealthPart, OWNER_MARKER_SUFFIX, ObjectId, OwnerId,
    Position, ThrallLink,
};
use reclaim_world::WorldState;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct CharacterRow {
    id: i64,
    player_id: String,
    name: String,
    guild_id: Option<i64>,
    last_online: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct GuildRow {
    id: i64,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ObjectRow {
    id: i64,
    owner_id: i64,
    class: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct HealthRow {
    object_id: i64,
    instance_id: i64,
    template_id: i64,
    health: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct MarkerRow {
    object_id: i64,
    name: String,
    value: Option<Vec<u8>>,
}

/// Load every table the sweep needs.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if a query fails and
/// [`DbError::OutOfRange`] for a negative or oversized piece count.
pub async fn load_world(pool: &SqlitePool) -> Result<WorldState, DbError> {
    let mut state = WorldState::default();

    let characters = sqlx::query_as::<_, CharacterRow>(
        r"SELECT id, playerId AS player_id, char_name AS name, guild AS guild_id,
                 lastTimeOnline AS last_online
          FROM characters",
    )
    .fetch_all(pool)
    .await?;
    for row in characters {
        let character = Character {
            id: OwnerId::new(row.id),
            player_id: row.player_id,
            name: row.name,
            guild_id: row.guild_id.map(OwnerId::new),
            last_login: row.last_online.and_then(|secs| timestamp(secs, "characters")),
        };
        state.characters.insert(character.id, character);
    }

    let guilds = sqlx::query_as::<_, GuildRow>("SELECT guildId AS id, name FROM guilds")
        .fetch_all(pool)
        .await?;
    for row in guilds {
        let id = OwnerId::new(row.id);
        state.guilds.insert(id, Guild { id, name: row.name });
    }

    load_objects(pool, &mut state).await?;
    state.thrall_links = load_thrall_links(pool).await?;

    let history = sqlx::query_as::<_, (i64, String)>(
        "SELECT owner_id, name FROM reclaim_name_history",
    )
    .fetch_all(pool)
    .await?;
    state.name_history = history
        .into_iter()
        .map(|(id, name)| (OwnerId::new(id), name))
        .collect();

    let ownerless = sqlx::query_as::<_, (i64, i64)>(
        "SELECT object_id, since FROM reclaim_ownerless_objects",
    )
    .fetch_all(pool)
    .await?;
    state.ownerless = ownerless
        .into_iter()
        .filter_map(|(id, since)| {
            timestamp(since, "reclaim_ownerless_objects").map(|ts| (ObjectId::new(id), ts))
        })
        .collect();

    debug!(
        characters = state.characters.len(),
        guilds = state.guilds.len(),
        objects = state.objects.len(),
        thrall_links = state.thrall_links.len(),
        name_history = state.name_history.len(),
        ownerless = state.ownerless.len(),
        "Loaded game tables"
    );
    Ok(state)
}

async fn load_objects(pool: &SqlitePool, state: &mut WorldState) -> Result<(), DbError> {
    let rows = sqlx::query_as::<_, ObjectRow>(
        r"SELECT b.object_id AS id, b.owner_id AS owner_id, ap.class AS class,
                 ap.x AS x, ap.y AS y, ap.z AS z
          FROM buildings b
          LEFT JOIN actor_position ap ON ap.id = b.object_id",
    )
    .fetch_all(pool)
    .await?;

    let pieces: BTreeMap<i64, i64> = sqlx::query_as::<_, (i64, i64)>(
        "SELECT object_id, COUNT(*) FROM building_instances GROUP BY object_id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    for row in rows {
        let count = pieces.get(&row.id).copied().unwrap_or(0);
        let instance_count = u32::try_from(count).ok().ok_or(DbError::OutOfRange {
            table: "building_instances",
            value: count,
        })?;
        let position = match (row.x, row.y, row.z) {
            (Some(x), Some(y), Some(z)) => Some(Position { x, y, z }),
            _ => None,
        };
        let object = BuildableObject {
            id: ObjectId::new(row.id),
            owner_id: OwnerId::new(row.owner_id),
            class: row.class.unwrap_or_default(),
            position,
            instance_count,
            health: Vec::new(),
        };
        state.objects.insert(object.id, object);
    }

    let health = sqlx::query_as::<_, HealthRow>(
        r"SELECT object_id, instance_id, template_id, health_percentage AS health
          FROM buildable_health
          ORDER BY object_id, instance_id, template_id",
    )
    .fetch_all(pool)
    .await?;
    for row in health {
        if let Some(object) = state.objects.get_mut(&ObjectId::new(row.object_id)) {
            object.health.push(HealthPart {
                instance_id: row.instance_id,
                template_id: row.template_id,
                health: row.health,
            });
        }
    }
    Ok(())
}

async fn load_thrall_links(pool: &SqlitePool) -> Result<Vec<ThrallLink>, DbError> {
    let rows = sqlx::query_as::<_, MarkerRow>(
        "SELECT object_id, name, value FROM properties WHERE name LIKE '%' || ?",
    )
    .bind(OWNER_MARKER_SUFFIX)
    .fetch_all(pool)
    .await?;

    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(target) = row.value.as_deref().and_then(marker_target) else {
            warn!(
                object_id = row.object_id,
                property = row.name.as_str(),
                "ownership marker without a readable target, ignoring"
            );
            continue;
        };
        links.push(ThrallLink {
            thrall_id: ObjectId::new(row.object_id),
            property: row.name,
            target,
        });
    }
    Ok(links)
}

/// The id an ownership marker points at: the little-endian `i32` that ends
/// the property blob.
pub fn marker_target(value: &[u8]) -> Option<i64> {
    let start = value.len().checked_sub(4)?;
    let tail: [u8; 4] = value.get(start..)?.try_into().ok()?;
    Some(i64::from(i32::from_le_bytes(tail)))
}

fn timestamp(secs: i64, table: &'static str) -> Option<DateTime<Utc>> {
    let ts = DateTime::from_timestamp(secs, 0);
    if ts.is_none() {
        warn!(table, secs, "timestamp out of range, treating as unknown");
    }
    ts
}
