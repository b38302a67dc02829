//! Writing a [`UnitOfWork`] to the game database in one transaction.
//!
//! Deletions cascade over every game table that references the removed
//! entity. Id lists are bound in chunks to stay under the `SQLite` variable
//! limit.
//!
//! ```text
//! BEGIN
//!   game_events            <- event-log cull
//!   characters, ...        <- deleted characters, accounts, guilds
//!   buildings, ...         <- deleted objects and thralls
//!   guilds                 <- created sentinel, renames
//!   buildings.owner_id     <- reassignments
//!   buildable_health       <- lowered health
//!   reclaim_*              <- snapshots and deletion queue
//! COMMIT
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reclaim_types::OwnerId;
use reclaim_world::{CommitReport, UnitOfWork};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbError;

/// Maximum ids bound into one `IN (...)` list.
const CHUNK_SIZE: usize = 500;

/// Rows owned by a character, as `(table, column holding the character id)`.
const CHARACTER_TABLES: &[(&str, &str)] = &[
    ("characters", "id"),
    ("character_stats", "char_id"),
    ("item_inventory", "owner_id"),
    ("item_properties", "owner_id"),
    ("follower_markers", "owner_id"),
    ("actor_position", "id"),
    ("properties", "object_id"),
];

/// Rows owned by a buildable object.
const OBJECT_TABLES: &[(&str, &str)] = &[
    ("buildings", "object_id"),
    ("building_instances", "object_id"),
    ("buildable_health", "object_id"),
    ("actor_position", "id"),
    ("properties", "object_id"),
    ("item_inventory", "owner_id"),
    ("item_properties", "owner_id"),
];

/// Rows owned by a thrall or pet.
const THRALL_TABLES: &[(&str, &str)] = &[
    ("actor_position", "id"),
    ("properties", "object_id"),
    ("follower_markers", "follower_id"),
    ("character_stats", "char_id"),
    ("item_inventory", "owner_id"),
    ("item_properties", "owner_id"),
];

/// Write `work` atomically. Nothing is written if any statement fails.
///
/// `queued_at` stamps new entries of the account deletion queue.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if a statement or the commit fails; the
/// transaction is rolled back on drop.
pub async fn flush(
    pool: &SqlitePool,
    work: &UnitOfWork,
    queued_at: DateTime<Utc>,
) -> Result<CommitReport, DbError> {
    let mut tx = pool.begin().await?;
    let mut rows = 0_u64;

    if let Some(cutoff) = work.event_log_cutoff {
        rows = rows.saturating_add(
            sqlx::query("DELETE FROM game_events WHERE worldTime <= ?")
                .bind(cutoff.timestamp())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        );
    }

    let characters: Vec<i64> = work
        .deleted_characters
        .iter()
        .map(|id| id.into_inner())
        .collect();
    for (table, column) in CHARACTER_TABLES {
        rows = rows.saturating_add(delete_in(&mut tx, table, column, &characters).await?);
    }
    for user in &work.deleted_accounts {
        rows = rows.saturating_add(
            sqlx::query("DELETE FROM account WHERE user = ?")
                .bind(user)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        );
    }

    let guilds: Vec<i64> = work.deleted_guilds.iter().map(|id| id.into_inner()).collect();
    rows = rows.saturating_add(delete_in(&mut tx, "guilds", "guildId", &guilds).await?);

    let objects: Vec<i64> = work.deleted_objects.iter().map(|id| id.into_inner()).collect();
    for (table, column) in OBJECT_TABLES {
        rows = rows.saturating_add(delete_in(&mut tx, table, column, &objects).await?);
    }

    let thralls: Vec<i64> = work.deleted_thralls.iter().map(|id| id.into_inner()).collect();
    for (table, column) in THRALL_TABLES {
        rows = rows.saturating_add(delete_in(&mut tx, table, column, &thralls).await?);
    }

    for guild in work.created_guilds.values() {
        rows = rows.saturating_add(
            sqlx::query("INSERT INTO guilds (guildId, name) VALUES (?, ?)")
                .bind(guild.id.into_inner())
                .bind(&guild.name)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        );
    }
    for (id, name) in &work.character_renames {
        rows = rows.saturating_add(
            sqlx::query("UPDATE characters SET char_name = ? WHERE id = ?")
                .bind(name)
                .bind(id.into_inner())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        );
    }
    for (id, name) in &work.guild_renames {
        rows = rows.saturating_add(
            sqlx::query("UPDATE guilds SET name = ? WHERE guildId = ?")
                .bind(name)
                .bind(id.into_inner())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        );
    }

    rows = rows.saturating_add(reassign(&mut tx, work).await?);

    for (key, health) in &work.health_updates {
        rows = rows.saturating_add(
            sqlx::query(
                r"UPDATE buildable_health SET health_percentage = ?
                  WHERE object_id = ? AND instance_id = ? AND template_id = ?",
            )
            .bind(health)
            .bind(key.object_id.into_inner())
            .bind(key.instance_id)
            .bind(key.template_id)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        );
    }

    rows = rows.saturating_add(write_bookkeeping(&mut tx, work, queued_at).await?);

    tx.commit().await?;
    tracing::debug!(rows, "Flushed unit of work");
    Ok(CommitReport {
        rows_affected: rows,
    })
}

async fn reassign(conn: &mut SqliteConnection, work: &UnitOfWork) -> Result<u64, DbError> {
    let mut by_owner: BTreeMap<OwnerId, Vec<i64>> = BTreeMap::new();
    for (object, owner) in &work.reassigned_objects {
        by_owner.entry(*owner).or_default().push(object.into_inner());
    }

    let mut rows = 0_u64;
    for (owner, objects) in by_owner {
        for chunk in objects.chunks(CHUNK_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE buildings SET owner_id = ");
            query.push_bind(owner.into_inner());
            query.push(" WHERE object_id IN (");
            let mut list = query.separated(", ");
            for id in chunk {
                list.push_bind(*id);
            }
            list.push_unseparated(")");
            rows = rows.saturating_add(query.build().execute(&mut *conn).await?.rows_affected());
        }
    }
    Ok(rows)
}

async fn write_bookkeeping(
    conn: &mut SqliteConnection,
    work: &UnitOfWork,
    queued_at: DateTime<Utc>,
) -> Result<u64, DbError> {
    let mut rows = 0_u64;

    let removed: Vec<i64> = work
        .name_history_removals
        .iter()
        .map(|id| id.into_inner())
        .collect();
    rows = rows.saturating_add(
        delete_in(conn, "reclaim_name_history", "owner_id", &removed).await?,
    );
    for (id, name) in &work.name_history_upserts {
        rows = rows.saturating_add(
            sqlx::query(
                r"INSERT INTO reclaim_name_history (owner_id, name) VALUES (?, ?)
                  ON CONFLICT(owner_id) DO UPDATE SET name = excluded.name",
            )
            .bind(id.into_inner())
            .bind(name)
            .execute(&mut *conn)
            .await?
            .rows_affected(),
        );
    }

    let removed: Vec<i64> = work.ownerless_removals.iter().map(|id| id.into_inner()).collect();
    rows = rows.saturating_add(
        delete_in(conn, "reclaim_ownerless_objects", "object_id", &removed).await?,
    );
    for (id, since) in &work.ownerless_upserts {
        rows = rows.saturating_add(
            sqlx::query(
                r"INSERT INTO reclaim_ownerless_objects (object_id, since) VALUES (?, ?)
                  ON CONFLICT(object_id) DO UPDATE SET since = excluded.since",
            )
            .bind(id.into_inner())
            .bind(since.timestamp())
            .execute(&mut *conn)
            .await?
            .rows_affected(),
        );
    }

    for (player_id, name) in &work.account_deletion_queue {
        rows = rows.saturating_add(
            sqlx::query(
                r"INSERT INTO reclaim_deletion_queue (player_id, char_name, queued_at)
                  VALUES (?, ?, ?)
                  ON CONFLICT(player_id) DO UPDATE SET
                      char_name = excluded.char_name,
                      queued_at = excluded.queued_at",
            )
            .bind(player_id)
            .bind(name)
            .bind(queued_at.timestamp())
            .execute(&mut *conn)
            .await?
            .rows_affected(),
        );
    }
    Ok(rows)
}

/// `DELETE FROM table WHERE column IN (ids)`, chunked. `table` and `column`
/// are always compile-time constants.
async fn delete_in(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    ids: &[i64],
) -> Result<u64, DbError> {
    let mut rows = 0_u64;
    for chunk in ids.chunks(CHUNK_SIZE) {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("DELETE FROM {table} WHERE {column} IN ("));
        let mut list = query.separated(", ");
        for id in chunk {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
        rows = rows.saturating_add(query.build().execute(&mut *conn).await?.rows_affected());
    }
    Ok(rows)
}
