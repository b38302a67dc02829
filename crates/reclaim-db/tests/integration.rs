//! Integration tests for the `reclaim-db` store.
//!
//! Every test builds a private in-memory `SQLite` database from
//! `fixtures/game_schema.sql`, so no game server files are needed.
//! The pool holds a single connection: each `:memory:` connection is its
//! own database.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use reclaim_core::{ReclaimConfig, SweepParams, run_pass};
use reclaim_db::{DbError, GameDb, MaintenanceOptions, SqliteConfig, SqliteStore};
use reclaim_types::{Guild, ObjectId, OwnerId, RUINS_NAME};
use reclaim_world::{HealthKey, UnitOfWork, WorldStore};
use sqlx::SqlitePool;

const SCHEMA: &str = include_str!("fixtures/game_schema.sql");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> i64 {
    (now() - Duration::days(days)).timestamp()
}

// =============================================================================
// Helper: in-memory game database with a small world
// =============================================================================

async fn setup() -> GameDb {
    let config = SqliteConfig::new("sqlite::memory:").with_max_connections(1);
    let db = GameDb::connect(&config)
        .await
        .expect("Failed to open in-memory database");
    sqlx::raw_sql(SCHEMA)
        .execute(db.pool())
        .await
        .expect("Failed to create game schema");
    db.run_migrations().await.expect("Failed to run migrations");
    seed(db.pool()).await;
    db
}

async fn seed(pool: &SqlitePool) {
    let sql = format!(
        r"
        INSERT INTO characters (id, playerId, char_name, guild, lastTimeOnline) VALUES
            (1, '76561198000000001', 'Conan',   NULL, {conan}),
            (2, '76561198000000002', 'Valeria', NULL, {valeria}),
            (3, '76561198000000003', 'Thulsa',  100,  {thulsa});
        INSERT INTO account (user) VALUES
            ('76561198000000001'), ('76561198000000002'), ('76561198000000003');
        INSERT INTO guilds (guildId, name) VALUES (100, 'Serpents');

        INSERT INTO actor_position (class, id, x, y, z) VALUES
            ('/Game/Systems/Building/BP_Foundation_C', 10, -35000.4, 12000.6, 80.0),
            ('/Game/Systems/Building/BP_Chest_C',      11, 100.0, 200.0, 300.0),
            ('/Game/Systems/Building/BP_Foundation_C', 12, 0.0, 0.0, 0.0),
            ('/Game/Systems/Building/BP_Bedroll_Fiber_C', 13, 1.0, 1.0, 1.0),
            ('/Game/Characters/NPCs/BP_Thrall_C',      30, 5.0, 5.0, 5.0);
        INSERT INTO buildings (object_id, owner_id) VALUES
            (10, 1), (11, 2), (12, 100), (13, 100);
        INSERT INTO building_instances (object_id, instance_id, class) VALUES
            (10, 1, 'Foundation'), (10, 2, 'Wall'), (12, 1, 'Foundation');
        INSERT INTO buildable_health (object_id, instance_id, health_id, template_id, health_percentage) VALUES
            (10, 1, 0, 1, 1.0), (10, 2, 0, 1, 1.0),
            (11, 0, 0, 1, 1.0), (11, 1, 0, 2, 0.3),
            (12, 1, 0, 1, 1.0),
            (13, 0, 0, 1, 1.0);
        INSERT INTO properties (object_id, name, value) VALUES
            (30, 'BP_ThrallComponent_C.OwnerUniqueID', X'01020A000000'),
            (10, 'BP_Foundation_C.Decay', X'00');
        INSERT INTO character_stats (char_id, stat_type, stat_id, stat_value) VALUES (1, 0, 5, 1.0);
        INSERT INTO item_inventory (item_id, owner_id, inv_type, template_id) VALUES
            (500, 1, 0, 77), (501, 10, 4, 88);
        INSERT INTO follower_markers (owner_id, follower_id) VALUES (1, 30);
        INSERT INTO game_events (worldTime, eventType, objectId, ownerId) VALUES
            ({old_event}, 1, 10, 1), ({new_event}, 1, 12, 3);
        ",
        conan = days_ago(40),
        valeria = days_ago(16),
        thulsa = days_ago(1),
        old_event = days_ago(10),
        new_event = days_ago(1),
    );
    sqlx::raw_sql(&sql)
        .execute(pool)
        .await
        .expect("Failed to seed game tables");
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

fn store(db: GameDb) -> SqliteStore {
    SqliteStore::new(db, MaintenanceOptions::default())
}

// =============================================================================
// Loader
// =============================================================================

#[tokio::test]
async fn load_reads_game_tables() {
    let mut store = store(setup().await);
    let world = store.load_world().await.expect("Failed to load world");

    assert_eq!(world.characters.len(), 3);
    assert_eq!(world.guilds.len(), 1);
    assert_eq!(world.objects.len(), 4);

    let conan = &world.characters[&OwnerId::new(1)];
    assert_eq!(conan.player_id, "76561198000000001");
    assert_eq!(conan.last_login, Some(now() - Duration::days(40)));
    assert_eq!(
        world.characters[&OwnerId::new(3)].guild_id,
        Some(OwnerId::new(100))
    );

    let foundation = &world.objects[&ObjectId::new(10)];
    assert_eq!(foundation.owner_id, OwnerId::new(1));
    assert_eq!(foundation.instance_count, 2);
    assert_eq!(foundation.health.len(), 2);
    assert_eq!(
        foundation.position.map(|p| p.teleport_command()).as_deref(),
        Some("TeleportPlayer -35000 12001 80")
    );
    assert_eq!(world.objects[&ObjectId::new(11)].instance_count, 0);

    assert_eq!(world.thrall_links.len(), 1);
    assert_eq!(world.thrall_links[0].thrall_id, ObjectId::new(30));
    assert_eq!(world.thrall_links[0].target, 10);

    assert!(world.name_history.is_empty());
    assert!(world.ownerless.is_empty());
}

// =============================================================================
// Flush
// =============================================================================

#[tokio::test]
async fn commit_cascades_deletions() {
    let db = setup().await;
    let pool = db.pool().clone();
    let mut store = store(db);

    let mut work = UnitOfWork::default();
    work.deleted_characters.insert(OwnerId::new(1));
    work.deleted_accounts.insert(String::from("76561198000000001"));
    work.deleted_objects.insert(ObjectId::new(10));
    work.deleted_thralls.insert(ObjectId::new(30));
    work.event_log_cutoff = Some(now() - Duration::days(7));

    let report = store.commit(work).await.expect("Failed to commit");
    assert!(report.rows_affected >= 12);

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM characters WHERE id = 1").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM character_stats").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM account").await, 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM item_inventory").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM follower_markers").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings WHERE object_id = 10").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM building_instances WHERE object_id = 10").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildable_health WHERE object_id = 10").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM properties").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM actor_position WHERE id IN (10, 30)").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings").await, 3);
}

#[tokio::test]
async fn commit_writes_updates_and_bookkeeping() {
    let db = setup().await;
    let pool = db.pool().clone();
    let mut store = store(db);

    let sentinel = OwnerId::new(-20);
    let mut work = UnitOfWork::default();
    work.created_guilds.insert(
        sentinel,
        Guild {
            id: sentinel,
            name: RUINS_NAME.to_owned(),
        },
    );
    work.character_renames.insert(OwnerId::new(2), RUINS_NAME.to_owned());
    work.guild_renames.insert(OwnerId::new(100), String::from("Vipers"));
    work.reassigned_objects.insert(ObjectId::new(10), sentinel);
    work.reassigned_objects.insert(ObjectId::new(12), sentinel);
    work.health_updates.insert(
        HealthKey {
            object_id: ObjectId::new(11),
            instance_id: 0,
            template_id: 1,
        },
        0.25,
    );
    work.name_history_upserts.insert(OwnerId::new(2), String::from("Valeria"));
    work.ownerless_upserts.insert(ObjectId::new(10), now() - Duration::days(3));
    work.account_deletion_queue
        .insert(String::from("76561198000000001"), String::from("Conan"));

    store.commit(work).await.expect("Failed to commit");

    let name: String = sqlx::query_scalar("SELECT name FROM guilds WHERE guildId = -20")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, RUINS_NAME);
    let name: String = sqlx::query_scalar("SELECT char_name FROM characters WHERE id = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, RUINS_NAME);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM guilds WHERE name = 'Vipers'").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings WHERE owner_id = -20").await, 2);
    let health: f64 = sqlx::query_scalar(
        "SELECT health_percentage FROM buildable_health WHERE object_id = 11 AND instance_id = 0",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(health, 0.25);

    let world = store.load_world().await.unwrap();
    assert_eq!(
        world.name_history.get(&OwnerId::new(2)).map(String::as_str),
        Some("Valeria")
    );
    assert_eq!(
        world.ownerless.get(&ObjectId::new(10)),
        Some(&(now() - Duration::days(3)))
    );
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM reclaim_deletion_queue").await, 1);
}

#[tokio::test]
async fn failed_commit_writes_nothing() {
    let db = setup().await;
    let pool = db.pool().clone();
    let mut store = store(db);

    let mut work = UnitOfWork::default();
    work.deleted_objects.insert(ObjectId::new(10));
    // Clashes with the existing guild.
    work.created_guilds.insert(
        OwnerId::new(100),
        Guild {
            id: OwnerId::new(100),
            name: RUINS_NAME.to_owned(),
        },
    );

    let err = store.commit(work).await.unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings WHERE object_id = 10").await, 1);
}

#[tokio::test]
async fn maintenance_runs_every_step() {
    let mut store = store(setup().await);
    let report = store.maintain().await.expect("Failed to maintain");
    assert!(report.vacuumed);
    assert!(report.analyzed);
    assert!(report.integrity_checked);
}

// =============================================================================
// Full pass
// =============================================================================

#[tokio::test]
async fn full_pass_reclaims_and_settles() {
    let db = setup().await;
    let pool = db.pool().clone();
    let mut store = store(db);
    let params = SweepParams::from_config(&ReclaimConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let outcome = run_pass(&mut store, &params, now(), &mut rng)
        .await
        .expect("First pass failed");
    assert_eq!(outcome.summary.expiry.characters, 1);
    assert_eq!(outcome.summary.quota.removed, 1);
    assert!(outcome.maintenance.integrity_checked);

    // Conan expired with everything hanging off him.
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM characters").await, 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM account").await, 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM reclaim_deletion_queue").await, 1);
    // His foundation went to the sentinel and decayed away with its thrall.
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings WHERE object_id = 10").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM actor_position WHERE id = 30").await, 0);
    // The bedroll was over quota.
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM buildings WHERE object_id = 13").await, 0);
    // Old events culled.
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 1);

    let world = store.load_world().await.unwrap();
    assert_eq!(world.guilds[&OwnerId::new(-20)].name, RUINS_NAME);
    assert_eq!(world.characters[&OwnerId::new(2)].name, RUINS_NAME);
    assert_eq!(
        world.name_history.get(&OwnerId::new(2)).map(String::as_str),
        Some("Valeria")
    );
    let chest = &world.objects[&ObjectId::new(11)];
    assert!((chest.health[0].health - 0.6).abs() < 1e-9);
    assert!((chest.health[1].health - 0.3).abs() < 1e-9);

    let again = run_pass(&mut store, &params, now(), &mut rng)
        .await
        .expect("Second pass failed");
    assert_eq!(again.commit.rows_affected, 0);
    assert_eq!(again.summary.pending.renames, 0);
    assert_eq!(store.load_world().await.unwrap(), world);
}
