//! End-to-end behaviour of the phase pipeline over hand-built worlds.
//!
//! Every test runs [`run_phases`] at a fixed instant with the default
//! windows (inactivity 14 days, long-inactive 30, purge 5) and inspects the
//! resulting unit of work.

#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use reclaim_core::{PassSummary, ReclaimConfig, SweepParams, run_phases};
use reclaim_types::{
    BuildableObject, Character, Guild, HealthPart, ObjectId, OwnerId, RUINS_NAME, ThrallLink,
};
use reclaim_world::{QuotaRule, Session, UnitOfWork, WorldState};

const SENTINEL: OwnerId = OwnerId(-20);

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn params() -> SweepParams {
    SweepParams::from_config(&ReclaimConfig::default()).unwrap()
}

fn character(id: i64, name: &str, guild: Option<i64>, login_days_ago: Option<i64>) -> Character {
    Character {
        id: OwnerId::new(id),
        player_id: format!("7656119{id}"),
        name: name.to_owned(),
        guild_id: guild.map(OwnerId::new),
        last_login: login_days_ago.map(days_ago),
    }
}

fn guild(id: i64, name: &str) -> Guild {
    Guild {
        id: OwnerId::new(id),
        name: name.to_owned(),
    }
}

fn object(id: i64, owner: i64, class: &str, health: &[f64]) -> BuildableObject {
    BuildableObject {
        id: ObjectId::new(id),
        owner_id: OwnerId::new(owner),
        class: class.to_owned(),
        position: None,
        instance_count: 0,
        health: health
            .iter()
            .zip(0_i64..)
            .map(|(&health, instance_id)| HealthPart {
                instance_id,
                template_id: 1,
                health,
            })
            .collect(),
    }
}

#[derive(Default)]
struct World(WorldState);

impl World {
    fn character(mut self, c: Character) -> Self {
        self.0.characters.insert(c.id, c);
        self
    }

    fn guild(mut self, g: Guild) -> Self {
        self.0.guilds.insert(g.id, g);
        self
    }

    fn object(mut self, o: BuildableObject) -> Self {
        self.0.objects.insert(o.id, o);
        self
    }

    fn with_sentinel(self) -> Self {
        self.guild(guild(SENTINEL.into_inner(), RUINS_NAME))
    }

    fn build(self) -> WorldState {
        self.0
    }
}

fn sweep_at(
    state: WorldState,
    at: DateTime<Utc>,
    params: &SweepParams,
    seed: u64,
) -> (WorldState, UnitOfWork, PassSummary) {
    let mut session = Session::new(state, at);
    let mut rng = StdRng::seed_from_u64(seed);
    let summary = run_phases(&mut session, params, &mut rng).unwrap();
    let (state, work) = session.into_parts();
    (state, work, summary)
}

fn sweep(state: WorldState) -> (WorldState, UnitOfWork, PassSummary) {
    sweep_at(state, now(), &params(), 7)
}

fn health_of(state: &WorldState, id: i64) -> Vec<f64> {
    state.objects[&ObjectId::new(id)]
        .health
        .iter()
        .map(|p| p.health)
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn long_inactive_character_is_removed_and_queued() {
    let state = World::default()
        .with_sentinel()
        .character(character(1, "Conan", None, Some(40)))
        .character(character(-5, "Admin", None, Some(40)))
        .object(object(10, 1, "/Game/Foundation", &[1.0]))
        .build();

    let (after, work, summary) = sweep(state);

    assert_eq!(summary.expiry.characters, 1);
    assert!(work.deleted_characters.contains(&OwnerId::new(1)));
    // Structures of an expired character are anchored past the purge
    // window and go in the same pass.
    assert!(work.deleted_objects.contains(&ObjectId::new(10)));
    assert!(!after.objects.contains_key(&ObjectId::new(10)));
    assert!(!work.deleted_characters.contains(&OwnerId::new(-5)));
    assert_eq!(
        work.account_deletion_queue.get("76561191").map(String::as_str),
        Some("Conan")
    );
    assert!(after.characters.contains_key(&OwnerId::new(-5)));
}

#[test]
fn guild_over_quota_keeps_exactly_the_cap() {
    let mut params = params();
    params.quotas = vec![
        QuotaRule {
            max: 2,
            classes: vec![String::from("Bedroll_Fiber")],
            per_member: 0,
        }
        .compile()
        .unwrap(),
    ];
    let mut world = World::default()
        .with_sentinel()
        .guild(guild(100, "Wolves"))
        .character(character(1, "a", Some(100), Some(1)))
        .character(character(2, "b", Some(100), Some(2)))
        .character(character(3, "c", Some(100), Some(3)));
    for id in 10..15 {
        world = world.object(object(id, 100, "/Game/BP_Bedroll_Fiber_C", &[1.0]));
    }

    let (after, work, summary) = sweep_at(world.build(), now(), &params, 3);

    assert_eq!(summary.quota.removed, 3);
    assert_eq!(work.deleted_objects.len(), 3);
    assert_eq!(after.objects_of(OwnerId::new(100)).len(), 2);
}

#[test]
fn object_ownerless_past_purge_window_is_deleted_with_its_thralls() {
    let mut state = World::default()
        .with_sentinel()
        .object(object(20, 999, "/Game/Foundation", &[1.0]))
        .object(object(21, 999, "/Game/Foundation", &[1.0]))
        .build();
    state.ownerless.insert(ObjectId::new(20), days_ago(10));
    state.ownerless.insert(ObjectId::new(21), days_ago(2));
    state.thrall_links.push(ThrallLink {
        thrall_id: ObjectId::new(30),
        property: String::from("BP_ThrallComponent_C.OwnerUniqueID"),
        target: 20,
    });

    let (after, work, summary) = sweep(state);

    assert!(work.deleted_objects.contains(&ObjectId::new(20)));
    assert!(work.deleted_thralls.contains(&ObjectId::new(30)));
    assert_eq!(summary.decay.removed_thralls, 1);
    assert!(after.thrall_links.is_empty());

    // Two of five days gone: 60 percent left, held by the sentinel.
    assert_eq!(after.objects[&ObjectId::new(21)].owner_id, SENTINEL);
    let left = health_of(&after, 21)[0];
    assert!((left - 0.6).abs() < 1e-9);
}

#[test]
fn recently_inactive_owner_is_untouched() {
    let state = World::default()
        .with_sentinel()
        .character(character(2, "Valeria", None, Some(10)))
        .object(object(40, 2, "/Game/Foundation", &[1.0, 0.8]))
        .build();

    let (after, work, _) = sweep(state);

    assert_eq!(after.characters[&OwnerId::new(2)].name, "Valeria");
    assert!(work.character_renames.is_empty());
    assert!(work.deleted_objects.is_empty());
    assert!(work.health_updates.is_empty());
    assert_eq!(health_of(&after, 40), vec![1.0, 0.8]);
}

// =============================================================================
// Properties
// =============================================================================

fn mixed_world() -> WorldState {
    let mut state = World::default()
        .with_sentinel()
        .character(character(1, "Conan", None, Some(40)))
        .character(character(2, "Valeria", None, Some(16)))
        .character(character(3, "Subotai", None, Some(20)))
        .character(character(4, "Thulsa", None, Some(1)))
        .character(character(5, "Ghost", None, None))
        .character(character(6, "Bel", Some(200), Some(18)))
        .guild(guild(200, "Ravens"))
        .guild(guild(300, "Ashes"))
        .object(object(10, 1, "/Game/Foundation", &[1.0]))
        .object(object(11, 2, "/Game/Foundation", &[1.0, 0.3]))
        .object(object(12, 3, "/Game/Foundation", &[1.0]))
        .object(object(13, 4, "/Game/BP_Bedroll_Fiber_C", &[1.0]))
        .object(object(14, 5, "/Game/Foundation", &[1.0]))
        .object(object(15, 200, "/Game/Foundation", &[1.0]))
        .object(object(16, 300, "/Game/Foundation", &[1.0]))
        .object(object(17, 0, "/Game/Foundation", &[1.0]))
        .build();
    state.name_history.insert(OwnerId::new(1), String::from("Conan"));
    state
}

#[test]
fn second_pass_changes_nothing() {
    let (after, first, _) = sweep(mixed_world());
    assert!(!first.deleted_objects.is_empty());

    let (_, second, summary) = sweep(after);

    assert!(second.character_renames.is_empty());
    assert!(second.guild_renames.is_empty());
    assert!(second.deleted_characters.is_empty());
    assert!(second.deleted_guilds.is_empty());
    assert!(second.deleted_objects.is_empty());
    assert!(second.deleted_thralls.is_empty());
    assert!(second.reassigned_objects.is_empty());
    assert!(second.health_updates.is_empty());
    assert!(second.name_history_upserts.is_empty());
    assert!(second.name_history_removals.is_empty());
    assert!(second.ownerless_upserts.is_empty());
    assert!(second.ownerless_removals.is_empty());
    assert_eq!(summary.quota.removed, 0);
}

#[test]
fn quota_never_leaves_more_than_allowed() {
    let mut params = params();
    params.quotas = vec![
        QuotaRule {
            max: 1,
            classes: vec![String::from("Planter")],
            per_member: 1,
        }
        .compile()
        .unwrap(),
    ];
    let mut removed_sets = BTreeSet::new();
    for seed in 0..16 {
        let mut world = World::default()
            .with_sentinel()
            .guild(guild(100, "Wolves"))
            .character(character(1, "a", Some(100), Some(1)))
            .character(character(2, "b", Some(100), Some(40)));
        for id in 10..20 {
            world = world.object(object(id, 100, "/Game/Crafting_Planter_C", &[1.0]));
        }
        let (after, work, _) = sweep_at(world.build(), now(), &params, seed);
        // The member expiring this pass earns nothing: 1 + 1 * 1.
        assert_eq!(after.objects_of(OwnerId::new(100)).len(), 2);
        removed_sets.insert(work.deleted_objects.into_iter().collect::<Vec<_>>());
    }
    assert!(removed_sets.len() > 1);
}

#[test]
fn expiring_member_does_not_stretch_the_guild_quota() {
    let mut params = params();
    params.quotas = vec![
        QuotaRule {
            max: 0,
            classes: vec![String::from("Bedroll_Fiber")],
            per_member: 1,
        }
        .compile()
        .unwrap(),
    ];
    let state = World::default()
        .with_sentinel()
        .guild(guild(100, "Wolves"))
        .character(character(1, "a", Some(100), Some(1)))
        .character(character(2, "b", Some(100), Some(40)))
        .object(object(10, 100, "/Game/BP_Bedroll_Fiber_C", &[1.0]))
        .object(object(11, 100, "/Game/BP_Bedroll_Fiber_C", &[1.0]))
        .build();

    let (after, first, summary) = sweep_at(state, now(), &params, 11);
    assert_eq!(summary.quota.removed, 1);
    assert!(first.deleted_characters.contains(&OwnerId::new(2)));
    assert_eq!(after.members(OwnerId::new(100)).len(), 1);
    assert_eq!(after.objects_of(OwnerId::new(100)).len(), 1);

    let (_, second, summary) = sweep_at(after, now(), &params, 12);
    assert_eq!(summary.quota.removed, 0);
    assert!(second.deleted_objects.is_empty());
}

#[test]
fn decay_only_lowers_health() {
    let (after, work, _) = sweep(mixed_world());

    // Valeria: 16 days idle, 2 of 5 decay days gone.
    assert_eq!(after.characters[&OwnerId::new(2)].name, RUINS_NAME);
    let parts = health_of(&after, 11);
    assert!((parts[0] - 0.6).abs() < 1e-9);
    assert!((parts[1] - 0.3).abs() < 1e-9);
    assert_eq!(
        work.health_updates
            .keys()
            .filter(|k| k.object_id == ObjectId::new(11))
            .count(),
        1
    );

    let later = now() + Duration::days(1);
    let (after_later, _, _) = sweep_at(after, later, &params(), 7);
    let parts = health_of(&after_later, 11);
    assert!((parts[0] - 0.4).abs() < 1e-9);
    assert!((parts[1] - 0.3).abs() < 1e-9);
}

#[test]
fn ruined_owners_always_hold_objects() {
    let (after, work, _) = sweep(mixed_world());

    for c in after.characters.values().filter(|c| c.is_ruins()) {
        assert!(!after.objects_of(c.id).is_empty(), "{} is an empty ruin", c.id);
    }
    for g in after.guilds.values().filter(|g| g.is_ruins() && g.id != SENTINEL) {
        assert!(!after.objects_of(g.id).is_empty(), "{} is an empty ruin", g.id);
    }

    // Subotai decayed away within the pass and got the real name back.
    assert!(work.deleted_objects.contains(&ObjectId::new(12)));
    assert_eq!(after.characters[&OwnerId::new(3)].name, "Subotai");
    // Unknown activity is never renamed.
    assert_eq!(after.characters[&OwnerId::new(5)].name, "Ghost");
    // Active owners keep their names.
    assert_eq!(after.characters[&OwnerId::new(4)].name, "Thulsa");
}

#[test]
fn returning_owner_gets_name_back_without_healing() {
    let mut state = World::default()
        .with_sentinel()
        .character(character(7, RUINS_NAME, None, Some(1)))
        .object(object(70, 7, "/Game/Foundation", &[0.2]))
        .build();
    state.name_history.insert(OwnerId::new(7), String::from("Yasmina"));

    let (after, work, summary) = sweep(state);

    assert_eq!(summary.reverted.restored, 1);
    assert_eq!(after.characters[&OwnerId::new(7)].name, "Yasmina");
    assert_eq!(
        work.character_renames.get(&OwnerId::new(7)).map(String::as_str),
        Some("Yasmina")
    );
    assert_eq!(health_of(&after, 70), vec![0.2]);
}

#[test]
fn ownerless_objects_funnel_to_the_sentinel() {
    let (after, work, summary) = sweep(mixed_world());

    // Unowned object and the expired character's object.
    assert!(summary.reclaim.reassigned >= 1);
    assert_eq!(after.objects[&ObjectId::new(17)].owner_id, SENTINEL);
    assert!(after.ownerless.contains_key(&ObjectId::new(17)));
    // Conan expired this pass: his object decays away at once.
    assert!(work.deleted_objects.contains(&ObjectId::new(10)));
    // Member-less guild deleted, its object handed over.
    assert!(work.deleted_guilds.contains(&OwnerId::new(300)));
    assert_eq!(after.objects[&ObjectId::new(16)].owner_id, SENTINEL);

    for o in after.objects.values() {
        assert!(
            after.owner_exists(o.owner_id),
            "object {} still points at {}",
            o.id,
            o.owner_id
        );
    }
}

#[test]
fn missing_sentinel_is_created_named_ruins() {
    let state = World::default()
        .character(character(4, "Thulsa", None, Some(1)))
        .build();

    let (after, work, _) = sweep(state);

    assert_eq!(after.guilds[&SENTINEL].name, RUINS_NAME);
    assert!(work.created_guilds.contains_key(&SENTINEL));
}
