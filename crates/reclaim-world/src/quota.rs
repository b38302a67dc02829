//! Per-owner object quotas.
//!
//! Each [`QuotaRule`] caps how many objects of some classes a single owner
//! may hold. Owners over the cap lose a uniformly random sample of the
//! excess. The random source is injected so callers decide between a
//! seeded generator (tests) and an entropy-seeded one (production).

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::IndexedRandom;
use reclaim_types::{Character, ObjectId, OwnerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{ClassMatcher, ClassSet};
use crate::error::WorldError;
use crate::lifecycle::{Lifecycle, Thresholds, classify_character};
use crate::session::Session;
use crate::state::{Activity, OwnerView, login_activity};

/// A cap on the number of objects of some classes per owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRule {
    /// Objects allowed regardless of member count.
    pub max: u32,
    /// Class fragments with `LIKE` semantics; any match counts.
    pub classes: Vec<String>,
    /// Extra objects allowed per counted guild member.
    #[serde(default)]
    pub per_member: u32,
}

impl QuotaRule {
    /// Compile the class fragments.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPattern`] for a fragment that does not
    /// compile.
    pub fn compile(&self) -> Result<CompiledQuota, WorldError> {
        Ok(CompiledQuota {
            matcher: ClassSet::new(&self.classes)?,
            rule: self.clone(),
        })
    }

    /// Objects allowed for an owner with `members_counted` members.
    pub fn allowed(&self, members_counted: u32) -> u64 {
        u64::from(self.max).saturating_add(
            u64::from(self.per_member).saturating_mul(u64::from(members_counted)),
        )
    }
}

/// A [`QuotaRule`] with its class matcher compiled.
#[derive(Debug, Clone)]
pub struct CompiledQuota {
    rule: QuotaRule,
    matcher: ClassSet,
}

impl CompiledQuota {
    /// The rule as configured.
    pub const fn rule(&self) -> &QuotaRule {
        &self.rule
    }

    /// Whether `class` falls under this rule.
    pub fn matches(&self, class: &str) -> bool {
        self.matcher.matches(class)
    }

    /// Configured fragments joined for log output.
    fn label(&self) -> String {
        self.rule.classes.join("|")
    }
}

/// How guild members are counted towards `per_member` allowances.
///
/// Members that expire later in the same pass never count, so the allowance
/// matches the guild as it stands after the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberAllowance {
    /// Count inactive members as well.
    pub include_inactives: bool,
    /// Boundaries of the current pass.
    pub thresholds: Thresholds,
}

impl MemberAllowance {
    /// Members counted for `owner`: 1 for a character, the surviving
    /// (optionally only active) members for a guild.
    pub fn members_counted(&self, owner: &OwnerView<'_>, whitelist: &BTreeSet<OwnerId>) -> u32 {
        match owner {
            OwnerView::Character(_) => 1,
            OwnerView::Guild { members, .. } => {
                let counted = members
                    .iter()
                    .filter(|m| self.survives(m, whitelist))
                    .filter(|m| {
                        self.include_inactives
                            || login_activity(m.last_login, self.thresholds.inactivity)
                                == Activity::Active
                    })
                    .count();
                u32::try_from(counted).unwrap_or(u32::MAX)
            }
        }
    }

    fn survives(&self, member: &Character, whitelist: &BTreeSet<OwnerId>) -> bool {
        whitelist.contains(&member.id)
            || classify_character(member, &self.thresholds) != Lifecycle::Expired
    }
}

/// Outcome of [`enforce_quotas`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaReport {
    /// (owner, rule) pairs that were over their allowance.
    pub violations: usize,
    /// Objects removed.
    pub removed: usize,
}

/// Remove the excess objects of every non-whitelisted owner over a rule's
/// allowance. Rules are applied in order, each against the state left by the
/// previous one. Objects that are unowned or whose owner no longer exists
/// are left to the ownerless funnel.
pub fn enforce_quotas<R>(
    session: &mut Session,
    rules: &[CompiledQuota],
    whitelist: &BTreeSet<OwnerId>,
    allowance: MemberAllowance,
    rng: &mut R,
) -> QuotaReport
where
    R: Rng + ?Sized,
{
    let mut report = QuotaReport::default();
    for quota in rules {
        let victims = select_excess(session, quota, whitelist, allowance, rng, &mut report);
        let removed = session.remove_objects(victims);
        report.removed = report.removed.saturating_add(removed);
    }
    report
}

fn select_excess<R>(
    session: &Session,
    quota: &CompiledQuota,
    whitelist: &BTreeSet<OwnerId>,
    allowance: MemberAllowance,
    rng: &mut R,
    report: &mut QuotaReport,
) -> Vec<ObjectId>
where
    R: Rng + ?Sized,
{
    let state = session.state();
    let mut by_owner: BTreeMap<OwnerId, Vec<ObjectId>> = BTreeMap::new();
    for object in state.objects.values() {
        if object.owner_id.is_unowned() || whitelist.contains(&object.owner_id) {
            continue;
        }
        if quota.matches(&object.class) {
            by_owner.entry(object.owner_id).or_default().push(object.id);
        }
    }

    let mut victims = Vec::new();
    for (owner_id, objects) in by_owner {
        let Some(owner) = state.owner(owner_id) else {
            continue;
        };
        let counted = allowance.members_counted(&owner, whitelist);
        let allowed = quota.rule().allowed(counted);
        let held = u64::try_from(objects.len()).unwrap_or(u64::MAX);
        let Some(excess) = held.checked_sub(allowed).filter(|e| *e > 0) else {
            continue;
        };
        report.violations = report.violations.saturating_add(1);
        debug!(
            owner_id = %owner_id,
            owner = owner.name(),
            classes = quota.label(),
            held,
            allowed,
            "owner over quota"
        );
        let excess = usize::try_from(excess).unwrap_or(usize::MAX);
        for id in objects.choose_multiple(rng, excess) {
            let Some(object) = state.objects.get(id) else {
                continue;
            };
            let teleport = object
                .position
                .map(|p| p.teleport_command())
                .unwrap_or_default();
            info!(
                object_id = %object.id,
                owner_id = %owner_id,
                class = object.class.as_str(),
                classes = quota.label(),
                teleport,
                "removing object over quota"
            );
            victims.push(*id);
        }
    }
    victims
}
