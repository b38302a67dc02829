//! The fixed phase sequence of one sweep.
//!
//! Each pass runs these phases in order over a single [`Session`]:
//!
//! 1. **`EnsureSentinel`** -- create the sentinel guild or restore its name.
//! 2. **Classify** -- derive the thresholds, count characters by lifecycle
//!    state and cull the event log.
//! 3. **`EnforceQuota`** -- remove a random sample of every owner's excess
//!    objects per quota rule.
//! 4. **`ExpireCharacters`** -- delete long-inactive characters.
//! 5. **`RevertNames`** -- refresh the name history, then give returning
//!    `Ruins` owners their names back.
//! 6. **`ApplyNames`** -- rename inactive owners with objects to `Ruins`,
//!    delete member-less guilds.
//! 7. **`ReclaimOwnerless`** -- hand every ownerless object to the sentinel.
//! 8. **Decay** -- damage or delete objects held by `Ruins` owners.
//! 9. **`SettleNames`** -- restore `Ruins` owners left without objects and
//!    prune the name history.
//! 10. **`AuditAllowance`** -- log owners above their tile allowance.
//!
//! Phases only touch the session; nothing is persisted until the caller
//! commits the resulting unit of work.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use reclaim_types::OwnerId;
use reclaim_world::{
    AllowancePolicy, Classification, CompiledQuota, DecayReport, ExpiryReport, InventoryIndex,
    MemberAllowance, PendingSummary, QuotaReport, ReclaimReport, RenameReport, SentinelStatus,
    Session, Thresholds, TileWeights, Windows, WorldError, apply_decay, apply_names,
    audit_allowance, classify, enforce_quotas, ensure_sentinel, expire_characters,
    reclaim_ownerless, refresh_name_history, revert_names, settle_names,
};
use tracing::info;

use crate::config::{ConfigError, ReclaimConfig};

/// A named step of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Create or repair the sentinel guild.
    EnsureSentinel,
    /// Derive thresholds, classify characters, cull the event log.
    Classify,
    /// Remove objects over quota.
    EnforceQuota,
    /// Delete long-inactive characters.
    ExpireCharacters,
    /// Restore names of returning owners.
    RevertNames,
    /// Rename inactive owners to `Ruins`.
    ApplyNames,
    /// Hand ownerless objects to the sentinel.
    ReclaimOwnerless,
    /// Damage or delete ruins.
    Decay,
    /// Restore names of ruins left without objects.
    SettleNames,
    /// Log owners above their tile allowance.
    AuditAllowance,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Self; 10] = [
        Self::EnsureSentinel,
        Self::Classify,
        Self::EnforceQuota,
        Self::ExpireCharacters,
        Self::RevertNames,
        Self::ApplyNames,
        Self::ReclaimOwnerless,
        Self::Decay,
        Self::SettleNames,
        Self::AuditAllowance,
    ];

    /// Stable name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::EnsureSentinel => "ensure_sentinel",
            Self::Classify => "classify",
            Self::EnforceQuota => "enforce_quota",
            Self::ExpireCharacters => "expire_characters",
            Self::RevertNames => "revert_names",
            Self::ApplyNames => "apply_names",
            Self::ReclaimOwnerless => "reclaim_ownerless",
            Self::Decay => "decay",
            Self::SettleNames => "settle_names",
            Self::AuditAllowance => "audit_allowance",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the phases need, resolved from the configuration once.
#[derive(Debug, Clone)]
pub struct SweepParams {
    /// Time windows.
    pub windows: Windows,
    /// Guild collecting ownerless objects.
    pub sentinel: OwnerId,
    /// Owners exempt from quotas, expiry, renaming and decay.
    pub whitelist: BTreeSet<OwnerId>,
    /// Quota rules, compiled, in order.
    pub quotas: Vec<CompiledQuota>,
    /// Whether inactive guild members count towards per-member bonuses.
    pub include_inactives: bool,
    /// Tile weights.
    pub weights: TileWeights,
    /// Tile allowance for the audit.
    pub allowance: AllowancePolicy,
}

impl SweepParams {
    /// Resolve the parameters of a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if a quota pattern does not compile.
    pub fn from_config(config: &ReclaimConfig) -> Result<Self, ConfigError> {
        let quotas = config
            .quota
            .rules
            .iter()
            .map(reclaim_world::QuotaRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            windows: config.windows.to_windows(),
            sentinel: OwnerId::new(config.sentinel_owner_id),
            whitelist: config.whitelist.iter().copied().map(OwnerId::new).collect(),
            quotas,
            include_inactives: config.quota.allowance_includes_inactives,
            weights: config.inventory.to_weights(),
            allowance: AllowancePolicy {
                base: config.allowance.base,
                per_member: config.allowance.per_member,
                include_inactives: config.quota.allowance_includes_inactives,
            },
        })
    }
}

/// Outcome of every phase of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// What the sentinel check had to do.
    pub sentinel: SentinelStatus,
    /// Characters by lifecycle state before any change.
    pub classification: Classification,
    /// Quota enforcement.
    pub quota: QuotaReport,
    /// Character expiry.
    pub expiry: ExpiryReport,
    /// Names restored for returning owners.
    pub reverted: RenameReport,
    /// Names applied to inactive owners.
    pub applied: RenameReport,
    /// Ownerless funnel.
    pub reclaim: ReclaimReport,
    /// Decay of ruins.
    pub decay: DecayReport,
    /// Names restored for emptied ruins.
    pub settled: RenameReport,
    /// Owners above their tile allowance.
    pub allowance_breaches: usize,
    /// Pending changes handed to the commit.
    pub pending: PendingSummary,
}

/// Run every phase over `session`.
///
/// # Errors
///
/// Returns [`WorldError`] if the sentinel id belongs to a character or the
/// sentinel is missing when the ownerless funnel runs.
pub fn run_phases<R>(
    session: &mut Session,
    params: &SweepParams,
    rng: &mut R,
) -> Result<PassSummary, WorldError>
where
    R: Rng + ?Sized,
{
    let thresholds = Thresholds::derive(session.now(), &params.windows);

    enter(Phase::EnsureSentinel);
    let sentinel = ensure_sentinel(session, params.sentinel)?;

    enter(Phase::Classify);
    let classification = classify(session.state(), &thresholds);
    session.cull_event_log(thresholds.event_log);
    info!(
        active = classification.active,
        inactive = classification.inactive,
        expired = classification.expired,
        unknown = classification.unknown,
        event_log_cutoff = %thresholds.event_log,
        "classified characters"
    );

    enter(Phase::EnforceQuota);
    let allowance = MemberAllowance {
        include_inactives: params.include_inactives,
        thresholds,
    };
    let quota = enforce_quotas(session, &params.quotas, &params.whitelist, allowance, rng);
    info!(
        violations = quota.violations,
        removed = quota.removed,
        "enforced quotas"
    );

    enter(Phase::ExpireCharacters);
    let expiry = expire_characters(session, &thresholds, &params.whitelist);

    enter(Phase::RevertNames);
    refresh_name_history(session, params.sentinel);
    let reverted = revert_names(session, params.sentinel, &thresholds);

    enter(Phase::ApplyNames);
    let index = InventoryIndex::build(session.state(), params.weights);
    let applied = apply_names(session, params.sentinel, &params.whitelist, &thresholds, &index);

    enter(Phase::ReclaimOwnerless);
    let forced_since = forced_origin(session.now(), &params.windows);
    let reclaim = reclaim_ownerless(session, params.sentinel, forced_since)?;

    enter(Phase::Decay);
    let decay = apply_decay(session, &params.whitelist, &params.windows);

    enter(Phase::SettleNames);
    let index = InventoryIndex::build(session.state(), params.weights);
    let settled = settle_names(session, params.sentinel, &index);
    refresh_name_history(session, params.sentinel);

    enter(Phase::AuditAllowance);
    let breaches = audit_allowance(
        session.state(),
        &index,
        &params.allowance,
        &params.whitelist,
        thresholds.inactivity,
    );

    Ok(PassSummary {
        sentinel,
        classification,
        quota,
        expiry,
        reverted,
        applied,
        reclaim,
        decay,
        settled,
        allowance_breaches: breaches.len(),
        pending: session.pending().summary(),
    })
}

fn enter(phase: Phase) {
    info!(phase = %phase, "entering phase");
}

/// Origin stamped on objects of characters expired in this pass: one purge
/// window ago, so they are removed by the same pass.
#[allow(clippy::arithmetic_side_effects)]
fn forced_origin(now: DateTime<Utc>, windows: &Windows) -> DateTime<Utc> {
    now - windows.purge
}
