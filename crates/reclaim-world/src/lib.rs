//! Ownership reclamation engine for a game server database.
//!
//! This crate decides, for every owned structure in the world, whether it is
//! kept, trimmed by a quota, handed to the sentinel owner, decayed or
//! deleted. It works on an in-memory [`WorldState`] through a [`Session`]
//! that records every change in a [`UnitOfWork`] for a single commit.
//!
//! # Modules
//!
//! - [`allowance`] -- Read-only tile allowance audit.
//! - [`classifier`] -- [`ClassMatcher`] trait and `LIKE`-style class patterns.
//! - [`decay`] -- Linear health decay and removal of ruins.
//! - [`error`] -- Error types for sweep operations.
//! - [`inventory`] -- Weighted per-owner tile accounting.
//! - [`lifecycle`] -- Time windows, character classification and expiry.
//! - [`quota`] -- Per-owner object quotas with random eviction.
//! - [`reclaim`] -- The sentinel owner and the ownerless funnel.
//! - [`rename`] -- The `Ruins` rename state machine.
//! - [`session`] -- World state plus pending changes, with the bulk
//!   mutation primitives.
//! - [`snapshot`] -- Name-history and ownerless-object snapshots.
//! - [`state`] -- The in-memory world and the [`OwnerView`] abstraction.
//! - [`store`] -- The [`WorldStore`] persistence seam.
//! - [`unit_of_work`] -- Pending mutations keyed by entity id.
//!
//! [`ClassMatcher`]: classifier::ClassMatcher

pub mod allowance;
pub mod classifier;
pub mod decay;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod quota;
pub mod reclaim;
pub mod rename;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod unit_of_work;

// Re-export primary types at crate root.
pub use allowance::{AllowanceBreach, AllowancePolicy, audit_allowance};
pub use classifier::{ClassMatcher, ClassSet, LikePattern};
pub use decay::{DecayOrigin, DecayReport, apply_decay, damage};
pub use error::WorldError;
pub use inventory::{InventoryIndex, OwnerTiles, TileWeights};
pub use lifecycle::{
    Classification, ExpiryReport, Lifecycle, Thresholds, Windows, classify, expire_characters,
};
pub use quota::{CompiledQuota, MemberAllowance, QuotaReport, QuotaRule, enforce_quotas};
pub use reclaim::{ReclaimReport, SentinelStatus, ensure_sentinel, reclaim_ownerless};
pub use rename::{RenameReport, apply_names, revert_names, settle_names};
pub use session::Session;
pub use snapshot::{SnapshotDelta, refresh_name_history, refresh_ownerless};
pub use state::{Activity, OwnerView, WorldState};
pub use store::{CommitReport, MaintenanceReport, WorldStore};
pub use unit_of_work::{HealthKey, PendingSummary, UnitOfWork};
