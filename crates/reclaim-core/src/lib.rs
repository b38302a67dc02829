//! Run configuration, phase pipeline and pass orchestration for the reclaim
//! sweep.
//!
//! A pass loads the world from a [`WorldStore`], runs the ten phases of
//! [`pipeline`] over one session and commits the resulting unit of work in a
//! single transaction before the store is maintained.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `reclaim-config.yaml` into
//!   strongly-typed structs.
//! - [`pass`] -- [`run_pass`]: load, phases, commit, maintenance.
//! - [`pipeline`] -- The fixed [`Phase`] sequence and [`SweepParams`].
//!
//! [`WorldStore`]: reclaim_world::WorldStore

pub mod config;
pub mod pass;
pub mod pipeline;

// Re-export primary types at crate root.
pub use config::{ConfigError, ReclaimConfig};
pub use pass::{PassError, PassOutcome, run_pass};
pub use pipeline::{PassSummary, Phase, SweepParams, run_phases};
