//! Shared type definitions for the reclaim sweep.
//!
//! This crate is the single source of truth for the entities the sweep reads
//! from and writes back to the game database. It has no logic beyond small
//! helpers and depends only on `serde` and `chrono`.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed integer identifiers ([`OwnerId`], [`ObjectId`]).
//! - [`structs`] -- Characters, guilds, buildable objects, health parts and
//!   thrall ownership markers.

pub mod ids;
pub mod structs;

pub use ids::{ObjectId, OwnerId};
pub use structs::{
    BuildableObject, Character, Guild, HealthPart, OWNER_MARKER_SUFFIX, Position, RUINS_NAME,
    ThrallLink,
};
