//! Configuration loading and typed config structures for the reclaim sweep.
//!
//! The configuration lives in `reclaim-config.yaml` (or the file named by
//! `RECLAIM_CONFIG`). This module defines strongly-typed structs that mirror
//! the YAML structure, provides a loader, and validates the values the sweep
//! depends on. Every field has a default matching the live server settings,
//! so an empty file is a valid configuration.

use std::path::Path;

use chrono::Duration;
use reclaim_types::OwnerId;
use reclaim_world::{QuotaRule, TileWeights, Windows};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "RECLAIM_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "reclaim-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A quota class pattern does not compile.
    #[error("invalid quota rule: {source}")]
    Pattern {
        /// The underlying pattern error.
        #[from]
        source: reclaim_world::WorldError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level sweep configuration.
///
/// Mirrors the structure of `reclaim-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReclaimConfig {
    /// Game database connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Inactivity, expiry, purge and event-log windows.
    #[serde(default)]
    pub windows: WindowsConfig,

    /// Guild collecting every ownerless object.
    #[serde(default = "default_sentinel_owner_id")]
    pub sentinel_owner_id: i64,

    /// Owner ids exempt from quotas, expiry, renaming and decay.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<i64>,

    /// Object quotas.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Tile weights.
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Tile allowance audited after each pass.
    #[serde(default)]
    pub allowance: AllowanceConfig,

    /// Maintenance run after the commit.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            windows: WindowsConfig::default(),
            sentinel_owner_id: default_sentinel_owner_id(),
            whitelist: default_whitelist(),
            quota: QuotaConfig::default(),
            inventory: InventoryConfig::default(),
            allowance: AllowanceConfig::default(),
            maintenance: MaintenanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReclaimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DATABASE_URL` overrides `database.url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or a
    /// validation error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.database.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or a
    /// validation error.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the sweep relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-positive window or an
    /// unowned sentinel id, and [`ConfigError::Pattern`] for a class pattern
    /// that does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("windows.inactivity_days", self.windows.inactivity_days),
            ("windows.long_inactive_days", self.windows.long_inactive_days),
            ("windows.purge_days", self.windows.purge_days),
            (
                "windows.event_log_retention_days",
                self.windows.event_log_retention_days,
            ),
        ];
        for (field, days) in windows {
            if days == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: String::from("must be at least one day"),
                });
            }
        }
        if OwnerId::new(self.sentinel_owner_id).is_unowned() {
            return Err(ConfigError::Invalid {
                field: "sentinel_owner_id",
                reason: String::from("0 is the unowned marker"),
            });
        }
        if self.whitelist.contains(&self.sentinel_owner_id) {
            return Err(ConfigError::Invalid {
                field: "whitelist",
                reason: String::from("the sentinel owner must not be whitelisted"),
            });
        }
        for rule in &self.quota.rules {
            rule.compile()?;
        }
        Ok(())
    }
}

/// Game database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL of the game database.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Seconds to wait on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.url = val;
        }
    }
}

/// Time windows in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowsConfig {
    /// Days without login before an owner is inactive.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: u32,

    /// Days without login before a character is deleted.
    #[serde(default = "default_long_inactive_days")]
    pub long_inactive_days: u32,

    /// Days over which a ruin decays to removal.
    #[serde(default = "default_purge_days")]
    pub purge_days: u32,

    /// Days of event log to keep.
    #[serde(default = "default_event_log_retention_days")]
    pub event_log_retention_days: u32,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            inactivity_days: default_inactivity_days(),
            long_inactive_days: default_long_inactive_days(),
            purge_days: default_purge_days(),
            event_log_retention_days: default_event_log_retention_days(),
        }
    }
}

impl WindowsConfig {
    /// The windows as durations.
    pub fn to_windows(self) -> Windows {
        Windows {
            inactivity: Duration::days(i64::from(self.inactivity_days)),
            long_inactive: Duration::days(i64::from(self.long_inactive_days)),
            purge: Duration::days(i64::from(self.purge_days)),
            event_log_retention: Duration::days(i64::from(self.event_log_retention_days)),
        }
    }
}

/// Object quota settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuotaConfig {
    /// Whether inactive guild members count towards `per_member` bonuses.
    #[serde(default = "default_true")]
    pub allowance_includes_inactives: bool,

    /// Rules applied in order.
    #[serde(default = "default_quota_rules")]
    pub rules: Vec<QuotaRule>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            allowance_includes_inactives: true,
            rules: default_quota_rules(),
        }
    }
}

/// Tile weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InventoryConfig {
    /// Weight of one building piece.
    #[serde(default = "default_building_weight")]
    pub building_weight: Decimal,

    /// Weight of one placeable.
    #[serde(default = "default_placeable_weight")]
    pub placeable_weight: Decimal,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            building_weight: default_building_weight(),
            placeable_weight: default_placeable_weight(),
        }
    }
}

impl InventoryConfig {
    /// The weights as used by the inventory index.
    pub const fn to_weights(self) -> TileWeights {
        TileWeights {
            building: self.building_weight,
            placeable: self.placeable_weight,
        }
    }
}

/// Tile allowance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AllowanceConfig {
    /// Tiles a single player may hold.
    #[serde(default = "default_allowance_base")]
    pub base: u32,

    /// Tiles every guild member after the first adds.
    #[serde(default = "default_allowance_per_member")]
    pub per_member: u32,
}

impl Default for AllowanceConfig {
    fn default() -> Self {
        Self {
            base: default_allowance_base(),
            per_member: default_allowance_per_member(),
        }
    }
}

/// Maintenance steps after the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct MaintenanceConfig {
    /// Rebuild the database file.
    #[serde(default = "default_true")]
    pub vacuum: bool,

    /// Refresh planner statistics.
    #[serde(default = "default_true")]
    pub analyze: bool,

    /// Run `PRAGMA integrity_check`.
    #[serde(default = "default_true")]
    pub integrity_check: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            vacuum: true,
            analyze: true,
            integrity_check: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is
    /// unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_database_url() -> String {
    "sqlite://game.db".to_owned()
}

const fn default_busy_timeout_secs() -> u64 {
    30
}

const fn default_inactivity_days() -> u32 {
    14
}

const fn default_long_inactive_days() -> u32 {
    30
}

const fn default_purge_days() -> u32 {
    5
}

const fn default_event_log_retention_days() -> u32 {
    7
}

const fn default_sentinel_owner_id() -> i64 {
    -20
}

fn default_whitelist() -> Vec<i64> {
    (-19..=-1).collect()
}

const fn default_true() -> bool {
    true
}

fn rule(max: u32, classes: &[&str], per_member: u32) -> QuotaRule {
    QuotaRule {
        max,
        classes: classes.iter().map(|c| (*c).to_owned()).collect(),
        per_member,
    }
}

fn default_quota_rules() -> Vec<QuotaRule> {
    vec![
        rule(5, &["Pippi_Glorb"], 0),
        rule(6, &["Pippi_Flaggi"], 0),
        rule(10, &["Tot_A_BasicNPC"], 1),
        rule(3, &["Tot_A_TraderNPC"], 0),
        rule(1, &["Crafting_Beehive"], 0),
        rule(2, &["Crafting_FishNet", "Crafting_CrabPot"], 0),
        rule(2, &["Compost"], 0),
        rule(1, &["SvS_BP_Dust"], 0),
        rule(2, &["Crafting_Planter"], 0),
        rule(0, &["FeedingContainer"], 0),
        rule(0, &["DwellingNewWall_."], 0),
        rule(0, &["Bedroll_Clean", "Bedroll_Fiber", "Bedroll_Turanian"], 0),
        rule(2, &["AnimalPen_Tier", "AnimalPens", "AnimalPen_Onestall"], 0),
        rule(
            2,
            &["Prefab_Dwelling", "Prefab_NordheimerBuilding", "Prefab_Mound"],
            1,
        ),
    ]
}

const fn default_building_weight() -> Decimal {
    Decimal::ONE
}

const fn default_placeable_weight() -> Decimal {
    Decimal::from_parts(6, 0, 0, false, 1)
}

const fn default_allowance_base() -> u32 {
    500
}

const fn default_allowance_per_member() -> u32 {
    250
}

fn default_log_level() -> String {
    "info".to_owned()
}
