//! Reclaim engine binary.
//!
//! Runs one sweep over the game database and exits. Meant to be scheduled
//! while the game server is stopped (cron, systemd timer, restart hook).
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `reclaim-config.yaml` or `$RECLAIM_CONFIG`
//! 2. Initialize structured logging (tracing)
//! 3. Compile the sweep parameters
//! 4. Open the game database and apply bookkeeping migrations
//! 5. Run the pass inside a span carrying a fresh run id
//! 6. Close the database and log the outcome

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reclaim_core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, LoggingConfig};
use reclaim_core::{ReclaimConfig, SweepParams, run_pass};
use reclaim_db::{GameDb, MaintenanceOptions, SqliteConfig, SqliteStore};
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the database cannot be
/// opened or the pass fails. The process then exits non-zero.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let (config, source) = load_config()?;
    init_logging(&config.logging);

    match &source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }

    let run_id = Uuid::now_v7();
    let result = sweep(&config)
        .instrument(info_span!("sweep", %run_id))
        .await;
    if let Err(e) = &result {
        error!(%run_id, error = %e, "Sweep failed");
    }
    result
}

/// Read the configuration file.
///
/// An explicit `$RECLAIM_CONFIG` must exist. Without it a missing
/// `reclaim-config.yaml` falls back to defaults. Returns the path actually
/// read, if any.
fn load_config() -> Result<(ReclaimConfig, Option<PathBuf>), EngineError> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(explicit);
        let config = ReclaimConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let path = Path::new(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = ReclaimConfig::from_file(path)?;
        Ok((config, Some(path.to_path_buf())))
    } else {
        let mut config = ReclaimConfig::default();
        config.database.apply_env_overrides();
        Ok((config, None))
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn sweep(config: &ReclaimConfig) -> Result<(), EngineError> {
    let params = SweepParams::from_config(config)?;
    info!(
        sentinel = %params.sentinel,
        whitelist = params.whitelist.len(),
        quota_rules = params.quotas.len(),
        "Sweep parameters compiled"
    );

    let db_config = SqliteConfig::new(&config.database.url)
        .with_busy_timeout(Duration::from_secs(config.database.busy_timeout_secs));
    let db = GameDb::connect(&db_config).await?;
    if let Err(e) = db.run_migrations().await {
        db.close().await;
        return Err(e.into());
    }

    let maintenance = MaintenanceOptions {
        vacuum: config.maintenance.vacuum,
        analyze: config.maintenance.analyze,
        integrity_check: config.maintenance.integrity_check,
    };
    let mut store = SqliteStore::new(db.clone(), maintenance);
    let mut rng = StdRng::from_os_rng();

    let outcome = run_pass(&mut store, &params, Utc::now(), &mut rng).await;
    db.close().await;
    let outcome = outcome?;

    info!(
        removed_by_quota = outcome.summary.quota.removed,
        expired = outcome.summary.expiry.characters,
        decayed_parts = outcome.summary.decay.damaged_parts,
        ruins_removed = outcome.summary.decay.removed_objects,
        rows_affected = outcome.commit.rows_affected,
        vacuumed = outcome.maintenance.vacuumed,
        integrity_checked = outcome.maintenance.integrity_checked,
        allowance_breaches = outcome.summary.allowance_breaches,
        "Sweep complete"
    );
    Ok(())
}
