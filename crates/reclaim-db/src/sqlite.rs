//! `SQLite` connection to the game database.
//!
//! The game server keeps its whole world in a single `SQLite` file. The sweep
//! opens it through a small [`sqlx`] pool; the server itself is expected to
//! be stopped, but a busy timeout covers backup tools still holding a lock.
//!
//! Queries are built at runtime (not compile-time checked) so no live
//! database is needed at build time. All values are bound as parameters.

use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default busy timeout in seconds.
const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

/// Configuration for the game database connection.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `SQLite` connection URL.
    ///
    /// Format: `sqlite://path/to/game.db` or `sqlite::memory:`
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long a statement waits for a lock held by another process.
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration from a database URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Connection pool handle to the game database.
#[derive(Debug, Clone)]
pub struct GameDb {
    pool: SqlitePool,
}

impl GameDb {
    /// Open the game database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Sqlite`] if the connection fails.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        let connect_options: SqliteConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("Invalid database URL: {e}")))?;
        // The game server runs without enforced references.
        let connect_options = connect_options
            .busy_timeout(config.busy_timeout)
            .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await?;

        tracing::info!(
            url = config.url.as_str(),
            max_connections = config.max_connections,
            busy_timeout_secs = config.busy_timeout.as_secs(),
            "Connected to game database"
        );

        Ok(Self { pool })
    }

    /// Create the bookkeeping tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Bookkeeping migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Game database closed");
    }
}
