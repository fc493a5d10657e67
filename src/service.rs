use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{
        SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode,
        SqlitePoolOptions,
    },
    SqlitePool,
};

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    error::Error,
    listener::MonitorListener,
    message::StoredMessage,
    statistics::Statistics,
    store::{MessageStore, SqliteMessageStore},
};

/// Connection bootstrap and facade over the monitor's moving parts.
///
/// Opens the SQLite pool, hands out the store and listener, and exposes the
/// read-side queries consumed by dashboard collaborators.
pub struct Service {
    db: SqlitePool,
    config: Config,
}

impl Service {
    pub async fn connect() -> Result<Self, Error> {
        Self::connect_with(Config::default()).await
    }

    pub async fn connect_with(config: Config) -> Result<Self, Error> {
        let opts = if let Some(path) = config.db_path() {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        } else {
            SqliteConnectOptions::new().in_memory(true)
        }
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .locking_mode(SqliteLockingMode::Normal)
        .optimize_on_close(true, None)
        .auto_vacuum(SqliteAutoVacuum::Full);

        // An in-memory database exists per connection; a pool of them would
        // each see their own empty schema.
        let pool_opts = if config.db_path().is_none() {
            SqlitePoolOptions::new().max_connections(1)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_opts.connect_with(opts).await?;

        Ok(Self { db: pool, config })
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> SqliteMessageStore {
        SqliteMessageStore::with_table_name(self.db.clone(), self.config.table_name())
    }

    /// Listener wired to this service's store and the system clock.
    pub fn listener(&self) -> MonitorListener {
        self.listener_with_clock(Arc::new(SystemClock))
    }

    /// Listener with a caller-supplied clock, for deterministic tests.
    pub fn listener_with_clock(&self, clock: Arc<dyn Clock>) -> MonitorListener {
        MonitorListener::new(Arc::new(self.store()), clock)
    }

    /// Read side: the most recent record for a monitor token.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_token(&self, token: &str) -> Result<Option<StoredMessage>, Error> {
        self.store().find_latest_by_token(token).await
    }

    /// Read side: per-class metrics for messages dispatched in the window.
    #[tracing::instrument(skip(self))]
    pub async fn compute_statistics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Statistics, Error> {
        self.store().aggregate(from, to).await
    }
}
