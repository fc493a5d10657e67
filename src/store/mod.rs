//! Persistence port for stored message records.
//!
//! Every side effect of the lifecycle listener goes through the
//! [`MessageStore`] trait, so the backing store can be swapped out and the
//! listener tested against an in-memory double. The SQLite implementation
//! in [`sqlite`] is the reference backend; [`memory`] keeps records in
//! process memory for tests and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::message::StoredMessage;
use crate::statistics::Statistics;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryMessageStore;
pub use sqlite::SqliteMessageStore;

/// Durable storage for message timing records.
///
/// Implementations must be safe under concurrent use from independent
/// workers; all coordination happens through the store itself, keyed by the
/// monitor token. Relational backends should lean on the store's native
/// transaction isolation instead of application-level locks.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts a new record and assigns its storage id.
    async fn save(&self, message: &mut StoredMessage) -> Result<(), Error>;

    /// Writes the mutable fields (`waiting_time`, `receiver_name`,
    /// `handling_time`, `failing_time`) of an already-saved record.
    ///
    /// Fails with [`Error::UnknownId`] when the id does not exist, and with
    /// [`Error::Precondition`] when the record was never saved.
    async fn update(&self, message: &StoredMessage) -> Result<(), Error>;

    /// Resolves the most recently dispatched record for a token, or `None`.
    ///
    /// Redelivery creates a new record per dispatch under the same token, so
    /// the latest `dispatched_at` wins; ties break towards the highest id.
    async fn find_latest_by_token(&self, token: &str) -> Result<Option<StoredMessage>, Error>;

    /// Groups records dispatched within `[from, to]` by message class,
    /// counting every record and averaging the durations that are present.
    async fn aggregate(&self, from: DateTime<Utc>, to: DateTime<Utc>)
        -> Result<Statistics, Error>;
}
