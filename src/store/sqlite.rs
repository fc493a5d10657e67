//! SQLite-backed message store.
//!
//! Records live in a single table whose name is configurable so several
//! applications can share one database file. The schema is created lazily:
//! when a query fails because the table does not exist yet, the store
//! creates it and retries the query once.
//!
//! The free functions at the bottom operate on a plain connection and are
//! meant for callers that already hold a transaction. They do not repair a
//! missing table, since issuing DDL inside an open transaction is unsafe;
//! the structural error propagates there instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio_stream::StreamExt;

use crate::error::Error;
use crate::message::StoredMessage;
use crate::statistics::{MetricsPerMessageType, Statistics};
use crate::utils::{from_epoch_seconds, to_epoch_seconds};

use super::MessageStore;

pub const DEFAULT_TABLE_NAME: &str = "pulsemq_messages";

#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_table_name(pool, DEFAULT_TABLE_NAME)
    }

    pub fn with_table_name(pool: SqlitePool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the monitor table and its indexes if they are missing.
    ///
    /// Called automatically on the first failing query; exposed for hosts
    /// that prefer to set up storage eagerly at boot.
    pub async fn setup(&self) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        setup_schema(&mut conn, &self.table_name).await
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn save(&self, message: &mut StoredMessage) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        match save_message(&mut conn, &self.table_name, message).await {
            Err(err) if err.is_missing_table() => {
                setup_schema(&mut conn, &self.table_name).await?;
                save_message(&mut conn, &self.table_name, message).await
            }
            other => other,
        }
    }

    async fn update(&self, message: &StoredMessage) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        match update_message(&mut conn, &self.table_name, message).await {
            Err(err) if err.is_missing_table() => {
                setup_schema(&mut conn, &self.table_name).await?;
                update_message(&mut conn, &self.table_name, message).await
            }
            other => other,
        }
    }

    async fn find_latest_by_token(&self, token: &str) -> Result<Option<StoredMessage>, Error> {
        let mut conn = self.pool.acquire().await?;

        match find_latest_by_token(&mut conn, &self.table_name, token).await {
            Err(err) if err.is_missing_table() => {
                setup_schema(&mut conn, &self.table_name).await?;
                find_latest_by_token(&mut conn, &self.table_name, token).await
            }
            other => other,
        }
    }

    async fn aggregate(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Statistics, Error> {
        let mut conn = self.pool.acquire().await?;

        match aggregate(&mut conn, &self.table_name, from, to).await {
            Err(err) if err.is_missing_table() => {
                setup_schema(&mut conn, &self.table_name).await?;
                aggregate(&mut conn, &self.table_name, from, to).await
            }
            other => other,
        }
    }
}

/// Creates the monitor table and the indexes backing token lookups and
/// window aggregation.
pub async fn setup_schema(db: &mut SqliteConnection, table_name: &str) -> Result<(), Error> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {table_name} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_uid TEXT NOT NULL,
            class TEXT NOT NULL,
            dispatched_at REAL NOT NULL,
            waiting_time REAL,
            receiver_name TEXT,
            handling_time REAL,
            failing_time REAL
        )"
    ))
    .execute(&mut *db)
    .await?;

    for column in ["message_uid", "dispatched_at", "class"] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table_name}_{column}_idx ON {table_name} ({column})"
        ))
        .execute(&mut *db)
        .await?;
    }

    Ok(())
}

/// Inserts a record and assigns the storage id it got.
pub async fn save_message(
    db: &mut SqliteConnection,
    table_name: &str,
    message: &mut StoredMessage,
) -> Result<(), Error> {
    let id: i64 = sqlx::query_scalar(&format!(
        "INSERT INTO {table_name} (message_uid, class, dispatched_at)
         VALUES ($1, $2, $3)
         RETURNING id"
    ))
    .bind(message.message_uid())
    .bind(message.message_class())
    .bind(to_epoch_seconds(message.dispatched_at()))
    .fetch_one(db)
    .await?;

    message.set_id(id);

    Ok(())
}

/// Writes the mutable columns of an already-saved record.
pub async fn update_message(
    db: &mut SqliteConnection,
    table_name: &str,
    message: &StoredMessage,
) -> Result<(), Error> {
    let Some(id) = message.id() else {
        return Err(Error::precondition(
            "cannot update a stored message that was never saved",
        ));
    };

    let result = sqlx::query(&format!(
        "UPDATE {table_name}
         SET waiting_time = $1, receiver_name = $2, handling_time = $3, failing_time = $4
         WHERE id = $5"
    ))
    .bind(message.waiting_time())
    .bind(message.receiver_name())
    .bind(message.handling_time())
    .bind(message.failing_time())
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::UnknownId { id });
    }

    Ok(())
}

/// Latest record for a token: newest dispatch wins, ties break towards the
/// highest id so redeliveries resolve deterministically.
pub async fn find_latest_by_token(
    db: &mut SqliteConnection,
    table_name: &str,
    token: &str,
) -> Result<Option<StoredMessage>, Error> {
    let row = sqlx::query(&format!(
        "SELECT id, message_uid, class, dispatched_at,
                waiting_time, receiver_name, handling_time, failing_time
         FROM {table_name}
         WHERE message_uid = $1
         ORDER BY dispatched_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(token)
    .fetch_optional(db)
    .await?;

    row.map(decode_message).transpose()
}

/// Per-class counts and duration averages over a dispatch window.
///
/// `COUNT` includes records whose durations are still null; `AVG` skips
/// them, so a class that was dispatched but never received reports a count
/// with absent averages.
pub async fn aggregate(
    db: &mut SqliteConnection,
    table_name: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Statistics, Error> {
    let query = format!(
        "SELECT class, COUNT(id) AS messages_count,
                AVG(waiting_time) AS average_waiting_time,
                AVG(handling_time) AS average_handling_time
         FROM {table_name}
         WHERE dispatched_at >= $1 AND dispatched_at <= $2
         GROUP BY class
         ORDER BY class"
    );

    let mut stream = sqlx::query_as::<_, MetricsRow>(&query)
        .bind(to_epoch_seconds(from))
        .bind(to_epoch_seconds(to))
        .fetch(db);

    let mut statistics = Statistics::new(from, to);

    while let Some(row) = stream.next().await.transpose()? {
        statistics.add(MetricsPerMessageType::new(
            from,
            to,
            row.class,
            row.messages_count,
            row.average_waiting_time,
            row.average_handling_time,
        ));
    }

    Ok(statistics)
}

fn decode_message(row: SqliteRow) -> Result<StoredMessage, Error> {
    Ok(StoredMessage::hydrate(
        row.try_get("id")?,
        row.try_get("message_uid")?,
        row.try_get("class")?,
        from_epoch_seconds(row.try_get("dispatched_at")?),
        row.try_get("waiting_time")?,
        row.try_get("receiver_name")?,
        row.try_get("handling_time")?,
        row.try_get("failing_time")?,
    ))
}

#[derive(sqlx::FromRow)]
struct MetricsRow {
    class: String,
    messages_count: i64,
    average_waiting_time: Option<f64>,
    average_handling_time: Option<f64>,
}
