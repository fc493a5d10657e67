//! Per-message lifecycle metrics for message-queue workers.
//!
//! `pulsemq` stamps every dispatched message with a unique monitor token,
//! records its lifecycle timestamps (dispatch, receive, handled or failed)
//! in SQLite, and aggregates per-class wait and handling durations over
//! arbitrary time windows for dashboards.
//!
//! The host framework keeps owning delivery, retries and transport; it only
//! calls the [`listener::MonitorListener`] hooks at each lifecycle
//! transition and maps its envelope type onto [`envelope::Envelope`].
//!
//! ```no_run
//! use pulsemq::{envelope::Envelope, service::Service};
//!
//! # async fn demo() -> Result<(), pulsemq::error::Error> {
//! let service = Service::connect().await?;
//! let listener = service.listener();
//!
//! // Dispatch side.
//! let mut envelope = Envelope::new("OrderCreated");
//! listener.on_dispatch(&mut envelope).await?;
//!
//! // Worker side, typically in another process.
//! listener.on_receive(&envelope, "async_worker").await?;
//! listener.on_handled(&envelope).await?;
//! # Ok(())
//! # }
//! ```

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod message;
pub mod service;
pub mod stamp;
pub mod statistics;
pub mod store;
pub mod utils;

/// Installs the global tracing subscriber, filtered through `PULSEMQ_LOG`.
///
/// Pretty output in debug builds, JSON in release builds. Hosts that
/// install their own subscriber should skip this.
pub fn init_tracing() -> eyre::Result<()> {
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("PULSEMQ_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("PULSEMQ_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    Ok(())
}
