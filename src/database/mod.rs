//! # Database Access
//!
//! The per-cycle connection and the query executor running on it.
//!
//! The scrape pipeline only talks to the [`Connector`] and [`ActivitySession`]
//! traits. [`PgConnector`] is the sqlx-backed implementation; tests supply
//! in-memory ones.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use yugabytedb_receiver::config::ReceiverConfig;
//! use yugabytedb_receiver::database::{Connector, PgConnector};
//! use yugabytedb_receiver::queries::ActivityQuery;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = PgConnector::new(ReceiverConfig::default());
//! let mut session = connector.open().await?;
//!
//! let mut rows = session.fetch(ActivityQuery::ActiveConnections);
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row?);
//! }
//! drop(rows);
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::queries::{ActivityQuery, RawRow};

pub use connection::{PgConnector, PgSession};

/// Opens one database session per scrape cycle
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a fresh session. Sessions are never pooled or reused.
    async fn open(&self) -> Result<Box<dyn ActivitySession>>;
}

/// An open connection able to run the activity queries
#[async_trait]
pub trait ActivitySession: Send {
    /// Execute `query`, yielding its rows lazily in a single pass.
    ///
    /// A rejected statement or a broken result stream surfaces as a
    /// `ReceiverError::Query` item; a row that cannot be decoded surfaces as a
    /// `ReceiverError::RowDecode` item and iteration may continue past it.
    fn fetch(&mut self, query: ActivityQuery) -> BoxStream<'_, Result<RawRow>>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;
}
