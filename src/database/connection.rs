use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Row};
use tracing::debug;

use super::{ActivitySession, Connector};
use crate::config::ReceiverConfig;
use crate::error::{ReceiverError, Result};
use crate::queries::{ActivityQuery, NodeIdentity, QueryMode, RawRow, RowShape};

/// Connects to YugabyteDB's YSQL endpoint with a dedicated connection
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
    mode: QueryMode,
    connect_timeout: std::time::Duration,
}

impl PgConnector {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            options: config.connect_options(),
            mode: config.mode,
            connect_timeout: config.connect_timeout(),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self) -> Result<Box<dyn ActivitySession>> {
        let conn = tokio::time::timeout(
            self.connect_timeout,
            PgConnection::connect_with(&self.options),
        )
        .await
        .map_err(|_| {
            ReceiverError::Connect(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out establishing connection",
            )))
        })?
        .map_err(ReceiverError::Connect)?;

        debug!(
            host = %self.options.get_host(),
            port = self.options.get_port(),
            mode = %self.mode,
            "Opened YugabyteDB connection"
        );

        Ok(Box::new(PgSession {
            conn,
            mode: self.mode,
        }))
    }
}

/// A single YSQL connection owned by one scrape cycle
pub struct PgSession {
    conn: PgConnection,
    mode: QueryMode,
}

impl std::fmt::Debug for PgSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSession")
            .field("mode", &self.mode)
            .field("conn", &"PgConnection")
            .finish()
    }
}

#[async_trait]
impl ActivitySession for PgSession {
    fn fetch(&mut self, query: ActivityQuery) -> BoxStream<'_, Result<RawRow>> {
        let mode = self.mode;
        sqlx::query(query.sql(mode))
            .fetch(&mut self.conn)
            .map(move |result| match result {
                Ok(row) => decode_row(query, mode, &row),
                Err(e) => Err(ReceiverError::query(query, e)),
            })
            .boxed()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await.map_err(ReceiverError::Connect)
    }
}

fn decode_row(query: ActivityQuery, mode: QueryMode, row: &PgRow) -> Result<RawRow> {
    let decode = |e: sqlx::Error| ReceiverError::row_decode(query, e);

    let mut raw = RawRow::scalar(row.try_get::<i64, _>(query.count_column()).map_err(decode)?);

    if mode == QueryMode::GlobalView {
        raw.node = Some(NodeIdentity {
            host: optional_text(row, "gv$host").map_err(decode)?,
            zone: optional_text(row, "gv$zone").map_err(decode)?,
            region: optional_text(row, "gv$region").map_err(decode)?,
            cloud: optional_text(row, "gv$cloud").map_err(decode)?,
        });
    }

    match query.shape() {
        RowShape::Scalar => {}
        RowShape::StateAndUser => {
            raw.state = Some(row.try_get::<String, _>("state").map_err(decode)?);
            raw.user = Some(row.try_get::<String, _>("usename").map_err(decode)?);
        }
        RowShape::User => {
            raw.user = Some(row.try_get::<String, _>("usename").map_err(decode)?);
        }
    }

    Ok(raw)
}

fn optional_text(row: &PgRow, column: &str) -> std::result::Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}
