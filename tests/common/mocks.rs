//! In-memory connector, session and consumer doubles for pipeline tests

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use yugabytedb_receiver::queries::RowShape;
use yugabytedb_receiver::{
    ActivityQuery, ActivitySession, Connector, MetricsBatch, MetricsConsumer, NodeIdentity,
    RawRow, ReceiverError, Result,
};

/// One scripted item of a result stream
#[derive(Debug, Clone)]
pub enum ScriptedRow {
    Row(RawRow),
    DecodeFailure(String),
    StreamFailure(String),
}

/// Scripted behaviour of one query
#[derive(Debug, Clone)]
pub enum QueryScript {
    Rows(Vec<ScriptedRow>),
    /// Statement rejected by the server
    Rejected(String),
    /// Driver panics while producing the first row
    Panic,
    /// Never yields, until the cycle is cancelled
    Hang,
    /// Yields the rows after a delay
    Slow(Duration, Vec<ScriptedRow>),
}

impl QueryScript {
    pub fn rows(rows: Vec<RawRow>) -> Self {
        Self::Rows(rows.into_iter().map(ScriptedRow::Row).collect())
    }
}

/// Counters shared between a connector and the sessions it opens
#[derive(Debug, Default)]
pub struct ConnectionLedger {
    pub open_attempts: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub fetched: Mutex<Vec<ActivityQuery>>,
}

impl ConnectionLedger {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<ActivityQuery> {
        self.fetched.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct MockConnector {
    pub scripts: HashMap<ActivityQuery, QueryScript>,
    pub fail_connect: bool,
    pub fail_close: bool,
    pub hang_close: bool,
    pub ledger: Arc<ConnectionLedger>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub fn with_script(mut self, query: ActivityQuery, script: QueryScript) -> Self {
        self.scripts.insert(query, script);
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_hanging_close(mut self) -> Self {
        self.hang_close = true;
        self
    }

    pub fn ledger(&self) -> Arc<ConnectionLedger> {
        Arc::clone(&self.ledger)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self) -> Result<Box<dyn ActivitySession>> {
        self.ledger.open_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ReceiverError::Connect(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        self.ledger.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            scripts: self.scripts.clone(),
            fail_close: self.fail_close,
            hang_close: self.hang_close,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

pub struct MockSession {
    scripts: HashMap<ActivityQuery, QueryScript>,
    fail_close: bool,
    hang_close: bool,
    ledger: Arc<ConnectionLedger>,
}

fn scripted_stream(query: ActivityQuery, rows: Vec<ScriptedRow>) -> BoxStream<'static, Result<RawRow>> {
    stream::iter(rows.into_iter().map(move |item| match item {
        ScriptedRow::Row(row) => Ok(row),
        ScriptedRow::DecodeFailure(reason) => Err(ReceiverError::row_decode(query, reason)),
        ScriptedRow::StreamFailure(reason) => Err(ReceiverError::query(query, reason)),
    }))
    .boxed()
}

#[async_trait]
impl ActivitySession for MockSession {
    fn fetch(&mut self, query: ActivityQuery) -> BoxStream<'_, Result<RawRow>> {
        self.ledger.fetched.lock().unwrap().push(query);

        match self.scripts.get(&query).cloned() {
            None if query.shape() == RowShape::Scalar => {
                stream::iter(vec![Ok(RawRow::scalar(0))]).boxed()
            }
            None => stream::empty().boxed(),
            Some(QueryScript::Rows(rows)) => scripted_stream(query, rows),
            Some(QueryScript::Rejected(reason)) => {
                stream::iter(vec![Err(ReceiverError::query(query, reason))]).boxed()
            }
            Some(QueryScript::Panic) => stream::poll_fn(|_| -> Poll<Option<Result<RawRow>>> {
                panic!("simulated driver panic")
            })
            .boxed(),
            Some(QueryScript::Hang) => stream::pending().boxed(),
            Some(QueryScript::Slow(delay, rows)) => stream::once(tokio::time::sleep(delay))
                .flat_map(move |_| scripted_stream(query, rows.clone()))
                .boxed(),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.ledger.closed.fetch_add(1, Ordering::SeqCst);
        if self.hang_close {
            std::future::pending::<()>().await;
        }
        if self.fail_close {
            return Err(ReceiverError::Connect(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

/// Keeps every batch it receives
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    batches: Mutex<Vec<MetricsBatch>>,
}

impl RecordingConsumer {
    pub fn batches(&self) -> Vec<MetricsBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsConsumer for RecordingConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }
}

/// Rejects the first `failures` batches, then accepts
#[derive(Debug, Default)]
pub struct FlakyConsumer {
    pub failures: usize,
    calls: AtomicUsize,
    accepted: Mutex<Vec<MetricsBatch>>,
}

impl FlakyConsumer {
    pub fn rejecting(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> Vec<MetricsBatch> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsConsumer for FlakyConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ReceiverError::consume("downstream unavailable"));
        }
        self.accepted.lock().unwrap().push(batch);
        Ok(())
    }
}

pub fn node(host: &str) -> NodeIdentity {
    NodeIdentity {
        host: host.to_string(),
        zone: "zone-a".to_string(),
        region: "region-1".to_string(),
        cloud: "cloud".to_string(),
    }
}
