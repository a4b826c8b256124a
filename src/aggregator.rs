//! # Row Aggregation
//!
//! Folds the rows of one query into cluster-level totals as they arrive.
//!
//! Scalar queries sum their per-node counts into one value (a single local row
//! is the identity case). Dimensional queries normalize the session state
//! first and then sum counts per [`AggregationKey`], so distinct raw states
//! that share a canonical label land in the same bucket. Node identity is only
//! used for debug logging and is dropped once a row is folded.
//!
//! Totals are kept in a `BTreeMap` so emission order is the key order and
//! identical input always yields identical output.

use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{ReceiverError, Result};
use crate::normalizer::normalize_state;
use crate::queries::{ActivityQuery, RawRow, RowShape};

/// Dimension tuple that per-node rows are folded by
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey {
    pub state: Option<String>,
    pub user: Option<String>,
}

impl AggregationKey {
    pub fn state_and_user<S: Into<String>, U: Into<String>>(state: S, user: U) -> Self {
        Self {
            state: Some(state.into()),
            user: Some(user.into()),
        }
    }

    pub fn user<U: Into<String>>(user: U) -> Self {
        Self {
            state: None,
            user: Some(user.into()),
        }
    }

    /// Metric labels for this key
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        if let Some(state) = &self.state {
            labels.insert("state".to_string(), state.clone());
        }
        if let Some(user) = &self.user {
            labels.insert("user".to_string(), user.clone());
        }
        labels
    }
}

/// Finished totals of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Scalar(i64),
    Keyed(BTreeMap<AggregationKey, i64>),
}

impl Aggregate {
    fn empty(shape: RowShape) -> Self {
        match shape {
            RowShape::Scalar => Self::Scalar(0),
            RowShape::StateAndUser | RowShape::User => Self::Keyed(BTreeMap::new()),
        }
    }

    /// Sum over every key
    pub fn total(&self) -> i64 {
        match self {
            Self::Scalar(total) => *total,
            Self::Keyed(totals) => totals.values().fold(0i64, |acc, v| acc.saturating_add(*v)),
        }
    }

    pub fn get(&self, key: &AggregationKey) -> Option<i64> {
        match self {
            Self::Scalar(_) => None,
            Self::Keyed(totals) => totals.get(key).copied(),
        }
    }
}

/// Result of folding one query's row stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldOutcome {
    pub aggregate: Aggregate,
    pub rows_folded: usize,
    pub rows_skipped: usize,
}

/// Running totals for a single query
#[derive(Debug)]
pub struct Aggregator {
    query: ActivityQuery,
    aggregate: Aggregate,
    rows_folded: usize,
    rows_skipped: usize,
}

impl Aggregator {
    pub fn new(query: ActivityQuery) -> Self {
        Self {
            query,
            aggregate: Aggregate::empty(query.shape()),
            rows_folded: 0,
            rows_skipped: 0,
        }
    }

    /// Fold one row into the running totals.
    ///
    /// A row lacking a dimension its query groups by is rejected as a decode
    /// error and leaves the totals untouched.
    pub fn push(&mut self, row: RawRow) -> Result<()> {
        if let Some(node) = &row.node {
            debug!(
                query = %self.query,
                node = %node,
                state = row.state.as_deref(),
                user = row.user.as_deref(),
                count = row.count,
                "Folding node row"
            );
        }

        let query = self.query;
        match &mut self.aggregate {
            Aggregate::Scalar(total) => {
                *total = total.saturating_add(row.count);
            }
            Aggregate::Keyed(totals) => {
                let key = Self::key_for(query, &row)?;
                let entry = totals.entry(key).or_insert(0);
                *entry = entry.saturating_add(row.count);
            }
        }
        self.rows_folded += 1;
        Ok(())
    }

    /// Note a row that was dropped before reaching the aggregator
    pub fn skip(&mut self, error: &ReceiverError) {
        self.rows_skipped += 1;
        warn!(
            query = %self.query,
            error_kind = error.kind(),
            error = %error,
            "Skipping undecodable row"
        );
    }

    pub fn finish(self) -> FoldOutcome {
        FoldOutcome {
            aggregate: self.aggregate,
            rows_folded: self.rows_folded,
            rows_skipped: self.rows_skipped,
        }
    }

    fn key_for(query: ActivityQuery, row: &RawRow) -> Result<AggregationKey> {
        let user = row
            .user
            .as_deref()
            .ok_or_else(|| ReceiverError::row_decode(query, "row has no user column"))?;

        match query.shape() {
            RowShape::StateAndUser => {
                let state = row
                    .state
                    .as_deref()
                    .ok_or_else(|| ReceiverError::row_decode(query, "row has no state column"))?;
                Ok(AggregationKey::state_and_user(normalize_state(state), user))
            }
            RowShape::User | RowShape::Scalar => Ok(AggregationKey::user(user)),
        }
    }
}

/// Consume a query's row stream, folding each row as it arrives.
///
/// Row-scoped errors are counted and skipped; any other error aborts the
/// query and discards its partial totals.
pub async fn fold_rows<S>(query: ActivityQuery, rows: S) -> Result<FoldOutcome>
where
    S: Stream<Item = Result<RawRow>>,
{
    let mut rows = std::pin::pin!(rows);
    let mut aggregator = Aggregator::new(query);

    while let Some(item) = rows.next().await {
        match item.and_then(|row| aggregator.push(row)) {
            Ok(()) => {}
            Err(e) if e.is_row_scoped() => aggregator.skip(&e),
            Err(e) => return Err(e),
        }
    }

    Ok(aggregator.finish())
}
