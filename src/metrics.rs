//! # Metric Data Model
//!
//! Typed data points and the immutable per-cycle batch handed to consumers.
//!
//! A [`MetricsBuilder`] lives for exactly one cycle: the orchestrator records
//! aggregated values into it and [`MetricsBuilder::build`] consumes it, so no
//! state can leak into the next cycle.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregator::Aggregate;
use crate::config::ReceiverConfig;

/// Metrics produced by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricName {
    RunningQueries,
    ActiveConnections,
    ConnectionCount,
    ActiveUserCount,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunningQueries => "yugabytedb.pg_stat_activity.running_queries",
            Self::ActiveConnections => "yugabytedb.pg_stat_activity.active_connections",
            Self::ConnectionCount => "yugabytedb.connection.count",
            Self::ActiveUserCount => "yugabytedb.active_user.count",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::RunningQueries => "Number of sessions currently executing a query",
            Self::ActiveConnections => "Total number of sessions",
            Self::ConnectionCount => "Sessions grouped by normalized state and user",
            Self::ActiveUserCount => "Active client backend sessions per user",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::RunningQueries => "{queries}",
            Self::ActiveConnections | Self::ConnectionCount => "{connections}",
            Self::ActiveUserCount => "{sessions}",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One sample of one metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDataPoint {
    pub metric: MetricName,
    pub timestamp: DateTime<Utc>,
    pub value: i64,
    pub labels: BTreeMap<String, String>,
}

impl MetricDataPoint {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Everything one cycle produced, ready for a consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsBatch {
    resource: BTreeMap<String, String>,
    collected_at: DateTime<Utc>,
    data_points: Vec<MetricDataPoint>,
}

impl MetricsBatch {
    pub fn resource(&self) -> &BTreeMap<String, String> {
        &self.resource
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn data_points(&self) -> &[MetricDataPoint] {
        &self.data_points
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Data points of a single metric, in recorded order
    pub fn points_for(&self, metric: MetricName) -> impl Iterator<Item = &MetricDataPoint> {
        self.data_points.iter().filter(move |p| p.metric == metric)
    }
}

/// Resource attributes describing the scraped endpoint
pub fn resource_attributes(config: &ReceiverConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("db.system".to_string(), "yugabytedb".to_string()),
        ("server.address".to_string(), config.host.clone()),
        ("server.port".to_string(), config.port.to_string()),
        ("db.name".to_string(), config.database.clone()),
        (
            "yugabytedb.query_mode".to_string(),
            config.mode.as_str().to_string(),
        ),
    ])
}

/// Per-cycle accumulator of data points
#[derive(Debug)]
pub struct MetricsBuilder {
    resource: BTreeMap<String, String>,
    timestamp: DateTime<Utc>,
    data_points: Vec<MetricDataPoint>,
}

impl MetricsBuilder {
    /// Start a batch whose points all carry `timestamp`
    pub fn new(resource: BTreeMap<String, String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            resource,
            timestamp,
            data_points: Vec::new(),
        }
    }

    pub fn record(&mut self, metric: MetricName, value: i64, labels: BTreeMap<String, String>) {
        self.data_points.push(MetricDataPoint {
            metric,
            timestamp: self.timestamp,
            value,
            labels,
        });
    }

    /// Record one finished aggregate, returning the number of points added
    pub fn record_aggregate(&mut self, metric: MetricName, aggregate: &Aggregate) -> usize {
        match aggregate {
            Aggregate::Scalar(total) => {
                self.record(metric, *total, BTreeMap::new());
                1
            }
            Aggregate::Keyed(totals) => {
                for (key, total) in totals {
                    self.record(metric, *total, key.labels());
                }
                totals.len()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    pub fn build(self) -> MetricsBatch {
        MetricsBatch {
            resource: self.resource,
            collected_at: self.timestamp,
            data_points: self.data_points,
        }
    }
}
