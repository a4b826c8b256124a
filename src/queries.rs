//! # Session Activity Queries
//!
//! The fixed catalogue of read-only analytic queries run against
//! `pg_stat_activity` (local mode) or the cluster-wide
//! `gv_history."gv$pg_stat_activity"` view (global mode), and the raw row
//! shape they produce.
//!
//! Global-view queries return one row per node (or per node and dimension);
//! node identity travels with each [`RawRow`] until the aggregator folds it
//! away.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::MetricName;

/// Which session activity view the receiver reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// The connected node's own `pg_stat_activity`
    #[default]
    Local,
    /// The cluster-aggregating `gv$pg_stat_activity` view
    GlobalView,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::GlobalView => "global_view",
        }
    }

    /// Queries to run each cycle, in execution order
    pub fn query_set(&self) -> &'static [ActivityQuery] {
        match self {
            Self::Local => &LOCAL_QUERY_SET,
            Self::GlobalView => &GLOBAL_VIEW_QUERY_SET,
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LOCAL_QUERY_SET: [ActivityQuery; 3] = [
    ActivityQuery::RunningQueries,
    ActivityQuery::ActiveConnections,
    ActivityQuery::ConnectionsByStateAndUser,
];

const GLOBAL_VIEW_QUERY_SET: [ActivityQuery; 4] = [
    ActivityQuery::RunningQueries,
    ActivityQuery::ActiveConnections,
    ActivityQuery::ConnectionsByStateAndUser,
    ActivityQuery::ActiveUsers,
];

/// How a query's rows are folded into metric values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// A single total, summed across nodes in global mode
    Scalar,
    /// Totals keyed by normalized state and user
    StateAndUser,
    /// Totals keyed by user
    User,
}

/// One query of the scrape catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityQuery {
    /// Sessions in `active` state
    RunningQueries,
    /// All sessions
    ActiveConnections,
    /// Sessions grouped by state and user
    ConnectionsByStateAndUser,
    /// Active client-backend sessions grouped by user
    ActiveUsers,
}

impl ActivityQuery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunningQueries => "running_queries",
            Self::ActiveConnections => "active_connections",
            Self::ConnectionsByStateAndUser => "connections_by_state_and_user",
            Self::ActiveUsers => "active_users",
        }
    }

    pub fn shape(&self) -> RowShape {
        match self {
            Self::RunningQueries | Self::ActiveConnections => RowShape::Scalar,
            Self::ConnectionsByStateAndUser => RowShape::StateAndUser,
            Self::ActiveUsers => RowShape::User,
        }
    }

    /// Metric this query feeds
    pub fn metric(&self) -> MetricName {
        match self {
            Self::RunningQueries => MetricName::RunningQueries,
            Self::ActiveConnections => MetricName::ActiveConnections,
            Self::ConnectionsByStateAndUser => MetricName::ConnectionCount,
            Self::ActiveUsers => MetricName::ActiveUserCount,
        }
    }

    /// Name of the count column in this query's result set
    pub fn count_column(&self) -> &'static str {
        match self {
            Self::ActiveUsers => "user_session_count",
            _ => "count",
        }
    }

    /// SQL text for this query in the given mode.
    ///
    /// The active-user query only exists against the global view; in local
    /// mode it falls back to the single-node equivalent with the same columns.
    pub fn sql(&self, mode: QueryMode) -> &'static str {
        match (mode, self) {
            (QueryMode::Local, Self::RunningQueries) => LOCAL_RUNNING_QUERIES,
            (QueryMode::Local, Self::ActiveConnections) => LOCAL_ACTIVE_CONNECTIONS,
            (QueryMode::Local, Self::ConnectionsByStateAndUser) => LOCAL_CONNECTIONS_BY_STATE_AND_USER,
            (QueryMode::Local, Self::ActiveUsers) => LOCAL_ACTIVE_USERS,
            (QueryMode::GlobalView, Self::RunningQueries) => GLOBAL_RUNNING_QUERIES,
            (QueryMode::GlobalView, Self::ActiveConnections) => GLOBAL_ACTIVE_CONNECTIONS,
            (QueryMode::GlobalView, Self::ConnectionsByStateAndUser) => {
                GLOBAL_CONNECTIONS_BY_STATE_AND_USER
            }
            (QueryMode::GlobalView, Self::ActiveUsers) => GLOBAL_ACTIVE_USERS,
        }
    }
}

impl fmt::Display for ActivityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Local queries: the connected node only
// ============================================================================

const LOCAL_RUNNING_QUERIES: &str =
    "SELECT count(*) AS count FROM pg_stat_activity WHERE state = 'active'";

const LOCAL_ACTIVE_CONNECTIONS: &str = "SELECT count(*) AS count FROM pg_stat_activity";

const LOCAL_CONNECTIONS_BY_STATE_AND_USER: &str = r#"
    SELECT
        COALESCE(state, 'unknown') AS state,
        COALESCE(usename, 'unknown') AS usename,
        count(*) AS count
    FROM pg_stat_activity
    GROUP BY state, usename"#;

const LOCAL_ACTIVE_USERS: &str = r#"
    SELECT
        COALESCE(usename, 'unknown') AS usename,
        count(*) AS user_session_count
    FROM pg_stat_activity
    WHERE state = 'active'
    AND backend_type = 'client backend'
    GROUP BY usename"#;

// ============================================================================
// Global view queries: one row per node, annotated with node identity
// ============================================================================

const GLOBAL_RUNNING_QUERIES: &str = r#"
    SELECT
        "gv$host",
        "gv$zone",
        "gv$region",
        "gv$cloud",
        count(*) AS count
    FROM gv_history."gv$pg_stat_activity"
    WHERE state = 'active'
    GROUP BY "gv$host", "gv$zone", "gv$region", "gv$cloud""#;

const GLOBAL_ACTIVE_CONNECTIONS: &str = r#"
    SELECT
        "gv$host",
        "gv$zone",
        "gv$region",
        "gv$cloud",
        count(*) AS count
    FROM gv_history."gv$pg_stat_activity"
    GROUP BY "gv$host", "gv$zone", "gv$region", "gv$cloud""#;

const GLOBAL_CONNECTIONS_BY_STATE_AND_USER: &str = r#"
    SELECT
        "gv$host",
        "gv$zone",
        "gv$region",
        "gv$cloud",
        COALESCE(state, 'unknown') AS state,
        COALESCE(usename, 'unknown') AS usename,
        count(*) AS count
    FROM gv_history."gv$pg_stat_activity"
    GROUP BY "gv$host", "gv$zone", "gv$region", "gv$cloud", state, usename"#;

const GLOBAL_ACTIVE_USERS: &str = r#"
    SELECT
        "gv$host",
        "gv$zone",
        "gv$region",
        "gv$cloud",
        COALESCE(usename, 'unknown') AS usename,
        count(*) AS user_session_count
    FROM gv_history."gv$pg_stat_activity"
    WHERE state = 'active'
    AND backend_type = 'client backend'
    GROUP BY "gv$host", "gv$zone", "gv$region", "gv$cloud", usename"#;

/// Identity of the node a global-view row came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub host: String,
    pub zone: String,
    pub region: String,
    pub cloud: String,
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cloud, self.region, self.zone, self.host
        )
    }
}

/// One decoded result row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub count: i64,
    /// Present for global-view rows only
    pub node: Option<NodeIdentity>,
    /// Raw, not yet normalized, session state
    pub state: Option<String>,
    pub user: Option<String>,
}

impl RawRow {
    pub fn scalar(count: i64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: NodeIdentity) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_state<S: Into<String>>(mut self, state: S) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }
}
