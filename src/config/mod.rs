//! # Receiver Configuration
//!
//! Connection parameters for the scraped YugabyteDB endpoint plus the knobs
//! that select how it is scraped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use yugabytedb_receiver::config::ReceiverConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // File values first, then YUGABYTEDB_* environment overrides
//! let config = ReceiverConfig::load(Some(Path::new("config/receiver.yaml")))?;
//!
//! let interval = config.collection_interval();
//! let options = config.connect_options();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::time::Duration;

use crate::error::{ReceiverError, Result};
use crate::queries::QueryMode;

pub use loader::ENV_PREFIX;

/// Transport security used for the database connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    #[default]
    Disable,
    Require,
}

impl TlsMode {
    fn ssl_mode(self) -> PgSslMode {
        match self {
            Self::Disable => PgSslMode::Disable,
            Self::Require => PgSslMode::Require,
        }
    }
}

/// Root configuration of the receiver
///
/// Keys the receiver does not know (such as the host pipeline's server
/// exposure block) are ignored when deserializing.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,

    /// Seconds between scrape cycles
    pub collection_interval_seconds: u64,

    /// Which session activity view to query
    pub mode: QueryMode,

    pub tls_mode: TlsMode,

    /// Upper bound on establishing the per-cycle connection
    pub connect_timeout_seconds: u64,

    /// Reported to the server as `application_name`
    pub application_name: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5433,
            user: "yugabyte".to_string(),
            password: "yugabyte".to_string(),
            database: "yugabyte".to_string(),
            collection_interval_seconds: 10,
            mode: QueryMode::Local,
            tls_mode: TlsMode::Disable,
            connect_timeout_seconds: 10,
            application_name: "yugabytedb-receiver".to_string(),
        }
    }
}

impl fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("collection_interval_seconds", &self.collection_interval_seconds)
            .field("mode", &self.mode)
            .field("tls_mode", &self.tls_mode)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl ReceiverConfig {
    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tls_mode(mut self, tls_mode: TlsMode) -> Self {
        self.tls_mode = tls_mode;
        self
    }

    pub fn with_collection_interval_seconds(mut self, seconds: u64) -> Self {
        self.collection_interval_seconds = seconds;
        self
    }

    /// Connection target for one scrape cycle
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.tls_mode.ssl_mode())
            .application_name(&self.application_name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ReceiverError::config("host must not be empty"));
        }

        if self.port == 0 {
            return Err(ReceiverError::config("port must be greater than 0"));
        }

        if self.user.is_empty() {
            return Err(ReceiverError::config("user must not be empty"));
        }

        if self.database.is_empty() {
            return Err(ReceiverError::config("database must not be empty"));
        }

        if self.collection_interval_seconds == 0 {
            return Err(ReceiverError::config(
                "collection_interval_seconds must be greater than 0",
            ));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(ReceiverError::config(
                "connect_timeout_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();
        assert_ok!(config.validate());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5433);
        assert_eq!(config.user, "yugabyte");
        assert_eq!(config.password, "yugabyte");
        assert_eq!(config.database, "yugabyte");
        assert_eq!(config.collection_interval(), Duration::from_secs(10));
        assert_eq!(config.mode, QueryMode::Local);
        assert_eq!(config.tls_mode, TlsMode::Disable);
    }

    #[test]
    fn test_validation() {
        let mut config = ReceiverConfig::default();
        config.host = "  ".to_string();
        assert_err!(config.validate());

        let config = ReceiverConfig::default().with_collection_interval_seconds(0);
        assert_err!(config.validate());

        let mut config = ReceiverConfig::default();
        config.port = 0;
        assert_err!(config.validate());

        let config = ReceiverConfig::default()
            .with_mode(QueryMode::GlobalView)
            .with_tls_mode(TlsMode::Require);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_debug_masks_password() {
        let mut config = ReceiverConfig::default();
        config.password = "s3cret".to_string();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_connect_options_carry_target() {
        let mut config = ReceiverConfig::default().with_tls_mode(TlsMode::Require);
        config.host = "yb-tserver-0".to_string();
        config.database = "metrics".to_string();

        let options = config.connect_options();
        assert_eq!(options.get_host(), "yb-tserver-0");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("metrics"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: ReceiverConfig = serde_json::from_str(
            r#"{"host": "db", "mode": "global_view", "endpoint": "0.0.0.0:4318"}"#,
        )
        .unwrap();
        assert_eq!(config.host, "db");
        assert_eq!(config.mode, QueryMode::GlobalView);
        assert_eq!(config.port, 5433);
    }
}
