//! Configuration Loader
//!
//! Layers an optional configuration file (format picked from its extension)
//! under `YUGABYTEDB_*` environment variables and validates the result.

use config::{Config, Environment, File, Map};
use std::path::Path;
use tracing::debug;

use super::ReceiverConfig;
use crate::error::Result;

/// Prefix of environment variables overriding file values, e.g. `YUGABYTEDB_PORT`
pub const ENV_PREFIX: &str = "YUGABYTEDB";

impl ReceiverConfig {
    /// Load configuration from `path` (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration with an explicit environment map instead of the
    /// process environment. Useful for tests that must not touch global state.
    pub fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading receiver configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true)
                .source(env),
        );

        let config: ReceiverConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            mode = %config.mode,
            interval_seconds = config.collection_interval_seconds,
            "Receiver configuration loaded"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsMode;
    use crate::queries::QueryMode;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ReceiverConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config.port, 5433);
        assert_eq!(config.mode, QueryMode::Local);
    }

    #[test]
    fn test_yaml_file_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "host: yb-tserver-1\nport: 5434\nmode: global_view\ntls_mode: require\ncollection_interval_seconds: 30\nendpoint: 0.0.0.0:4318"
        )
        .unwrap();

        let config = ReceiverConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.host, "yb-tserver-1");
        assert_eq!(config.port, 5434);
        assert_eq!(config.mode, QueryMode::GlobalView);
        assert_eq!(config.tls_mode, TlsMode::Require);
        assert_eq!(config.collection_interval_seconds, 30);
        assert_eq!(config.user, "yugabyte");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "host: from-file\nport: 5434").unwrap();

        let config = ReceiverConfig::load_with_env(
            Some(file.path()),
            env(&[("YUGABYTEDB_HOST", "from-env"), ("YUGABYTEDB_PORT", "6000")]),
        )
        .unwrap();
        assert_eq!(config.host, "from-env");
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = ReceiverConfig::load_with_env(
            None,
            env(&[("YUGABYTEDB_COLLECTION_INTERVAL_SECONDS", "0")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ReceiverConfig::load_with_env(
            Some(Path::new("/nonexistent/receiver.yaml")),
            env(&[]),
        );
        assert_eq!(result.unwrap_err().kind(), "configuration_error");
    }
}
