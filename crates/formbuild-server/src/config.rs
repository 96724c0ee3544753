//! Server configuration.
//!
//! Loads configuration from environment variables with defaults. Malformed
//! values are reported as [`ConfigError`] and abort startup before the
//! listener is bound.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Public base URL used to build absolute submission links.
    pub domain: String,
    /// Client keys accepted by the save-form gate.
    pub client_keys: Vec<String>,
    /// Root directory of stored forms and answers.
    pub data_dir: PathBuf,
    /// Form template file; `None` uses the built-in template.
    pub template_path: Option<PathBuf>,
    /// Log level filter (e.g., `info`, `debug`) used when `RUST_LOG` is unset.
    pub log_level: String,
    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_timeout: Duration,
}

/// A configuration value could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a port number, got '{value}'")]
    InvalidPort { value: String },

    #[error("CLIENT_KEYS must be a JSON array of strings: {source}")]
    InvalidClientKeys {
        #[source]
        source: serde_json::Error,
    },

    #[error("CLIENT_KEYS must contain at least one non-empty key")]
    NoClientKeys,

    #[error("FORMBUILD_SHUTDOWN_TIMEOUT_SECS must be a whole number of seconds, got '{value}'")]
    InvalidShutdownTimeout { value: String },
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DOMAIN: &str = "http://0.0.0.0:8080";
const DEFAULT_CLIENT_KEYS: &str = r#"["api-key-1","api-key-2"]"#;
const DEFAULT_DATA_DIR: &str = "form-build";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `APP_HOST`: listen host (default: `0.0.0.0`)
    /// - `APP_PORT`: listen port (default: `8080`)
    /// - `APP_DOMAIN`: public base URL for submit links (default: `http://0.0.0.0:8080`)
    /// - `CLIENT_KEYS`: JSON array of allowed client keys (default: `["api-key-1","api-key-2"]`)
    /// - `FORMBUILD_DATA_DIR`: storage root (default: `form-build`)
    /// - `FORMBUILD_TEMPLATE_PATH`: form template file (default: built-in)
    /// - `FORMBUILD_LOG_LEVEL`: log filter (default: `info`)
    /// - `FORMBUILD_SHUTDOWN_TIMEOUT_SECS`: graceful shutdown window (default: `10`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());

        let port = match lookup("APP_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            None => DEFAULT_PORT,
        };

        let domain = lookup("APP_DOMAIN")
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned())
            .trim_end_matches('/')
            .to_owned();

        let raw_keys = lookup("CLIENT_KEYS").unwrap_or_else(|| DEFAULT_CLIENT_KEYS.to_owned());
        let client_keys: Vec<String> = serde_json::from_str(&raw_keys)
            .map_err(|source| ConfigError::InvalidClientKeys { source })?;
        if client_keys.iter().all(String::is_empty) {
            return Err(ConfigError::NoClientKeys);
        }

        let data_dir = lookup("FORMBUILD_DATA_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let template_path = lookup("FORMBUILD_TEMPLATE_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let log_level = lookup("FORMBUILD_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let shutdown_timeout = match lookup("FORMBUILD_SHUTDOWN_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidShutdownTimeout { value })?,
            ),
            None => Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        };

        Ok(Self {
            host,
            port,
            domain,
            client_keys,
            data_dir,
            template_path,
            log_level,
            shutdown_timeout,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.domain, "http://0.0.0.0:8080");
        assert_eq!(config.client_keys, ["api-key-1", "api-key-2"]);
        assert_eq!(config.data_dir, PathBuf::from("form-build"));
        assert_eq!(config.template_path, None);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "9000"),
            ("APP_DOMAIN", "https://forms.example.com/"),
            ("CLIENT_KEYS", r#"["only-key"]"#),
            ("FORMBUILD_DATA_DIR", "/var/lib/forms"),
            ("FORMBUILD_TEMPLATE_PATH", "/etc/forms/form.html"),
            ("FORMBUILD_SHUTDOWN_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.domain, "https://forms.example.com");
        assert_eq!(config.client_keys, ["only-key"]);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/forms"));
        assert_eq!(
            config.template_path,
            Some(PathBuf::from("/etc/forms/form.html"))
        );
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn malformed_client_keys_are_fatal() {
        assert!(matches!(
            load(&[("CLIENT_KEYS", "api-key-1,api-key-2")]),
            Err(ConfigError::InvalidClientKeys { .. })
        ));
        assert!(matches!(
            load(&[("CLIENT_KEYS", "[1, 2]")]),
            Err(ConfigError::InvalidClientKeys { .. })
        ));
        assert!(matches!(
            load(&[("CLIENT_KEYS", "[]")]),
            Err(ConfigError::NoClientKeys)
        ));
    }

    #[test]
    fn malformed_port_is_fatal() {
        assert!(matches!(
            load(&[("APP_PORT", "http")]),
            Err(ConfigError::InvalidPort { .. })
        ));
        assert!(matches!(
            load(&[("APP_PORT", "70000")]),
            Err(ConfigError::InvalidPort { .. })
        ));
    }
}
