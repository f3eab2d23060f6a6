//! Client configuration, persisted as TOML.
//!
//! ```toml
//! base_url = "http://localhost:3030/OBD"
//! namespace = "http://www.semanticweb.org/diag_ontology#"
//! max_retries = 2
//! ```
//!
//! Setting `graph_file` or `graph_dir` selects the local oxigraph backend
//! instead of the remote store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vocab::DEFAULT_NAMESPACE;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Connection and vocabulary settings for a [`KnowledgeBase`](crate::kb::KnowledgeBase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbConfig {
    /// Dataset URL; `/query`, `/data` and `/update` are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Ontology namespace for identifiers, classes and predicates.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Request timeout. `None` keeps the transport default (no timeout).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Extra attempts for reads and bulk inserts after a transport failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between retry attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Static RDF file loaded into an in-memory local graph.
    #[serde(default)]
    pub graph_file: Option<PathBuf>,
    /// Directory of a persistent local graph.
    #[serde(default)]
    pub graph_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:3030/OBD".into()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            namespace: default_namespace(),
            timeout_secs: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            graph_file: None,
            graph_dir: None,
        }
    }
}

impl KbConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: KbConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("cannot serialize config: {e}"),
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.graph_file.is_some() && self.graph_dir.is_some() {
            return Err(ConfigError::Invalid {
                message: "graph_file and graph_dir are mutually exclusive".into(),
            });
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                message: format!("base_url must be an http(s) URL, got \"{}\"", self.base_url),
            });
        }
        if !(self.namespace.ends_with('#') || self.namespace.ends_with('/')) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "namespace must end with '#' or '/', got \"{}\"",
                    self.namespace
                ),
            });
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn endpoint_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = KbConfig::default();
        config.validate().unwrap();
        assert_eq!(config.endpoint_base(), "http://localhost:3030/OBD");
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("obd.toml");
        std::fs::write(&path, "base_url = \"http://store:3030/OBD/\"\nmax_retries = 0\n").unwrap();

        let config = KbConfig::load(&path).unwrap();
        assert_eq!(config.endpoint_base(), "http://store:3030/OBD");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn toml_round_trip() {
        let config = KbConfig {
            timeout_secs: Some(10),
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        let parsed: KbConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.timeout_secs, Some(10));
        assert_eq!(parsed.base_url, config.base_url);
    }

    #[test]
    fn rejects_conflicting_local_backends() {
        let config = KbConfig {
            graph_file: Some("a.ttl".into()),
            graph_dir: Some("graph".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = KbConfig::load(Path::new("/nonexistent/obd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("obd.toml");
        std::fs::write(&path, "base_url = [").unwrap();
        assert!(matches!(
            KbConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
