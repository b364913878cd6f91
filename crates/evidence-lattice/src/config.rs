//! Catalog configuration.
//!
//! Configuration is plain TOML; every field is optional.
//!
//! ```
//! use evidence_lattice::CatalogConfig;
//!
//! let config = CatalogConfig::from_toml_str(r#"
//! page_size = 100
//! parallel_classification = false
//! "#).unwrap();
//!
//! assert_eq!(config.page_size, 100);
//! assert_eq!(config.worker_name, "evidence-catalog");
//! ```

use std::path::Path;

use evidence_lattice_core::WorkerBuilder;
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_PAGE_SIZE;

/// Errors from loading or validating a [`CatalogConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not valid TOML for this configuration.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for a [`CatalogTree`](crate::catalog::CatalogTree) and its result
/// caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Rows per result page.
    pub page_size: usize,
    /// Thread name of the background refresh worker.
    pub worker_name: String,
    /// Task queue capacity of the background refresh worker.
    pub worker_queue_capacity: usize,
    /// Classify event batches across branches on the rayon pool.
    pub parallel_classification: bool,
    /// Artifact type ids never shown in the data artifact branch.
    pub ignored_artifact_types: Vec<i64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            worker_name: "evidence-catalog".to_string(),
            worker_queue_capacity: 64,
            parallel_classification: true,
            ignored_artifact_types: Vec::new(),
        }
    }
}

impl CatalogConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be positive".into(),
            });
        }
        if self.worker_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_queue_capacity",
                reason: "must be positive".into(),
            });
        }
        if self.worker_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "worker_name",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_worker_queue_capacity(mut self, capacity: usize) -> Self {
        self.worker_queue_capacity = capacity;
        self
    }

    pub fn with_parallel_classification(mut self, parallel: bool) -> Self {
        self.parallel_classification = parallel;
        self
    }

    pub fn with_ignored_artifact_types(mut self, ignored: impl IntoIterator<Item = i64>) -> Self {
        self.ignored_artifact_types = ignored.into_iter().collect();
        self
    }

    /// A worker builder carrying the worker settings.
    pub fn worker_builder(&self) -> WorkerBuilder {
        WorkerBuilder::new()
            .name(self.worker_name.clone())
            .queue_capacity(self.worker_queue_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size, 500);
        assert!(config.parallel_classification);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(CatalogConfig::from_toml_str("").unwrap(), CatalogConfig::default());
    }

    #[test]
    fn test_parse_fields() {
        let config = CatalogConfig::from_toml_str(
            r#"
            page_size = 25
            worker_name = "tree-refresh"
            ignored_artifact_types = [1, 13]
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.worker_name, "tree-refresh");
        assert_eq!(config.ignored_artifact_types, vec![1, 13]);
        assert_eq!(config.worker_queue_capacity, 64);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = CatalogConfig::from_toml_str("page_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "page_size", .. }));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = CatalogConfig::from_toml_str("page_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CatalogConfig::default()
            .with_page_size(10)
            .with_parallel_classification(false);
        let text = config.to_toml_string().unwrap();
        assert_eq!(CatalogConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = CatalogConfig::from_path("/nonexistent/evidence-lattice.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
