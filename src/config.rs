// src/config.rs

//! Static audit configuration, passed to the `Auditor` at construction.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::analyzers::rubric::Rubric;
use crate::core::error::ConfigError;
use crate::core::models::Category;

/// Relative weight of each category in the composite score.
///
/// Weights need not sum to one. Categories that end up unavailable are left
/// out of both the numerator and the denominator of the weighted mean; their
/// weight is not handed to any particular category. If every available
/// category weighs zero, the composite is their plain mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub meta: f64,
    pub content: f64,
    pub technical: f64,
    pub speed: f64,
    pub security: f64,
    pub links: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            meta: 0.20,
            content: 0.25,
            technical: 0.15,
            speed: 0.15,
            security: 0.15,
            links: 0.10,
        }
    }
}

impl CategoryWeights {
    pub fn equal() -> Self {
        Self {
            meta: 1.0,
            content: 1.0,
            technical: 1.0,
            speed: 1.0,
            security: 1.0,
            links: 1.0,
        }
    }

    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Meta => self.meta,
            Category::Content => self.content,
            Category::Technical => self.technical,
            Category::Speed => self.speed,
            Category::Security => self.security,
            Category::Links => self.links,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut total = 0.0;
        for category in Category::all() {
            let w = self.weight(category);
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weight for {} must be a finite, non-negative number (got {})",
                    category, w
                )));
            }
            total += w;
        }
        if total <= 0.0 {
            return Err(ConfigError::Invalid("at least one category weight must be positive".to_string()));
        }
        Ok(())
    }
}

/// Every tunable of an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Deadline for the whole primary fetch, redirects and body included.
    pub primary_fetch_timeout_ms: u64,
    /// Deadline for each auxiliary fetch (robots.txt, compression probe).
    pub aux_fetch_timeout_ms: u64,
    /// Deadline for each sampled link check.
    pub link_check_timeout_ms: u64,
    /// Deadline for the domain intelligence lookup as a whole.
    pub lookup_timeout_ms: u64,
    pub max_redirects: usize,
    pub link_sample_size: usize,
    pub link_check_concurrency: usize,
    pub category_weights: CategoryWeights,
    /// Rubric check id -> points, replacing the built-in value.
    pub rubric_overrides: BTreeMap<String, u32>,
    pub user_agent: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            primary_fetch_timeout_ms: 10_000,
            aux_fetch_timeout_ms: 4_000,
            link_check_timeout_ms: 3_000,
            lookup_timeout_ms: 5_000,
            max_redirects: 5,
            link_sample_size: 20,
            link_check_concurrency: 8,
            category_weights: CategoryWeights::default(),
            rubric_overrides: BTreeMap::new(),
            user_agent: format!("auditly/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AuditConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AuditConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded configuration file.");
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("primary_fetch_timeout_ms", self.primary_fetch_timeout_ms),
            ("aux_fetch_timeout_ms", self.aux_fetch_timeout_ms),
            ("link_check_timeout_ms", self.link_check_timeout_ms),
            ("lookup_timeout_ms", self.lookup_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }
        if self.link_check_concurrency == 0 {
            return Err(ConfigError::Invalid("link_check_concurrency must be greater than zero".to_string()));
        }
        self.category_weights.validate()?;
        self.rubric()?;
        Ok(())
    }

    /// The rubric with overrides applied.
    pub fn rubric(&self) -> Result<Rubric, ConfigError> {
        Rubric::with_overrides(&self.rubric_overrides)
    }

    pub fn primary_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_fetch_timeout_ms)
    }

    pub fn aux_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.aux_fetch_timeout_ms)
    }

    pub fn link_check_timeout(&self) -> Duration {
        Duration::from_millis(self.link_check_timeout_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AuditConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_redirects": 2, "category_weights": {{"links": 0.5}}}}"#).unwrap();

        let config = AuditConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.category_weights.links, 0.5);
        assert_eq!(config.category_weights.meta, 0.20);
        assert_eq!(config.primary_fetch_timeout_ms, 10_000);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let mut config = AuditConfig::default();
        config.category_weights.speed = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_all_zero_weights_are_rejected() {
        let mut config = AuditConfig::default();
        config.category_weights = CategoryWeights {
            meta: 0.0,
            content: 0.0,
            technical: 0.0,
            speed: 0.0,
            security: 0.0,
            links: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = AuditConfig { link_check_timeout_ms: 0, ..AuditConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_rubric_override_is_rejected() {
        let mut config = AuditConfig::default();
        config.rubric_overrides.insert("META_NOPE".to_string(), 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(AuditConfig::from_file(file.path()), Err(ConfigError::Parse(_))));
    }
}
