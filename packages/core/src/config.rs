//! Tree Engine Configuration
//!
//! Policy knobs for the tree service. The struct deserializes from JSON with
//! every field optional, so a config file only has to name what it changes:
//!
//! ```json
//! { "maxDepth": 8, "orphanStrategy": "flattenToRoot" }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default cap on tree depth (roots are depth 1)
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Largest accepted `max_depth`
pub const MAX_SUPPORTED_DEPTH: usize = 1000;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid tree configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the children of a force-deleted category go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanStrategy {
    /// Children take the deleted node's own parent
    #[default]
    PromoteToParent,
    /// Children become roots
    FlattenToRoot,
}

/// What happens to navigation items pointing at a deleted category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryRefPolicy {
    /// Clear the reference in the same transaction as the delete
    #[default]
    Nullify,
    /// Refuse the delete while references exist
    Refuse,
}

/// Configuration for the tree service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Deepest allowed level; also bounds every ancestor walk
    pub max_depth: usize,

    pub orphan_strategy: OrphanStrategy,

    pub category_ref_policy: CategoryRefPolicy,

    /// Category that receives the products of a force-deleted category
    /// (`None` leaves them without a category)
    pub uncategorized_category_id: Option<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            orphan_strategy: OrphanStrategy::default(),
            category_ref_policy: CategoryRefPolicy::default(),
            uncategorized_category_id: None,
        }
    }
}

impl TreeConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "maxDepth must be between 1 and {}, got {}",
                MAX_SUPPORTED_DEPTH, self.max_depth
            )));
        }

        if let Some(id) = &self.uncategorized_category_id {
            if id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "uncategorizedCategoryId cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!(
            "Loaded tree config from {}: {:?}",
            path.as_ref().display(),
            config
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = TreeConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.orphan_strategy, OrphanStrategy::PromoteToParent);
        assert_eq!(config.category_ref_policy, CategoryRefPolicy::Nullify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_depth() {
        let zero = TreeConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let huge = TreeConfig {
            max_depth: MAX_SUPPORTED_DEPTH + 1,
            ..Default::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            TreeConfig::from_json_str(r#"{"orphanStrategy":"flattenToRoot","maxDepth":8}"#)
                .unwrap();
        assert_eq!(config.orphan_strategy, OrphanStrategy::FlattenToRoot);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.category_ref_policy, CategoryRefPolicy::Nullify);
        assert_eq!(config.uncategorized_category_id, None);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        assert!(matches!(
            TreeConfig::from_json_str(r#"{"maxDepth":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TreeConfig::from_json_str(r#"{"categoryRefPolicy":"ignore"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"categoryRefPolicy":"refuse","uncategorizedCategoryId":"misc"}}"#
        )
        .unwrap();

        let config = TreeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.category_ref_policy, CategoryRefPolicy::Refuse);
        assert_eq!(config.uncategorized_category_id.as_deref(), Some("misc"));
    }
}
