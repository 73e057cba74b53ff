//! # World Configuration
//!
//! Tuning knobs loaded once at startup from TOML.
//!
//! ```toml
//! initial_table_capacity = 64
//! index_capacity = 4
//! path_separator = "::"
//! path_prefix = "::"
//! max_hierarchy_depth = 128
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{ArborError, ArborResult};

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Rows preallocated in every new table data set (main or overlay).
    pub initial_table_capacity: usize,
    /// Initial capacity of each parent's table list in the hierarchy index.
    pub index_capacity: usize,
    /// Separator used by the `*_default` path helpers.
    pub path_separator: String,
    /// Prefix marking absolute paths in the `*_default` path helpers.
    pub path_prefix: Option<String>,
    /// Longest child-of chain walked when building a path.
    pub max_hierarchy_depth: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_table_capacity: 0,
            index_capacity: 4,
            path_separator: ".".to_string(),
            path_prefix: None,
            max_hierarchy_depth: 256,
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from TOML text. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfig`] on malformed TOML, unknown keys,
    /// or an empty path separator.
    pub fn from_toml_str(text: &str) -> ArborResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ArborError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ArborResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ArborError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> ArborResult<()> {
        if self.path_separator.is_empty() {
            return Err(ArborError::InvalidConfig(
                "path_separator must not be empty".to_string(),
            ));
        }
        if self.max_hierarchy_depth == 0 {
            return Err(ArborError::InvalidConfig(
                "max_hierarchy_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
        assert_eq!(config.path_separator, ".");
        assert_eq!(config.max_hierarchy_depth, 256);
    }

    #[test]
    fn test_overrides() {
        let config = WorldConfig::from_toml_str(
            r#"
            initial_table_capacity = 64
            path_separator = "::"
            path_prefix = "::"
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_table_capacity, 64);
        assert_eq!(config.path_separator, "::");
        assert_eq!(config.path_prefix.as_deref(), Some("::"));
        assert_eq!(config.index_capacity, 4);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            WorldConfig::from_toml_str("path_separator = \"\""),
            Err(ArborError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("bogus = 1"),
            Err(ArborError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("max_hierarchy_depth = 0"),
            Err(ArborError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = WorldConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
