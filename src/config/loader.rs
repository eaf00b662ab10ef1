//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// `${VAR}` placeholders are expanded per string field while
    /// deserializing, once.
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        // An empty document deserializes to unit, not to a mapping
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_in_document() {
        std::env::set_var("UPLOAD_PIPELINE_TEST_ROOT", "/srv/test");
        let config = ConfigLoader::parse("storage:\n  root: ${UPLOAD_PIPELINE_TEST_ROOT}\n")
            .unwrap();
        assert_eq!(config.storage.root, "/srv/test");
        std::env::remove_var("UPLOAD_PIPELINE_TEST_ROOT");
    }

    #[test]
    fn test_expanded_value_is_not_expanded_again() {
        std::env::set_var("UPLOAD_PIPELINE_TEST_NESTED", "${UPLOAD_PIPELINE_TEST_INNER}");
        std::env::set_var("UPLOAD_PIPELINE_TEST_INNER", "/srv/inner");
        let config =
            ConfigLoader::parse("storage:\n  root: \"${UPLOAD_PIPELINE_TEST_NESTED}\"\n")
                .unwrap();
        assert_eq!(config.storage.root, "${UPLOAD_PIPELINE_TEST_INNER}");
        std::env::remove_var("UPLOAD_PIPELINE_TEST_NESTED");
        std::env::remove_var("UPLOAD_PIPELINE_TEST_INNER");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
