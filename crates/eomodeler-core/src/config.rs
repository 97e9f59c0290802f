//! Model group settings
//!
//! Settings are read from an optional `eomodeler.yaml` at the root of a
//! model group directory. Every field has a default, so an absent file
//! and an empty file behave the same.
//!
//! ```yaml
//! max_unused_name_attempts: 500
//! default_prototype_entity: EOPrototypes
//! default_model_version: "2.1"
//! recursive: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Settings file name looked up in a group root
pub const FILE_NAME: &str = "eomodeler.yaml";

/// Settings shared by every model in a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelerConfig {
    /// Numbered candidates tried by the `find_unused_*_name` family
    #[serde(default = "default_max_unused_name_attempts")]
    pub max_unused_name_attempts: usize,

    /// Name of the group-wide prototype entity
    #[serde(default = "default_prototype_entity")]
    pub default_prototype_entity: String,

    /// `EOModelVersion` written for newly created models
    #[serde(default = "default_model_version")]
    pub default_model_version: String,

    /// Descend into subdirectories when discovering model folders
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_max_unused_name_attempts() -> usize {
    1000
}

fn default_prototype_entity() -> String {
    "EOPrototypes".to_string()
}

fn default_model_version() -> String {
    "2.1".to_string()
}

fn default_recursive() -> bool {
    true
}

impl Default for ModelerConfig {
    fn default() -> Self {
        Self {
            max_unused_name_attempts: default_max_unused_name_attempts(),
            default_prototype_entity: default_prototype_entity(),
            default_model_version: default_model_version(),
            recursive: default_recursive(),
        }
    }
}

impl ModelerConfig {
    /// Load settings from `dir/eomodeler.yaml`, or defaults if the file
    /// does not exist.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(FILE_NAME);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate settings from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // an empty document deserializes as null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_unused_name_attempts == 0 {
            return Err(Error::ConfigInvalid {
                message: "max_unused_name_attempts must be at least 1".to_string(),
            });
        }
        if self.default_prototype_entity.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                message: "default_prototype_entity must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ModelerConfig::default();
        assert_eq!(config.max_unused_name_attempts, 1000);
        assert_eq!(config.default_prototype_entity, "EOPrototypes");
        assert_eq!(config.default_model_version, "2.1");
        assert!(config.recursive);
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
max_unused_name_attempts: 25
recursive: false
"#;
        let config = ModelerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_unused_name_attempts, 25);
        assert!(!config.recursive);
        assert_eq!(config.default_prototype_entity, "EOPrototypes");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(ModelerConfig::from_yaml("\n").unwrap(), ModelerConfig::default());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = ModelerConfig::from_yaml("max_unused_name_attempts: 0\n");
        assert!(matches!(result, Err(Error::ConfigInvalid { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let result = ModelerConfig::from_yaml("recursive: [unclosed\n");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ModelerConfig::load(dir.path()).unwrap(), ModelerConfig::default());

        std::fs::write(
            dir.path().join(FILE_NAME),
            "default_prototype_entity: MyPrototypes\n",
        )
        .unwrap();
        let config = ModelerConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_prototype_entity, "MyPrototypes");
    }
}
