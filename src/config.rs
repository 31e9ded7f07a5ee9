//! Configuration for model build sessions

use serde::{Deserialize, Serialize};

/// Configuration for a build session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Skip types with recoverable errors instead of failing the build
    pub skip_invalid_types: bool,

    /// Maximum base-type or container `extends` chain length
    pub max_inheritance_depth: usize,

    /// Maximum complex-type nesting depth during expansion
    pub max_complex_nesting: usize,

    /// Suffix appended to derive entity set and association names
    pub entity_set_suffix: String,

    /// Suffix appended to an association name to derive its set name
    pub association_set_suffix: String,

    /// Name of the default container (`<Namespace>Container` when unset)
    pub default_container_name: Option<String>,

    /// Enforce EDM identifier syntax on source names
    pub validate_names: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            skip_invalid_types: false,
            max_inheritance_depth: 32,
            max_complex_nesting: 32,
            entity_set_suffix: "s".to_string(),
            association_set_suffix: "Set".to_string(),
            default_container_name: None,
            validate_names: true,
        }
    }
}

impl BuildConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Import from YAML
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml_content)
    }

    /// Import from JSON
    pub fn from_json(json_content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_content)
    }
}

/// Builder for BuildConfig
#[derive(Debug, Default)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    /// Skip types with recoverable errors
    pub fn skip_invalid_types(mut self, skip: bool) -> Self {
        self.config.skip_invalid_types = skip;
        self
    }

    /// Set the inheritance chain guard (at least 1)
    pub fn max_inheritance_depth(mut self, depth: usize) -> Self {
        self.config.max_inheritance_depth = depth.max(1);
        self
    }

    /// Set the complex nesting guard (at least 1)
    pub fn max_complex_nesting(mut self, depth: usize) -> Self {
        self.config.max_complex_nesting = depth.max(1);
        self
    }

    pub fn entity_set_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.entity_set_suffix = suffix.into();
        self
    }

    pub fn association_set_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.association_set_suffix = suffix.into();
        self
    }

    pub fn default_container_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_container_name = Some(name.into());
        self
    }

    pub fn validate_names(mut self, validate: bool) -> Self {
        self.config.validate_names = validate;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BuildConfig {
        self.config
    }
}
