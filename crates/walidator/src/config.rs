//! Configuration options for a validator
//!
//! Controls which field annotation carries the rule tag and which one
//! supplies the external field name used in paths.

use crate::errors::ConfigError;

/// Annotation read for rule tags unless configured otherwise
pub const DEFAULT_TAG_NAME: &str = "validate";

/// Annotation read for external field names unless configured otherwise
pub const DEFAULT_NAME_TAG: &str = "json";

// ============================================================================
// Validator Config
// ============================================================================

/// Configuration options for a [`Validator`](crate::Validator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Annotation holding the rule tag (default `validate`)
    pub tag_name: String,

    /// Annotation holding the serialization name (default `json`); `None`
    /// renders paths with declared field names only
    pub name_tag: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
            name_tag: Some(DEFAULT_NAME_TAG.to_string()),
        }
    }
}

impl ValidatorConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule tag annotation
    pub fn tag_name(mut self, name: impl Into<String>) -> Self {
        self.tag_name = name.into();
        self
    }

    /// Set the serialization name annotation
    pub fn name_tag(mut self, name: impl Into<String>) -> Self {
        self.name_tag = Some(name.into());
        self
    }

    /// Use declared field names in paths
    pub fn without_name_tag(mut self) -> Self {
        self.name_tag = None;
        self
    }

    /// Check the config can be used to build a validator
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.tag_name.trim().is_empty() {
            return Err(ConfigError::EmptyTagName);
        }
        Ok(())
    }
}
