//! Validation error types
//!
//! This module defines the violation taxonomy, the path-keyed result returned
//! by a validation walk, and the errors raised while parsing tags, compiling
//! rules and configuring a validator.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Rule name recorded for structural failures (bad tags, bad parameters,
/// rules that cannot apply to a type).
pub const INVALID_RULE: &str = "invalid";

// ============================================================================
// Validation Result
// ============================================================================

/// Validation result type
pub type ValidationResult = Result<(), ValidationErrors>;

// ============================================================================
// Error Kind Classification
// ============================================================================

/// Classification of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// Value equals the zero value of its type (`nonzero`)
    ZeroValue,
    /// Optional value is absent (`required`)
    Required,
    /// Length or value differs from the parameter (`len`)
    Len,
    /// Length or value is below the parameter (`min`)
    Min,
    /// Length or value is above the parameter (`max`)
    Max,
    /// String does not match the pattern (`regexp`)
    Regexp,
    /// String is not an RFC 4122 UUID (`uuid`)
    Uuid,
    /// Latitude outside [-90, 90]
    Latitude,
    /// Longitude outside [-180, 180]
    Longitude,
    /// String could not be parsed as the expected format
    BadFormat,
    /// Tag references a rule that is not registered
    UnknownRule,
    /// Tag segment has no rule name
    MalformedTag,
    /// Rule parameter could not be parsed or accepted
    BadParameter,
    /// Rule cannot apply to the value's type
    Unsupported,
    /// Reported by a user-registered rule
    Custom,
}

impl ErrorKind {
    /// Structural failures are reported under the `"invalid"` rule name:
    /// they are fixed by changing the tag, not the data.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::UnknownRule | Self::MalformedTag | Self::BadParameter | Self::Unsupported
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ZeroValue => "zero_value",
            Self::Required => "required",
            Self::Len => "len",
            Self::Min => "min",
            Self::Max => "max",
            Self::Regexp => "regexp",
            Self::Uuid => "uuid",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::BadFormat => "bad_format",
            Self::UnknownRule => "unknown_rule",
            Self::MalformedTag => "malformed_tag",
            Self::BadParameter => "bad_parameter",
            Self::Unsupported => "unsupported",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Single Violation
// ============================================================================

/// One failure of one rule at one path
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Violation {
    /// Location of the value (e.g., "Sub.C", "Slices[1].A")
    pub path: String,
    /// Rule that failed, or `"invalid"` for structural failures
    pub rule: String,
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

// ============================================================================
// Validation Errors Collection
// ============================================================================

/// All violations found by one validation walk, keyed by path.
///
/// Violations at the same path keep the order in which their rules were
/// evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<Violation>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of violations across all paths
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Append a violation to the list at its path
    pub fn add(&mut self, violation: Violation) {
        self.errors
            .entry(violation.path.clone())
            .or_default()
            .push(violation);
    }

    /// Paths that have at least one violation
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Violations recorded at `path`, in evaluation order
    pub fn get(&self, path: &str) -> &[Violation] {
        self.errors.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All violations, grouped by path
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.errors.values().flatten()
    }

    /// Whether a violation of `kind` was recorded at `path`
    pub fn has(&self, path: &str, kind: ErrorKind) -> bool {
        self.get(path).iter().any(|v| v.kind == kind)
    }

    pub fn is_zero_value(&self, path: &str) -> bool {
        self.has(path, ErrorKind::ZeroValue)
    }

    pub fn is_required(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Required)
    }

    pub fn is_len(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Len)
    }

    pub fn is_min(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Min)
    }

    pub fn is_max(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Max)
    }

    pub fn is_regexp(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Regexp)
    }

    pub fn is_unsupported(&self, path: &str) -> bool {
        self.has(path, ErrorKind::Unsupported)
    }

    pub fn is_bad_parameter(&self, path: &str) -> bool {
        self.has(path, ErrorKind::BadParameter)
    }

    pub fn is_unknown_rule(&self, path: &str) -> bool {
        self.has(path, ErrorKind::UnknownRule)
    }

    /// Convert to Result - Ok if no errors, Err if there are errors
    pub fn into_result(self) -> ValidationResult {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Tag, Rule and Configuration Errors
// ============================================================================

/// Failure to turn a tag string into rule specifications
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("malformed tag segment {0:?}: missing rule name")]
    MalformedSegment(String),

    #[error("unknown tag {0:?}")]
    UnknownRule(String),
}

impl TagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedSegment(_) => ErrorKind::MalformedTag,
            Self::UnknownRule(_) => ErrorKind::UnknownRule,
        }
    }
}

/// Failure of a rule compiler to bind a rule to a type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("unsupported type {type_name}")]
    Unsupported { type_name: &'static str },

    #[error("bad parameter {param:?}: {reason}")]
    BadParameter { param: String, reason: String },
}

impl RuleError {
    pub fn unsupported(type_name: &'static str) -> Self {
        Self::Unsupported { type_name }
    }

    pub fn bad_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::BadParameter { .. } => ErrorKind::BadParameter,
        }
    }
}

/// Setup-time mistake in validator configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rule name cannot be empty")]
    EmptyName,

    #[error("tag name cannot be empty")]
    EmptyTagName,
}
