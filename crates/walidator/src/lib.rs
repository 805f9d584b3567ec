//! Walidator
//!
//! Tag-driven value validation. Fields carry short textual rules
//! (`nonzero`, `min=10`, `len=8`, `regexp=^a.*b$`); a single call walks a
//! value, applies the rules and reports every violation keyed by the path
//! where it happened (`Sub.C`, `Slices[1].A`, `M[{A:3}](key).A`).
//!
//! # Architecture
//!
//! ```text
//! tag string ──▶ tags::parse ──▶ RuleSpec list
//!                                    │ RuleRegistry lookup + RuleCompiler
//!                                    ▼
//! TypeRef ─────▶ compiler::Session ─▶ Routine (cached per type)
//!                                    │
//! &dyn Inspect ─────────────────────▶ Walk ──▶ PathTracker ──▶ ValidationErrors
//! ```
//!
//! Rules are bound to each field's concrete type once, when the type is
//! first validated. A rule that cannot apply to its field (`regexp` on an
//! integer, `min=foo`) becomes a violation reported at the field's path
//! rather than a panic.
//!
//! # Features
//!
//! - **Default**: validation with the built-in rules
//! - **serde**: `Serialize` for [`ValidationErrors`] and friends
//!
//! # Example
//!
//! ```rust
//! use walidator::inspect;
//!
//! inspect! {
//!     pub struct Sub {
//!         #[tag(validate = "nonzero,min=1")]
//!         pub c: i64,
//!     }
//! }
//!
//! inspect! {
//!     pub struct Request {
//!         #[tag(validate = "nonzero")]
//!         pub a: i64,
//!         #[tag(validate = "len=8,min=6,max=4")]
//!         pub b: String,
//!         pub sub: Sub,
//!     }
//! }
//!
//! let req = Request { a: 0, b: "12345".to_string(), sub: Sub { c: 0 } };
//! let errs = walidator::validate(&req).unwrap_err();
//!
//! assert!(errs.is_zero_value("a"));
//! let rules: Vec<_> = errs.get("b").iter().map(|v| v.rule.as_str()).collect();
//! assert_eq!(rules, vec!["len", "min", "max"]);
//! assert_eq!(errs.get("sub.c").len(), 2);
//! ```

// Public modules
pub mod builtins;
pub mod config;
pub mod errors;
pub mod inspect;
pub mod path;
pub mod registry;
pub mod tags;
pub mod validator;

mod cache;
mod compiler;
mod macros;

// Re-export commonly used types
pub use config::ValidatorConfig;
pub use errors::{
    ConfigError, ErrorKind, RuleError, TagError, ValidationErrors, ValidationResult, Violation,
    INVALID_RULE,
};
pub use inspect::{
    describe, FieldShape, Inspect, Kind, MapAccess, SeqAccess, Shape, StructShape, TypeRef, View,
};
pub use path::{PathTracker, Reporter, Segment};
pub use registry::{rule_fn, RuleCompiler, RuleFn, RuleRegistry, Target};
pub use validator::Validator;

use once_cell::sync::Lazy;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide validator with the built-in rules and default tag names.
///
/// It cannot be mutated: code that needs extra rules builds its own
/// [`Validator`] and registers them there.
static DEFAULT: Lazy<Validator> = Lazy::new(Validator::new);

/// Validate a value with the default validator
pub fn validate(value: &dyn Inspect) -> ValidationResult {
    DEFAULT.validate(value)
}

/// Validate a bare value against `tag` with the default validator
pub fn valid(value: &dyn Inspect, tag: &str) -> ValidationResult {
    DEFAULT.valid(value, tag)
}

/// New validator with the default rules reading the `name` annotation
pub fn with_tag_name(name: impl Into<String>) -> Validator {
    DEFAULT.with_tag_name(name)
}
