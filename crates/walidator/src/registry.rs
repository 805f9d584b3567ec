//! Rule registry
//!
//! Maps rule names to [`RuleCompiler`]s. A compiler receives the concrete
//! type a rule is attached to and the rule's parameter, and returns a bound
//! check function, so type and parameter mistakes surface once per type
//! instead of once per value.

use crate::builtins;
use crate::errors::{ConfigError, RuleError};
use crate::inspect::{Kind, Shape, TypeRef, View};
use crate::path::Reporter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Check bound to one type and parameter
pub type RuleFn = Arc<dyn Fn(&View<'_>, &mut Reporter<'_>) + Send + Sync>;

/// Wrap a closure as a [`RuleFn`]
pub fn rule_fn<F>(f: F) -> RuleFn
where
    F: Fn(&View<'_>, &mut Reporter<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Type a rule is being bound to
pub struct Target<'a> {
    pub ty: TypeRef,
    pub shape: &'a Shape,
}

impl<'a> Target<'a> {
    pub fn new(ty: TypeRef, shape: &'a Shape) -> Self {
        Self { ty, shape }
    }

    pub fn kind(&self) -> Kind {
        self.shape.kind()
    }

    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }

    /// Shorthand for rejecting the target's type
    pub fn unsupported(&self) -> RuleError {
        RuleError::unsupported(self.type_name())
    }
}

// ============================================================================
// RuleCompiler Trait
// ============================================================================

/// Builds the check for one rule against one concrete type.
///
/// # Example
///
/// ```
/// use walidator::{rule_fn, Kind, RuleError, RuleFn, Target, View};
///
/// // Rejects the string "ZZ"
/// fn not_zz(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
///     if target.kind() != Kind::Str {
///         return Err(target.unsupported());
///     }
///     Ok(rule_fn(|value, report| {
///         if let View::Str("ZZ") = value {
///             report.error("value cannot be ZZ");
///         }
///     }))
/// }
///
/// let mut v = walidator::Validator::new();
/// v.add_rule("notzz", not_zz);
/// assert!(v.valid(&"ZZ".to_string(), "notzz").is_err());
/// ```
pub trait RuleCompiler: Send + Sync {
    fn compile(&self, target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError>;
}

impl<F> RuleCompiler for F
where
    F: Fn(&Target<'_>, &str) -> Result<RuleFn, RuleError> + Send + Sync,
{
    fn compile(&self, target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError> {
        self(target, param)
    }
}

// ============================================================================
// RuleRegistry
// ============================================================================

/// Name to compiler mapping.
///
/// Cloning is a shallow copy: compilers are shared, but registrations made
/// on a clone never show up in the original. Registering an existing name
/// replaces the previous compiler.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<dyn RuleCompiler>>,
}

impl RuleRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in rules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }

    /// Register `compiler` under `name`, returning the compiler it replaced
    pub fn register(
        &mut self,
        name: impl Into<String>,
        compiler: impl RuleCompiler + 'static,
    ) -> Result<Option<Arc<dyn RuleCompiler>>, ConfigError> {
        self.register_arc(name, Arc::new(compiler))
    }

    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        compiler: Arc<dyn RuleCompiler>,
    ) -> Result<Option<Arc<dyn RuleCompiler>>, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        let previous = self.rules.insert(name.clone(), compiler);
        if previous.is_some() {
            debug!(rule = %name, "replaced registered rule");
        }
        Ok(previous)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn RuleCompiler>> {
        self.rules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Registered rule names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_ok(_target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
        Ok(rule_fn(|_value, _report| {}))
    }

    #[test]
    fn test_builtins_registered() {
        let registry = RuleRegistry::with_builtins();
        for name in [
            "nonzero", "len", "min", "max", "regexp", "uuid", "required", "latitude",
            "longitude",
        ] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = RuleRegistry::new();
        assert_eq!(registry.register("", always_ok).err(), Some(ConfigError::EmptyName));
        assert_eq!(registry.register("  ", always_ok).err(), Some(ConfigError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = RuleRegistry::with_builtins();
        let before = registry.len();
        let replaced = registry.register("min", always_ok).unwrap();
        assert!(replaced.is_some());
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = RuleRegistry::with_builtins();
        let mut copy = original.clone();
        copy.register("custom", always_ok).unwrap();

        assert!(copy.contains("custom"));
        assert!(!original.contains("custom"));
    }
}
