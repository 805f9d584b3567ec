//! Validator facade
//!
//! A [`Validator`] owns a rule registry, a configuration and the cache of
//! routines compiled under that configuration. Deriving a validator with a
//! different tag name copies the registry and starts from an empty cache;
//! the source instance is never touched.

use crate::cache::ValidatorCache;
use crate::compiler::{
    bare_routine, bind_rule, tag_failure, Binding, Routine, Session, Step, Walk,
};
use crate::config::ValidatorConfig;
use crate::errors::{ConfigError, ErrorKind, TagError, ValidationResult, INVALID_RULE};
use crate::inspect::{Inspect, Shape, TypeRef, View};
use crate::registry::{RuleCompiler, RuleRegistry};
use crate::tags::RuleSpec;
use std::fmt;
use tracing::debug;

/// Message recorded when a struct is passed to [`Validator::valid`]
pub const STRUCT_THROUGH_VALID: &str = "unsupported: use validate for structs";

/// Validates values against the rules in their field annotations.
///
/// `Validator` is `Send + Sync`; one instance is meant to be shared by
/// every caller that uses the same rules and tag name.
///
/// # Example
///
/// ```
/// use walidator::{inspect, Validator};
///
/// inspect! {
///     struct Point {
///         #[tag(validate = "latitude")]
///         lat: f64,
///         #[tag(validate = "longitude")]
///         lon: f64,
///     }
/// }
///
/// let validator = Validator::new();
/// assert!(validator.validate(&Point { lat: 25.03, lon: 121.56 }).is_ok());
///
/// let errs = validator.validate(&Point { lat: 125.0, lon: 0.0 }).unwrap_err();
/// assert_eq!(errs.paths().collect::<Vec<_>>(), vec!["lat"]);
/// ```
pub struct Validator {
    pub(crate) config: ValidatorConfig,
    pub(crate) registry: RuleRegistry,
    pub(crate) cache: ValidatorCache,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Validator with the built-in rules and the default tag names
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// Validator with the built-in rules.
    ///
    /// # Panics
    ///
    /// Panics when the config's tag name is empty.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self::with_registry(config, RuleRegistry::with_builtins())
    }

    /// Validator with an explicit rule set.
    ///
    /// # Panics
    ///
    /// Panics when the config's tag name is empty.
    pub fn with_registry(config: ValidatorConfig, registry: RuleRegistry) -> Self {
        match Self::try_with_registry(config, registry) {
            Ok(validator) => validator,
            Err(err) => panic!("walidator: {}", err),
        }
    }

    pub fn try_with_registry(
        config: ValidatorConfig,
        registry: RuleRegistry,
    ) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self {
            config,
            registry,
            cache: ValidatorCache::new(),
        })
    }

    /// New validator reading rules from the `name` annotation.
    ///
    /// # Panics
    ///
    /// Panics when `name` is empty.
    pub fn with_tag_name(&self, name: impl Into<String>) -> Validator {
        Self::with_registry(self.config.clone().tag_name(name), self.registry.clone())
    }

    /// New validator taking external field names from the `name` annotation
    pub fn with_name_tag(&self, name: impl Into<String>) -> Validator {
        Self::with_registry(self.config.clone().name_tag(name), self.registry.clone())
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Registered rules
    pub fn rules(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Register a rule, replacing any rule of the same name.
    ///
    /// # Panics
    ///
    /// Panics when `name` is empty.
    pub fn add_rule(&mut self, name: impl Into<String>, compiler: impl RuleCompiler + 'static) {
        if let Err(err) = self.try_add_rule(name, compiler) {
            panic!("walidator: {}", err);
        }
    }

    /// Register a rule, replacing any rule of the same name.
    ///
    /// Routines compiled before the call are discarded.
    pub fn try_add_rule(
        &mut self,
        name: impl Into<String>,
        compiler: impl RuleCompiler + 'static,
    ) -> Result<(), ConfigError> {
        self.registry.register(name, compiler)?;
        self.cache = ValidatorCache::new();
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate a value against the rules declared on its fields
    pub fn validate(&self, value: &dyn Inspect) -> ValidationResult {
        let routine = self.type_routine(value.type_ref());
        let mut walk = Walk::new(self);
        routine.run(value, &mut walk);
        walk.finish()
    }

    /// Validate a bare value against an explicit tag.
    ///
    /// Violations of the tag's rules are reported at the root path `""`.
    /// A dynamic value is validated as the value it holds. Structs are
    /// rejected; use [`validate`](Self::validate) for them.
    pub fn valid(&self, value: &dyn Inspect, tag: &str) -> ValidationResult {
        let value = held_value(value);
        let ty = value.type_ref();
        let mut walk = Walk::new(self);
        if is_struct(ty) {
            walk.record(INVALID_RULE, ErrorKind::Unsupported, STRUCT_THROUGH_VALID);
        } else {
            bare_routine(self, ty, tag).run(value, &mut walk);
        }
        walk.finish()
    }

    // ========================================================================
    // Cached Compilation
    // ========================================================================

    pub(crate) fn type_routine(&self, ty: TypeRef) -> Routine {
        if let Some(routine) = self.cache.routine(ty.id()) {
            return routine;
        }
        let _guard = self.cache.lock_compile();
        if let Some(routine) = self.cache.routine(ty.id()) {
            return routine;
        }
        let mut session = Session::new(self);
        let routine = session.type_routine(ty);
        self.cache.commit(session.into_slots());
        routine
    }

    /// Rule bound to the concrete type held by a dynamic value
    pub(crate) fn dynamic_rule(&self, ty: TypeRef, spec: &RuleSpec) -> Step {
        let key = (ty.id(), spec.name.clone(), spec.param.clone());
        if let Some(step) = self.cache.rule(&key) {
            return step;
        }
        let _guard = self.cache.lock_compile();
        if let Some(step) = self.cache.rule(&key) {
            return step;
        }
        debug!(rule = %spec.name, type_name = ty.name(), "binding rule to dynamic value");
        let step = self.bind_spec(ty, spec, Binding::Cached);
        self.cache.insert_rule(key, step)
    }

    /// Rule bound to `ty` without consulting the cache
    pub(crate) fn bind_spec(&self, ty: TypeRef, spec: &RuleSpec, binding: Binding) -> Step {
        match self.registry.lookup(&spec.name) {
            Some(compiler) => bind_rule(ty, spec, compiler.as_ref(), binding),
            None => tag_failure(&TagError::UnknownRule(spec.name.clone())),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("compiled_types", &self.cache.type_count())
            .finish()
    }
}

/// Concrete value behind any number of dynamic wrappers
fn held_value(value: &dyn Inspect) -> &dyn Inspect {
    match value.view() {
        View::Dynamic(held) => held_value(held),
        _ => value,
    }
}

/// Struct, or a pointer to one
fn is_struct(ty: TypeRef) -> bool {
    match ty.shape() {
        Shape::Struct(_) => true,
        Shape::Optional(inner) | Shape::Boxed(inner) => is_struct(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect;

    inspect! {
        struct Account {
            #[tag(validate = "nonzero", check = "min=3")]
            name: String,
        }
    }

    fn is_validator<T: Send + Sync>() {}

    #[test]
    fn test_validator_is_send_sync() {
        is_validator::<Validator>();
    }

    #[test]
    fn test_cache_reused_across_calls() {
        let validator = Validator::new();
        let account = Account { name: String::new() };
        let first = validator.validate(&account);
        let compiled = validator.cache.type_count();
        let second = validator.validate(&account);

        assert_eq!(first, second);
        assert_eq!(validator.cache.type_count(), compiled);
    }

    #[test]
    fn test_with_tag_name_reads_other_annotation() {
        let validator = Validator::new();
        let derived = validator.with_tag_name("check");
        let account = Account { name: "ab".to_string() };

        assert!(validator.validate(&account).is_ok());
        assert!(derived.validate(&account).unwrap_err().is_min("name"));
        assert_eq!(validator.config().tag_name, "validate");
    }

    #[test]
    #[should_panic(expected = "tag name cannot be empty")]
    fn test_with_empty_tag_name_panics() {
        let _ = Validator::new().with_tag_name("");
    }

    #[test]
    #[should_panic(expected = "rule name cannot be empty")]
    fn test_add_rule_with_empty_name_panics() {
        fn noop(
            _target: &crate::Target<'_>,
            _param: &str,
        ) -> Result<crate::RuleFn, crate::RuleError> {
            Ok(crate::rule_fn(|_, _| {}))
        }
        Validator::new().add_rule("", noop);
    }

    #[test]
    fn test_valid_rejects_structs() {
        let validator = Validator::new();
        let account = Account { name: "abc".to_string() };
        for errs in [
            validator.valid(&account, "nonzero").unwrap_err(),
            validator.valid(&Some(account), "nonzero").unwrap_err(),
        ] {
            assert!(errs.is_unsupported(""));
            assert_eq!(errs.get("")[0].message, STRUCT_THROUGH_VALID);
        }
    }

    #[test]
    fn test_valid_rejects_structs_held_dynamically() {
        let validator = Validator::new();
        let held: Box<dyn Inspect> = Box::new(Account { name: String::new() });
        let nested: Box<dyn Inspect> = Box::new(held);

        let errs = validator.valid(&nested, "nonzero").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.get("").len(), 1);
        assert_eq!(errs.get("")[0].message, STRUCT_THROUGH_VALID);
        assert!(errs.get("name").is_empty());
    }

    #[test]
    fn test_is_struct() {
        assert!(is_struct(TypeRef::of::<Account>()));
        assert!(is_struct(TypeRef::of::<Option<Box<Account>>>()));
        assert!(!is_struct(TypeRef::of::<Vec<Account>>()));
        assert!(!is_struct(TypeRef::of::<String>()));
    }
}
