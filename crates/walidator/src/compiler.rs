//! Type compilation
//!
//! Turns a type's [`Shape`] into a [`Routine`]: the type's structural
//! descent with every field's rules already bound to the field type.
//! Compilation happens in a [`Session`] while the cache's compile lock is
//! held; running a routine happens in a [`Walk`] and takes no lock unless
//! a dynamic value needs a type that was never compiled.

use crate::cache::Slot;
use crate::config::ValidatorConfig;
use crate::errors::{ErrorKind, RuleError, TagError, ValidationResult, INVALID_RULE};
use crate::inspect::{describe, FieldShape, Inspect, Shape, StructShape, TypeRef, View};
use crate::path::{PathTracker, Reporter, Segment};
use crate::registry::{RuleCompiler, RuleFn, RuleRegistry, Target};
use crate::tags::{self, RuleSpec, Tag};
use crate::validator::Validator;
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

// ============================================================================
// Steps and Routines
// ============================================================================

/// Compiled check over one value
pub(crate) type Step = Arc<dyn Fn(&dyn Inspect, &mut Walk<'_>) + Send + Sync>;

pub(crate) fn step<F>(f: F) -> Step
where
    F: Fn(&dyn Inspect, &mut Walk<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Composed routine of a type; `None` when the type has nothing to check
#[derive(Clone, Default)]
pub(crate) struct Routine(Option<Step>);

impl Routine {
    pub(crate) fn noop() -> Self {
        Self(None)
    }

    pub(crate) fn new(step: Step) -> Self {
        Self(Some(step))
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.0.is_none()
    }

    pub(crate) fn run(&self, value: &dyn Inspect, walk: &mut Walk<'_>) {
        if let Some(step) = &self.0 {
            step(value, walk);
        }
    }
}

// ============================================================================
// Walk
// ============================================================================

/// State of one validation call
pub(crate) struct Walk<'a> {
    validator: &'a Validator,
    path: PathTracker,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(validator: &'a Validator) -> Self {
        Self {
            validator,
            path: PathTracker::new(),
        }
    }

    pub(crate) fn validator(&self) -> &'a Validator {
        self.validator
    }

    /// Run `f` with `segment` pushed onto the path
    pub(crate) fn scoped(&mut self, segment: Segment, f: impl FnOnce(&mut Self)) {
        self.path.push(segment);
        f(self);
        self.path.pop();
    }

    pub(crate) fn record(&mut self, rule: &str, kind: ErrorKind, message: impl Into<String>) {
        self.path.record(rule, kind, message);
    }

    pub(crate) fn reporter<'r>(&'r mut self, rule: &'r str) -> Reporter<'r> {
        Reporter::new(&mut self.path, rule)
    }

    pub(crate) fn finish(self) -> ValidationResult {
        self.path.finalize()
    }
}

// ============================================================================
// Session
// ============================================================================

/// One compilation pass.
///
/// Every type compiled in the session gets a slot before its shape is
/// walked; a nested request for a type still being built receives a
/// routine that forwards to the slot.
pub(crate) struct Session<'a> {
    validator: &'a Validator,
    pending: HashMap<TypeId, Arc<Slot>>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(validator: &'a Validator) -> Self {
        Self {
            validator,
            pending: HashMap::new(),
        }
    }

    /// Slots filled by this session, ready to be committed
    pub(crate) fn into_slots(self) -> HashMap<TypeId, Arc<Slot>> {
        self.pending
    }

    pub(crate) fn type_routine(&mut self, ty: TypeRef) -> Routine {
        let id = ty.id();
        if let Some(routine) = self.validator.cache.routine(id) {
            return routine;
        }
        if let Some(slot) = self.pending.get(&id) {
            return match slot.get() {
                Some(routine) => routine.clone(),
                None => forward(slot),
            };
        }

        let slot = Arc::new(Slot::default());
        self.pending.insert(id, Arc::clone(&slot));
        debug!(type_name = ty.name(), "compiling validation routine");
        let routine = self.build(ty);
        slot.fill(routine.clone());
        routine
    }

    fn build(&mut self, ty: TypeRef) -> Routine {
        match ty.shape() {
            Shape::Optional(inner) | Shape::Boxed(inner) => {
                let inner = self.type_routine(inner);
                if inner.is_noop() {
                    return Routine::noop();
                }
                Routine::new(step(move |value, walk| {
                    if let View::Pointer(Some(target)) = value.view() {
                        inner.run(target, walk);
                    }
                }))
            }
            Shape::Seq(elem) | Shape::Array(elem, _) => {
                let elem = self.type_routine(elem);
                if elem.is_noop() {
                    return Routine::noop();
                }
                Routine::new(step(move |value, walk| {
                    if let View::Seq(items) = value.view() {
                        for index in 0..items.len() {
                            if let Some(item) = items.get(index) {
                                walk.scoped(Segment::Index(index), |walk| elem.run(item, walk));
                            }
                        }
                    }
                }))
            }
            Shape::Map { key, value } => self.build_map(key, value),
            Shape::Struct(shape) => self.build_struct(&shape),
            Shape::Dynamic => Routine::new(step(run_dynamic)),
            Shape::Bool
            | Shape::Int
            | Shape::Uint
            | Shape::Float
            | Shape::Str
            | Shape::Opaque => Routine::noop(),
        }
    }

    fn build_map(&mut self, key: TypeRef, value: TypeRef) -> Routine {
        let key_routine = self.type_routine(key);
        let value_routine = self.type_routine(value);
        if key_routine.is_noop() && value_routine.is_noop() {
            return Routine::noop();
        }
        Routine::new(step(move |map, walk| {
            if let View::Map(entries) = map.view() {
                for (k, v) in entries.entries() {
                    let text = describe(k);
                    if !key_routine.is_noop() {
                        walk.scoped(Segment::MapKey(text.clone()), |walk| {
                            key_routine.run(k, walk)
                        });
                    }
                    if !value_routine.is_noop() {
                        walk.scoped(Segment::MapValue(text), |walk| value_routine.run(v, walk));
                    }
                }
            }
        }))
    }

    fn build_struct(&mut self, shape: &StructShape) -> Routine {
        let fields: Vec<FieldRoutine> = shape
            .fields
            .iter()
            .enumerate()
            .filter_map(|(index, field)| self.compile_field(index, field))
            .collect();
        if fields.is_empty() {
            return Routine::noop();
        }
        Routine::new(step(move |value, walk| {
            if let View::Struct(values) = value.view() {
                for field in &fields {
                    if let Some(&field_value) = values.get(field.index) {
                        walk.scoped(Segment::Field(field.name.clone()), |walk| {
                            field.body.run(field_value, walk)
                        });
                    }
                }
            }
        }))
    }

    fn compile_field(&mut self, index: usize, field: &FieldShape) -> Option<FieldRoutine> {
        let validator = self.validator;
        let tag = field.tag(&validator.config.tag_name).unwrap_or("");
        let name = field_name(field, &validator.config, tag)?;

        let checks = match tags::parse(tag) {
            Ok(Tag::Skip) => return None,
            Ok(Tag::Rules(specs)) => {
                bind_rules(&validator.registry, field.ty, &specs, Binding::Cached)
            }
            // Bad tags still descend so nested fields get reported
            Err(err) => vec![tag_failure(&err)],
        };
        let body = Checked {
            checks,
            child: self.type_routine(field.ty),
        };
        if body.is_noop() {
            return None;
        }
        Some(FieldRoutine { index, name, body })
    }
}

/// Own rule checks of a value followed by its type's descent
struct Checked {
    checks: Vec<Step>,
    child: Routine,
}

impl Checked {
    fn is_noop(&self) -> bool {
        self.checks.is_empty() && self.child.is_noop()
    }

    fn run(&self, value: &dyn Inspect, walk: &mut Walk<'_>) {
        for check in &self.checks {
            check(value, walk);
        }
        self.child.run(value, walk);
    }
}

struct FieldRoutine {
    /// Position in the struct's view
    index: usize,
    name: Cow<'static, str>,
    body: Checked,
}

/// External name of a field, `None` when the field is not validated.
///
/// The name annotation's part before the first comma wins over the declared
/// name. A name annotation of `-` hides the field unless it carries rules.
fn field_name(
    field: &FieldShape,
    config: &ValidatorConfig,
    rule_tag: &str,
) -> Option<Cow<'static, str>> {
    let external = config
        .name_tag
        .as_deref()
        .and_then(|key| field.tag(key))
        .and_then(|tag| tag.split(',').next())
        .map(str::trim)
        .unwrap_or("");

    match external {
        tags::SKIP if rule_tag.trim().is_empty() => None,
        "" | tags::SKIP => Some(Cow::Borrowed(field.name)),
        name => Some(Cow::Borrowed(name)),
    }
}

fn forward(slot: &Arc<Slot>) -> Routine {
    let slot: Weak<Slot> = Arc::downgrade(slot);
    Routine::new(step(move |value, walk| {
        if let Some(slot) = slot.upgrade() {
            if let Some(routine) = slot.get() {
                routine.run(value, walk);
            }
        }
    }))
}

fn run_dynamic(value: &dyn Inspect, walk: &mut Walk<'_>) {
    if let View::Dynamic(held) = value.view() {
        let routine = walk.validator().type_routine(held.type_ref());
        routine.run(held, walk);
    }
}

/// Routine for a bare value: the tag's rules, then the type's descent.
///
/// Built for every call; only the type's own routine comes from the cache,
/// so arbitrary caller tags never grow it.
pub(crate) fn bare_routine(validator: &Validator, ty: TypeRef, tag: &str) -> Routine {
    let checks = match tags::parse(tag) {
        Ok(Tag::Skip) => return Routine::noop(),
        Ok(Tag::Rules(specs)) => bind_rules(&validator.registry, ty, &specs, Binding::PerCall),
        Err(err) => vec![tag_failure(&err)],
    };
    let checked = Checked {
        checks,
        child: validator.type_routine(ty),
    };
    if checked.is_noop() {
        return Routine::noop();
    }
    Routine::new(step(move |value, walk| checked.run(value, walk)))
}

// ============================================================================
// Rule Binding
// ============================================================================

/// When a rule met on a dynamic value is bound to the held type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// Once per (held type, rule, parameter), kept in the cache
    Cached,
    /// On every call, for tags that do not belong to a type
    PerCall,
}

/// Bind every rule of a tag to `ty`.
///
/// A name missing from the registry replaces the whole list with a single
/// failure, so none of the field's rules run.
fn bind_rules(
    registry: &RuleRegistry,
    ty: TypeRef,
    specs: &[RuleSpec],
    binding: Binding,
) -> Vec<Step> {
    let mut compilers = Vec::with_capacity(specs.len());
    for spec in specs {
        match registry.lookup(&spec.name) {
            Some(compiler) => compilers.push((spec, compiler)),
            None => return vec![tag_failure(&TagError::UnknownRule(spec.name.clone()))],
        }
    }
    compilers
        .into_iter()
        .map(|(spec, compiler)| bind_rule(ty, spec, compiler.as_ref(), binding))
        .collect()
}

/// Bind one rule to `ty`, deferring a failed binding to validation time
pub(crate) fn bind_rule(
    ty: TypeRef,
    spec: &RuleSpec,
    compiler: &dyn RuleCompiler,
    binding: Binding,
) -> Step {
    try_bind(ty, spec, compiler, binding).unwrap_or_else(|err| rule_failure(&spec.name, &err))
}

fn try_bind(
    ty: TypeRef,
    spec: &RuleSpec,
    compiler: &dyn RuleCompiler,
    binding: Binding,
) -> Result<Step, RuleError> {
    let shape = ty.shape();
    let err = match compiler.compile(&Target::new(ty, &shape), &spec.param) {
        Ok(rule) => return Ok(rule_step(spec.name.clone(), rule)),
        Err(err) => err,
    };
    if !matches!(err, RuleError::Unsupported { .. }) {
        return Err(err);
    }

    match shape {
        // Rule is about the pointee: only runs when a value is present
        Shape::Optional(inner) | Shape::Boxed(inner) => {
            let inner = try_bind(inner, spec, compiler, binding)?;
            Ok(step(move |value, walk| {
                if let View::Pointer(Some(target)) = value.view() {
                    inner(target, walk);
                }
            }))
        }
        // Rule is bound against whatever type is held at validation time
        Shape::Dynamic => {
            let spec = spec.clone();
            Ok(step(move |value, walk| {
                if let View::Dynamic(held) = value.view() {
                    let validator = walk.validator();
                    let rule = match binding {
                        Binding::Cached => validator.dynamic_rule(held.type_ref(), &spec),
                        Binding::PerCall => validator.bind_spec(held.type_ref(), &spec, binding),
                    };
                    rule(held, walk);
                }
            }))
        }
        _ => Err(err),
    }
}

fn rule_step(name: String, rule: RuleFn) -> Step {
    step(move |value, walk| {
        let view = value.view();
        rule(&view, &mut walk.reporter(&name));
    })
}

fn rule_failure(name: &str, err: &RuleError) -> Step {
    failure(err.kind(), format!("{}: {}", name, err))
}

pub(crate) fn tag_failure(err: &TagError) -> Step {
    failure(err.kind(), err.to_string())
}

/// Step that always records a structural violation
fn failure(kind: ErrorKind, message: String) -> Step {
    step(move |_, walk| walk.record(INVALID_RULE, kind, message.clone()))
}
