//! Compiled routine cache
//!
//! Holds one routine per type and one binding per (concrete type, rule,
//! parameter) for field rules resolved against dynamic values. Both keys
//! come from declared types and their annotations, so the cache is bounded
//! by the types a program validates. Entries are never replaced once
//! published.
//!
//! Lookups take a read lock only. First compilations are serialized by a
//! single compile lock: the caller holding it rechecks the maps, compiles
//! everything the type needs in a session, and commits the session's slots
//! when it is done, so a reader either finds a complete routine or nothing.

use crate::compiler::{Routine, Step};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Key of a rule bound against a concrete type at validation time
pub(crate) type RuleKey = (TypeId, String, String);

// ============================================================================
// Slot
// ============================================================================

/// Routine of one type, filled exactly once.
///
/// Published to the compiling session before the type is built so nested
/// requests for the same type can forward to it.
#[derive(Default)]
pub(crate) struct Slot {
    routine: OnceCell<Routine>,
}

impl Slot {
    pub(crate) fn get(&self) -> Option<&Routine> {
        self.routine.get()
    }

    /// Fill the slot; a second fill is ignored
    pub(crate) fn fill(&self, routine: Routine) {
        let _ = self.routine.set(routine);
    }
}

// ============================================================================
// ValidatorCache
// ============================================================================

#[derive(Default)]
pub(crate) struct ValidatorCache {
    types: RwLock<HashMap<TypeId, Arc<Slot>>>,
    rules: RwLock<HashMap<RuleKey, Step>>,
    compile_lock: Mutex<()>,
}

impl ValidatorCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serialize first compilations
    pub(crate) fn lock_compile(&self) -> MutexGuard<'_, ()> {
        self.compile_lock.lock()
    }

    /// Committed routine of a type
    pub(crate) fn routine(&self, id: TypeId) -> Option<Routine> {
        self.types
            .read()
            .get(&id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Publish the slots compiled by one session
    pub(crate) fn commit(&self, slots: HashMap<TypeId, Arc<Slot>>) {
        if slots.is_empty() {
            return;
        }
        let mut types = self.types.write();
        for (id, slot) in slots {
            types.entry(id).or_insert(slot);
        }
    }

    pub(crate) fn rule(&self, key: &RuleKey) -> Option<Step> {
        self.rules.read().get(key).cloned()
    }

    /// Publish a rule binding, returning the one that ends up cached
    pub(crate) fn insert_rule(&self, key: RuleKey, step: Step) -> Step {
        self.rules.write().entry(key).or_insert(step).clone()
    }

    /// Number of types with a committed routine
    pub(crate) fn type_count(&self) -> usize {
        self.types.read().len()
    }

    #[cfg(test)]
    pub(crate) fn rule_count(&self) -> usize {
        self.rules.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::step;

    #[test]
    fn test_slot_fills_once() {
        let slot = Slot::default();
        assert!(slot.get().is_none());

        slot.fill(Routine::noop());
        slot.fill(Routine::new(step(|_, _| {})));
        assert!(slot.get().map(Routine::is_noop).unwrap_or(false));
    }

    #[test]
    fn test_commit_keeps_first_entry() {
        let cache = ValidatorCache::new();
        let id = TypeId::of::<u8>();

        let first = Arc::new(Slot::default());
        first.fill(Routine::noop());
        cache.commit(HashMap::from([(id, first)]));

        let second = Arc::new(Slot::default());
        second.fill(Routine::new(step(|_, _| {})));
        cache.commit(HashMap::from([(id, second)]));

        assert_eq!(cache.type_count(), 1);
        assert!(cache.routine(id).map(|r| r.is_noop()).unwrap_or(false));
    }

    #[test]
    fn test_unfilled_slot_is_not_a_routine() {
        let cache = ValidatorCache::new();
        let id = TypeId::of::<String>();
        cache.commit(HashMap::from([(id, Arc::new(Slot::default()))]));
        assert!(cache.routine(id).is_none());
    }

    #[test]
    fn test_rule_bindings() {
        let cache = ValidatorCache::new();
        let key: RuleKey = (TypeId::of::<i64>(), "min".to_string(), "1".to_string());
        assert!(cache.rule(&key).is_none());

        cache.insert_rule(key.clone(), step(|_, _| {}));
        assert!(cache.rule(&key).is_some());
        assert_eq!(cache.rule_count(), 1);
    }
}
