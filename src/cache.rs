use core::{
    any::Any,
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use ahash::RandomState;
use parking_lot::Mutex;

use crate::{any::ErasedValue, registry::BindingId};

/// Type-erased multiton argument usable as a map key.
pub(crate) trait DynArgument: Any + Send + Sync {
    fn dyn_eq(&self, other: &dyn DynArgument) -> bool;

    fn dyn_hash(&self, state: &mut dyn Hasher);

    fn as_any(&self) -> &dyn Any;
}

impl<T> DynArgument for T
where
    T: Hash + Eq + Send + Sync + 'static,
{
    fn dyn_eq(&self, other: &dyn DynArgument) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone)]
pub(crate) struct ArgumentKey(Arc<dyn DynArgument>);

impl ArgumentKey {
    #[inline]
    pub(crate) fn new<A: Hash + Eq + Send + Sync + 'static>(argument: A) -> Self {
        Self(Arc::new(argument))
    }
}

impl PartialEq for ArgumentKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(&*other.0)
    }
}

impl Eq for ArgumentKey {}

impl Hash for ArgumentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_any().type_id().hash(state);
        self.0.dyn_hash(state);
    }
}

impl Debug for ArgumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArgumentKey").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) binding: BindingId,
    pub(crate) argument: Option<ArgumentKey>,
}

/// Storage of a single cached instance. Its lock is held while the instance is being produced.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) value: Mutex<Option<ErasedValue>>,
}

#[derive(Clone)]
pub(crate) struct Resolved {
    pub(crate) binding: BindingId,
    pub(crate) value: ErasedValue,
}

/// Instances in construction order.
#[derive(Clone, Default)]
pub(crate) struct ResolvedSet(pub(crate) VecDeque<Resolved>);

impl ResolvedSet {
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Cached instances of a single owner context.
#[derive(Default)]
pub(crate) struct Cache {
    slots: HashMap<SlotKey, Arc<Slot>, RandomState>,
    resolved: ResolvedSet,
}

impl Cache {
    /// Slot for the key, created empty if missing.
    pub(crate) fn slot(&mut self, key: SlotKey) -> Arc<Slot> {
        self.slots.entry(key).or_default().clone()
    }

    #[must_use]
    pub(crate) fn owns(&self, key: &SlotKey, slot: &Arc<Slot>) -> bool {
        self.slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn into_resolved_set(self) -> ResolvedSet {
        self.resolved
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
