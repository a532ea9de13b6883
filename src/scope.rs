use core::fmt::{self, Display, Formatter};
use std::collections::HashMap;

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::{ErasedValue, TypeToken},
    cache::{Cache, Resolved, ResolvedSet, SlotKey},
    context::ContextId,
};

/// Context type owning the cached instances of a scoped binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(TypeToken);

impl ScopeId {
    #[inline]
    #[must_use]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self(TypeToken::of::<C>())
    }

    #[inline]
    #[must_use]
    pub const fn context_type(&self) -> TypeToken {
        self.0
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "scope<{}>", self.0)
    }
}

/// Cached instances of every open owner context.
///
/// Lock order is slot first, owners second. The owners lock is never held while a producer runs.
#[derive(Default)]
pub(crate) struct ScopeRegistry {
    owners: Mutex<HashMap<ContextId, Cache, RandomState>>,
    epochs: Mutex<HashMap<ContextId, u64, RandomState>>,
}

impl ScopeRegistry {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for the key, calling `produce` at most once per key and owner.
    ///
    /// Concurrent callers with the same key wait for the first one. A failed `produce` caches nothing.
    /// With `track` the instance is remembered for release on close. If the owner was closed while `produce`
    /// ran, the instance is handed out uncached and remembered by the owner's next cache.
    pub(crate) fn get_or_create<E>(
        &self,
        owner: ContextId,
        key: SlotKey,
        track: bool,
        produce: impl FnOnce() -> Result<ErasedValue, E>,
    ) -> Result<ErasedValue, E> {
        let slot = self.owners.lock().entry(owner).or_default().slot(key.clone());

        let mut cached = slot.value.lock();
        if let Some(value) = cached.as_ref() {
            debug!("Found in cache");
            return Ok(value.clone());
        }
        debug!("Not found in cache");

        let value = produce()?;
        *cached = Some(value.clone());

        if track {
            let mut owners = self.owners.lock();
            let cache = owners.entry(owner).or_default();
            if !cache.owns(&key, &slot) {
                debug!(%owner, "Owner closed during instantiation, instance is released on the next close");
            }
            cache.push_resolved(Resolved {
                binding: key.binding,
                value: value.clone(),
            });
        }

        Ok(value)
    }

    /// Drops every cached instance of the owner and returns the tracked ones in construction order.
    pub(crate) fn close(&self, owner: ContextId) -> Option<ResolvedSet> {
        let cache = self.owners.lock().remove(&owner);
        *self.epochs.lock().entry(owner).or_default() += 1;
        cache.map(Cache::into_resolved_set)
    }

    /// Number of times the owner has been closed.
    #[must_use]
    pub(crate) fn epoch(&self, owner: ContextId) -> u64 {
        self.epochs.lock().get(&owner).copied().unwrap_or_default()
    }

    #[must_use]
    pub(crate) fn owners(&self) -> Vec<ContextId> {
        let mut owners: Vec<_> = self.owners.lock().keys().copied().collect();
        owners.sort_unstable();
        owners
    }

    #[cfg(test)]
    pub(crate) fn cached(&self, owner: ContextId) -> usize {
        self.owners.lock().get(&owner).map_or(0, Cache::len)
    }
}

#[cfg(test)]
mod tests {
    use super::ScopeRegistry;
    use crate::{
        any::ErasedValue,
        cache::{ArgumentKey, SlotKey},
        context::ContextId,
        registry::BindingId,
    };

    use core::{
        convert::Infallible,
        sync::atomic::{AtomicU8, Ordering},
    };
    use std::sync::{Arc, Barrier};
    use tracing_test::traced_test;

    fn key(binding: usize) -> SlotKey {
        SlotKey {
            binding: BindingId::new(binding),
            argument: None,
        }
    }

    fn erased(value: u32) -> ErasedValue {
        Arc::new(Arc::new(value))
    }

    #[test]
    #[traced_test]
    fn test_get_or_create_produces_once() {
        let registry = ScopeRegistry::new();
        let calls = AtomicU8::new(0);
        let produce = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(erased(1))
        };

        let first = registry.get_or_create(ContextId::ROOT, key(0), true, produce).unwrap();
        let second = registry.get_or_create(ContextId::ROOT, key(0), true, produce).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.cached(ContextId::ROOT), 1);
    }

    #[test]
    fn test_failed_production_is_not_cached() {
        let registry = ScopeRegistry::new();

        assert!(registry
            .get_or_create(ContextId::ROOT, key(0), true, || Err("failed"))
            .is_err());
        assert!(registry
            .get_or_create(ContextId::ROOT, key(0), true, || Ok::<_, &str>(erased(2)))
            .is_ok());
        assert_eq!(registry.close(ContextId::ROOT).unwrap().len(), 1);
    }

    #[test]
    fn test_multiton_arguments_get_own_slots() {
        let registry = ScopeRegistry::new();
        let key = |argument: u32| SlotKey {
            binding: BindingId::new(0),
            argument: Some(ArgumentKey::new(argument)),
        };

        let one = registry.get_or_create(ContextId::ROOT, key(1), false, || Ok::<_, Infallible>(erased(1))).unwrap();
        let two = registry.get_or_create(ContextId::ROOT, key(2), false, || Ok::<_, Infallible>(erased(2))).unwrap();
        let one_again = registry.get_or_create(ContextId::ROOT, key(1), false, || Ok::<_, Infallible>(erased(3))).unwrap();

        assert!(Arc::ptr_eq(&one, &one_again));
        assert!(!Arc::ptr_eq(&one, &two));
    }

    #[test]
    fn test_close_resets_owner() {
        let registry = ScopeRegistry::new();
        let owner = crate::context::Context::new(()).id();

        let first = registry.get_or_create(owner, key(0), true, || Ok::<_, Infallible>(erased(1))).unwrap();
        assert_eq!(registry.owners(), vec![owner]);
        assert_eq!(registry.epoch(owner), 0);

        let resolved = registry.close(owner).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(registry.epoch(owner), 1);
        assert!(registry.close(owner).is_none());

        let second = registry.get_or_create(owner, key(0), true, || Ok::<_, Infallible>(erased(1))).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    #[traced_test]
    fn test_instance_produced_during_close_is_tracked() {
        let registry = ScopeRegistry::new();
        let owner = crate::context::Context::new(()).id();

        let value = registry
            .get_or_create(owner, key(0), true, || {
                assert!(registry.close(owner).is_some());
                Ok::<_, Infallible>(erased(1))
            })
            .unwrap();

        let resolved = registry.close(owner).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(Arc::ptr_eq(&resolved.0[0].value, &value));
        assert!(registry.close(owner).is_none());
    }

    #[test]
    fn test_concurrent_get_or_create() {
        const THREADS: usize = 16;

        let registry = Arc::new(ScopeRegistry::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let calls = Arc::new(AtomicU8::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_create(ContextId::ROOT, key(0), false, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, Infallible>(erased(1))
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
