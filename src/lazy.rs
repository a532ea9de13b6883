use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{binding::Argument, errors::ResolveErrorKind, key::BindingKey, resolver::Resolver};

/// Resolves `T` on first [`Lazy::get`] and memoizes it.
///
/// The memoized instance is dropped after the context of the resolver, or the root context, is closed,
/// and resolved again on the next call.
pub struct Lazy<T: ?Sized> {
    resolver: Resolver,
    key: BindingKey,
    state: Mutex<Option<(u64, Arc<T>)>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub(crate) fn new(resolver: Resolver, key: BindingKey) -> Self {
        Self {
            resolver,
            key,
            state: Mutex::new(None),
        }
    }

    /// # Errors
    /// Returns the failure of the binding. Failures are not memoized.
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let epoch = self.resolver.epoch();
        if let Some((at, value)) = self.state.lock().as_ref() {
            if *at == epoch {
                return Ok(value.clone());
            }
            debug!(key = %self.key, "Memoized instance is outdated");
        }

        let value = self.resolver.resolve(&self.key, Argument::unit())?;
        let value = value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ResolveErrorKind::IncorrectType {
                key: self.key.clone(),
                expected: self.key.result,
            })?;

        *self.state.lock() = Some((epoch, value.clone()));
        Ok(value)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        let epoch = self.resolver.epoch();
        self.state.lock().as_ref().is_some_and(|(at, _)| *at == epoch)
    }

    pub fn invalidate(&self) {
        self.state.lock().take();
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl<T: ?Sized> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("key", &self.key)
            .field("initialized", &self.state.lock().is_some())
            .finish_non_exhaustive()
    }
}
