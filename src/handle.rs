use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::errors::ResolveErrorKind;

/// Produces `T` on each call, following the kind of the binding it was made for.
pub struct Provider<T: ?Sized>(Arc<dyn Fn() -> Result<Arc<T>, ResolveErrorKind> + Send + Sync>);

impl<T: ?Sized> Provider<T> {
    pub fn new(provide: impl Fn() -> Result<Arc<T>, ResolveErrorKind> + Send + Sync + 'static) -> Self {
        Self(Arc::new(provide))
    }

    /// # Errors
    /// Returns the failure of the underlying binding.
    #[inline]
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        (self.0)()
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> Debug for Provider<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").finish_non_exhaustive()
    }
}

/// Produces `T` from an argument on each call.
pub struct Factory<A, T: ?Sized>(Arc<dyn Fn(A) -> Result<Arc<T>, ResolveErrorKind> + Send + Sync>);

impl<A: 'static, T: ?Sized + 'static> Factory<A, T> {
    pub fn new(produce: impl Fn(A) -> Result<Arc<T>, ResolveErrorKind> + Send + Sync + 'static) -> Self {
        Self(Arc::new(produce))
    }

    /// # Errors
    /// Returns the failure of the underlying binding.
    #[inline]
    pub fn get(&self, argument: A) -> Result<Arc<T>, ResolveErrorKind> {
        (self.0)(argument)
    }

    /// Provider calling this factory with a fresh `argument()` on every call. Nothing is memoized.
    pub fn to_provider(&self, argument: impl Fn() -> A + Send + Sync + 'static) -> Provider<T> {
        let factory = self.0.clone();
        Provider::new(move || factory(argument()))
    }
}

impl<A, T: ?Sized> Clone for Factory<A, T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A, T: ?Sized> Debug for Factory<A, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").finish_non_exhaustive()
    }
}
