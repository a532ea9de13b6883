use core::ops::Deref;
use std::sync::Arc;
use tracing::warn;

use crate::{
    any::TypeToken, dependency_resolver::DependencyResolver, errors::ResolveErrorKind, handle::Provider,
    resolver::Resolver,
};

/// Instance of the untagged, argument-free binding of `T` on the current context.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<T> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        resolver.get().map(Self)
    }
}

impl<T: ?Sized> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Instances of every binding providing `T`, in registration order.
pub struct InjectAll<T: ?Sized>(pub Vec<Arc<T>>);

impl<T: ?Sized + Send + Sync + 'static> DependencyResolver for InjectAll<T> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        resolver.all_instances().map(Self)
    }
}

/// Deferred access to `T`. Lets two bindings depend on each other without a dependency loop,
/// as long as neither calls the provider while being constructed.
pub struct InjectProvider<T: ?Sized>(pub Provider<T>);

impl<T: ?Sized + Send + Sync + 'static> DependencyResolver for InjectProvider<T> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        resolver.provider().map(Self)
    }
}

/// Value of the context the binding is resolved on.
pub struct Ctx<C: ?Sized>(pub Arc<C>);

impl<C: ?Sized + Send + Sync + 'static> DependencyResolver for Ctx<C> {
    type Error = ResolveErrorKind;

    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        let context = resolver.context();
        match context.value::<C>() {
            Some(value) => Ok(Self(value)),
            None => {
                let err = ResolveErrorKind::ContextMismatch {
                    expected: TypeToken::of::<C>(),
                    actual: context.type_token(),
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }
}

impl<C: ?Sized> Deref for Ctx<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
