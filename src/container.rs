use core::{
    any::type_name,
    sync::atomic::{AtomicU64, Ordering},
};
use std::{borrow::Cow, collections::HashSet, sync::Arc};
use tracing::{debug, debug_span, error, info_span};

use crate::{
    any::ErasedValue,
    binding::{Argument, Binding},
    cache::Resolved,
    config::Config,
    context::{Context, ContextId},
    errors::{BuildErrorKind, ReleaseFailure, ResolveErrorKind, ScopeReleaseError},
    key::{BindingKey, Tag},
    registry::{BindingId, Module, Registered, Registry},
    resolver::Resolver,
    scope::ScopeRegistry,
    service::Service as _,
};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Collects modules and builds a [`Container`] from them.
#[must_use]
pub struct ContainerBuilder {
    config: Config,
    modules: Vec<Module>,
    base: Registry,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            modules: Vec::new(),
            base: Registry::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn allow_override(mut self, allow_override: bool) -> Self {
        self.config.allow_override = allow_override;
        self
    }

    pub fn context_fallback(mut self, context_fallback: bool) -> Self {
        self.config.context_fallback = context_fallback;
        self
    }

    /// Adds a module. Importing two modules with the same name fails the build.
    pub fn import(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Adds a module unless one with the same name was already imported.
    pub fn import_once(self, module: Module) -> Self {
        if self.modules.iter().any(|imported| imported.name() == module.name()) {
            debug!(module = module.name(), "Module already imported");
            return self;
        }
        self.import(module)
    }

    /// Registers all modules in import order and instantiates eager singletons.
    ///
    /// # Errors
    /// Returns the first registration error, or the error of the first eager singleton that failed.
    /// No container is returned in that case.
    pub fn build(self) -> Result<Container, BuildErrorKind> {
        let Self { config, modules, base } = self;

        let span = info_span!("build", modules = modules.len());
        let _guard = span.enter();

        let mut registry = base;
        let mut names = HashSet::with_capacity(modules.len());
        for module in &modules {
            if !names.insert(module.name()) {
                let err = BuildErrorKind::DuplicateModule {
                    name: Cow::Owned(module.name().to_owned()),
                };
                error!("{}", err);
                return Err(err);
            }
            if let Err(err) = registry.register(module, config.allow_override) {
                error!("{}", err);
                return Err(err);
            }
        }

        let container = Container {
            inner: Arc::new(ContainerInner {
                id: ContainerId::next(),
                config,
                registry,
                scopes: ScopeRegistry::new(),
            }),
        };

        let resolver = container.resolver();
        for (id, registered) in container.inner.registry.active() {
            if !registered.binding.eager {
                continue;
            }
            if let Err(source) = resolver.instantiate(id, registered, Argument::unit()) {
                let err = BuildErrorKind::EagerInstantiation {
                    key: registered.key.clone(),
                    source,
                };
                error!("{}", err);
                return Err(err);
            }
            debug!(key = %registered.key, "Eager singleton instantiated");
        }

        debug!(bindings = container.inner.registry.len(), "Container built");
        Ok(container)
    }
}

/// Read-only binding map together with the scoped instances it produced.
///
/// Cloning is cheap, clones share bindings and caches.
/// Cached instances are released when the last clone (and every [`Resolver`] made from it) is dropped,
/// or explicitly with [`Container::close`] and [`Container::close_context`].
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// # Errors
    /// See [`ContainerBuilder::build`].
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Result<Self, BuildErrorKind> {
        modules.into_iter().fold(ContainerBuilder::new(), ContainerBuilder::import).build()
    }

    /// Builder seeded with the bindings and config of this container. Caches are not shared.
    pub fn extend(&self) -> ContainerBuilder {
        ContainerBuilder {
            config: self.inner.config,
            modules: Vec::new(),
            base: self.inner.registry.clone(),
        }
    }

    /// Resolver for the root context.
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.inner.clone(), Context::root())
    }

    /// Resolver for the given context.
    #[inline]
    #[must_use]
    pub fn on(&self, context: &Context) -> Resolver {
        Resolver::new(self.inner.clone(), context.clone())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.config
    }

    /// Gets an instance of the untagged, argument-free binding of `T` on the root context.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if there is no such binding
    /// - Returns [`ResolveErrorKind::DependencyLoop`] if the binding depends on itself
    /// - Returns [`ResolveErrorKind::Instantiator`] if the binding or one of its dependencies failed
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("get", dependency = type_name::<T>());
        let _guard = span.enter();

        self.resolver().get()
    }

    /// # Errors
    /// See [`Container::get`].
    pub fn get_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: impl Into<Tag>) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("get", dependency = type_name::<T>());
        let _guard = span.enter();

        self.resolver().get_tagged(tag)
    }

    /// # Errors
    /// See [`Container::get`]. Also returns [`ResolveErrorKind::IncorrectArgument`].
    pub fn get_with<T, A>(&self, argument: A) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        let span = info_span!("get", dependency = type_name::<T>(), argument = type_name::<A>());
        let _guard = span.enter();

        self.resolver().get_with(argument)
    }

    /// Instances of every binding providing `T` on the root context, in registration order.
    ///
    /// # Errors
    /// Returns the first failure of a matching binding. No matches is not an error.
    pub fn all_instances<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let span = info_span!("all_instances", dependency = type_name::<T>());
        let _guard = span.enter();

        self.resolver().all_instances()
    }

    /// # Errors
    /// See [`Resolver::resolve`].
    pub fn resolve(&self, key: &BindingKey, argument: Argument) -> Result<ErasedValue, ResolveErrorKind> {
        self.resolver().resolve(key, argument)
    }

    /// # Errors
    /// See [`Resolver::resolve_all`].
    pub fn resolve_all(
        &self,
        key: &BindingKey,
        argument: impl FnMut() -> Argument,
    ) -> Result<Vec<ErasedValue>, ResolveErrorKind> {
        self.resolver().resolve_all(key, argument)
    }

    /// Binding registered under exactly this key. No context fallback is applied.
    #[must_use]
    pub fn lookup(&self, key: &BindingKey) -> Option<&Binding> {
        self.inner.registry.lookup(key).map(|(_, registered)| &registered.binding)
    }

    /// Active bindings in registration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&BindingKey, &Binding)> {
        self.inner
            .registry
            .active()
            .map(|(_, registered)| (&registered.key, &registered.binding))
    }

    /// Releases everything cached for the root context, running finalizers in reverse construction order.
    /// New requests create new instances.
    ///
    /// # Errors
    /// Returns the finalizers that failed. Every finalizer is still run.
    pub fn close(&self) -> Result<(), ScopeReleaseError> {
        self.inner.close_owner(ContextId::ROOT)
    }

    /// Releases everything cached for the context. Must be called once the context is no longer used.
    ///
    /// # Errors
    /// See [`Container::close`].
    pub fn close_context(&self, context: &Context) -> Result<(), ScopeReleaseError> {
        self.inner.close_owner(context.id())
    }

    #[cfg(test)]
    pub(crate) fn cached(&self, context: &Context) -> usize {
        self.inner.scopes.cached(context.id())
    }
}

pub(crate) struct ContainerInner {
    pub(crate) id: ContainerId,
    pub(crate) config: Config,
    pub(crate) registry: Registry,
    pub(crate) scopes: ScopeRegistry,
}

impl ContainerInner {
    /// Binding for the key, retried on the root context if fallback is enabled.
    pub(crate) fn lookup_for(&self, key: &BindingKey) -> Option<(BindingId, &Registered)> {
        self.registry.lookup(key).or_else(|| {
            if self.config.context_fallback && !key.is_root_context() {
                self.registry.lookup(&key.with_root_context())
            } else {
                None
            }
        })
    }

    /// Candidates for a multi-binding request, retried on the root context if fallback is enabled.
    pub(crate) fn candidates_for(&self, key: &BindingKey) -> Vec<(BindingId, &Registered)> {
        let candidates: Vec<_> = self.registry.candidates(key).collect();
        if candidates.is_empty() && self.config.context_fallback && !key.is_root_context() {
            let root = key.with_root_context();
            return self.registry.candidates(&root).collect();
        }
        candidates
    }

    pub(crate) fn close_owner(&self, owner: ContextId) -> Result<(), ScopeReleaseError> {
        let span = debug_span!("close", context = %owner);
        let _guard = span.enter();

        let Some(mut resolved_set) = self.scopes.close(owner) else {
            debug!("Nothing cached");
            return Ok(());
        };

        let mut failures = Vec::new();
        while let Some(Resolved { binding, value }) = resolved_set.0.pop_back() {
            let Some(Registered { key, binding, .. }) = self.registry.get(binding) else {
                continue;
            };
            let Some(finalizer) = &binding.finalizer else {
                continue;
            };

            match finalizer.clone().call(value) {
                Ok(()) => debug!(%key, "Finalizer called"),
                Err(error) => {
                    error!(%key, "Finalizer failed: {}", error);
                    failures.push(ReleaseFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScopeReleaseError {
                context: owner,
                failures,
            })
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        for owner in self.scopes.owners() {
            if let Err(err) = self.close_owner(owner) {
                error!("{}", err);
            }
        }
        debug!("Container closed on drop");
    }
}
