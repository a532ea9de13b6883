use std::sync::Arc;
use tracing::{debug_span, error, warn};

use crate::{
    any::{ErasedValue, TypeToken},
    binding::Argument,
    cache::SlotKey,
    container::{Container, ContainerInner},
    context::{Context, ContextId},
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    handle::{Factory, Provider},
    instantiator::{ProduceRequest, ProducerError},
    key::{BindingKey, Tag},
    lazy::Lazy,
    loop_guard::LoopGuard,
    registry::{BindingId, Registered},
    service::Service as _,
};

/// Resolves bindings of a container on behalf of a context.
///
/// Keys are built with the context type of the resolver, so a resolver for a `Session` context
/// sees bindings registered on `Session` and, with context fallback, those of the root context.
#[derive(Clone)]
pub struct Resolver {
    pub(crate) container: Arc<ContainerInner>,
    pub(crate) context: Context,
}

fn downcast<T: ?Sized + 'static>(key: &BindingKey, value: &ErasedValue) -> Result<Arc<T>, ResolveErrorKind> {
    value.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
        let err = ResolveErrorKind::IncorrectType {
            key: key.clone(),
            expected: TypeToken::of::<T>(),
        };
        error!("{}", err);
        err
    })
}

/// Dependency loops are reported as is, every other failure is attributed to the binding being produced.
fn producer_error(key: &BindingKey, err: ProducerError) -> ResolveErrorKind {
    let source = match err {
        InstantiatorErrorKind::Deps(err) if err.is_dependency_loop() => return err,
        InstantiatorErrorKind::Factory(InstantiateErrorKind::Resolve(err)) if err.is_dependency_loop() => return *err,
        InstantiatorErrorKind::Deps(err) => InstantiatorErrorKind::Deps(Box::new(err)),
        InstantiatorErrorKind::Factory(err) => InstantiatorErrorKind::Factory(err),
    };

    let err = ResolveErrorKind::Instantiator {
        key: key.clone(),
        source,
    };
    error!("{}", err);
    err
}

fn curry<A, T>(factories: Vec<Factory<A, T>>, argument: impl Fn() -> A + Clone + Send + Sync + 'static) -> Vec<Provider<T>>
where
    A: 'static,
    T: ?Sized + 'static,
{
    factories
        .into_iter()
        .map(|factory| factory.to_provider(argument.clone()))
        .collect()
}

impl Resolver {
    #[inline]
    pub(crate) const fn new(container: Arc<ContainerInner>, context: Context) -> Self {
        Self { container, context }
    }

    #[inline]
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> Container {
        Container {
            inner: self.container.clone(),
        }
    }

    /// Same container, root context.
    #[inline]
    #[must_use]
    pub fn root(&self) -> Self {
        Self::new(self.container.clone(), Context::root())
    }

    #[inline]
    fn key<T: ?Sized + 'static, A: ?Sized + 'static>(&self, tag: Option<Tag>) -> BindingKey {
        BindingKey::new(self.context.type_token(), TypeToken::of::<A>(), TypeToken::of::<T>(), tag)
    }

    /// # Errors
    /// See [`Container::get`].
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by(&self.key::<T, ()>(None), Argument::unit())
    }

    /// # Errors
    /// See [`Container::get`].
    pub fn get_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: impl Into<Tag>) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by(&self.key::<T, ()>(Some(tag.into())), Argument::unit())
    }

    /// # Errors
    /// See [`Container::get_with`].
    pub fn get_with<T, A>(&self, argument: A) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.get_by(&self.key::<T, A>(None), Argument::new(argument))
    }

    /// # Errors
    /// See [`Container::get_with`].
    pub fn get_tagged_with<T, A>(&self, tag: impl Into<Tag>, argument: A) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.get_by(&self.key::<T, A>(Some(tag.into())), Argument::new(argument))
    }

    /// Like [`Resolver::get`], but `None` when `T` has no binding.
    ///
    /// # Errors
    /// Failures of an existing binding are still returned.
    pub fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let key = self.key::<T, ()>(None);
        if self.container.lookup_for(&key).is_none() {
            return Ok(None);
        }
        self.get_by(&key, Argument::unit()).map(Some)
    }

    /// Handle producing `T` on each call. The binding must exist now, it is instantiated on call only.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if `T` has no binding.
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Provider<T>, ResolveErrorKind> {
        self.provider_by(self.key::<T, ()>(None))
    }

    /// # Errors
    /// See [`Resolver::provider`].
    pub fn provider_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Provider<T>, ResolveErrorKind> {
        self.provider_by(self.key::<T, ()>(Some(tag.into())))
    }

    /// Handle producing `T` from an argument on each call.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if `T` has no binding taking `A`.
    pub fn factory<A, T>(&self) -> Result<Factory<A, T>, ResolveErrorKind>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_by(self.key::<T, A>(None))
    }

    /// # Errors
    /// See [`Resolver::factory`].
    pub fn factory_tagged<A, T>(&self, tag: impl Into<Tag>) -> Result<Factory<A, T>, ResolveErrorKind>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_by(self.key::<T, A>(Some(tag.into())))
    }

    /// Memoizing accessor of `T`, resolved on first use.
    #[must_use]
    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&self) -> Lazy<T> {
        Lazy::new(self.clone(), self.key::<T, ()>(None))
    }

    /// Instances of every binding providing `T`, in registration order.
    ///
    /// # Errors
    /// Returns the first failure of a matching binding. No matches is not an error.
    pub fn all_instances<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.all_by(&self.key::<T, ()>(None), Argument::unit)
    }

    /// # Errors
    /// See [`Resolver::all_instances`].
    pub fn all_instances_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.all_by(&self.key::<T, ()>(Some(tag.into())), Argument::unit)
    }

    /// Instances of every binding providing `T` from an argument of type `A`. `argument` is called once per binding.
    ///
    /// # Errors
    /// See [`Resolver::all_instances`].
    pub fn all_instances_with<T, A>(&self, argument: impl Fn() -> A) -> Result<Vec<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.all_by(&self.key::<T, A>(None), || Argument::new(argument()))
    }

    /// # Errors
    /// See [`Resolver::all_instances`].
    pub fn all_instances_tagged_with<T, A>(
        &self,
        tag: impl Into<Tag>,
        argument: impl Fn() -> A,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.all_by(&self.key::<T, A>(Some(tag.into())), || Argument::new(argument()))
    }

    /// Providers of every binding providing `T`, in registration order.
    #[must_use]
    pub fn all_providers<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Provider<T>> {
        self.all_providers_by(self.key::<T, ()>(None))
    }

    #[must_use]
    pub fn all_providers_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: impl Into<Tag>) -> Vec<Provider<T>> {
        self.all_providers_by(self.key::<T, ()>(Some(tag.into())))
    }

    /// Providers of every binding providing `T` from an argument of type `A`.
    /// Each provider call evaluates `argument` again.
    #[must_use]
    pub fn all_providers_with<T, A>(&self, argument: impl Fn() -> A + Clone + Send + Sync + 'static) -> Vec<Provider<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        curry(self.all_factories::<A, T>(), argument)
    }

    #[must_use]
    pub fn all_providers_tagged_with<T, A>(
        &self,
        tag: impl Into<Tag>,
        argument: impl Fn() -> A + Clone + Send + Sync + 'static,
    ) -> Vec<Provider<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        curry(self.all_factories_tagged::<A, T>(tag), argument)
    }

    /// Factories of every binding providing `T` from an argument of type `A`, in registration order.
    #[must_use]
    pub fn all_factories<A, T>(&self) -> Vec<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.all_factories_by(self.key::<T, A>(None))
    }

    #[must_use]
    pub fn all_factories_tagged<A, T>(&self, tag: impl Into<Tag>) -> Vec<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.all_factories_by(self.key::<T, A>(Some(tag.into())))
    }

    /// Resolves the binding registered for the key.
    ///
    /// The returned value is an `Arc<R>` behind `dyn Any`, where `R` is the result type of the key.
    /// Requests on a non-root context fall back to the root context if enabled in [`crate::Config`].
    ///
    /// # Errors
    /// See [`Container::get_with`].
    pub fn resolve(&self, key: &BindingKey, argument: Argument) -> Result<ErasedValue, ResolveErrorKind> {
        let span = debug_span!("resolve", %key, context = %self.context.id());
        let _guard = span.enter();

        let Some((id, registered)) = self.container.lookup_for(key) else {
            let err = ResolveErrorKind::NotFound {
                key: key.clone(),
                similar: self.container.registry.similar(key),
            };
            warn!("{}", err);
            return Err(err);
        };
        self.resolve_registered(id, registered, key, argument)
    }

    /// Resolves every binding matching the context, argument and tag of the key and providing its result type,
    /// in registration order. Overridden bindings are included. `argument` is called once per candidate.
    ///
    /// # Errors
    /// Returns the first failure of a matching binding. No matches is not an error.
    pub fn resolve_all(
        &self,
        key: &BindingKey,
        mut argument: impl FnMut() -> Argument,
    ) -> Result<Vec<ErasedValue>, ResolveErrorKind> {
        let span = debug_span!("resolve_all", %key, context = %self.context.id());
        let _guard = span.enter();

        self.container
            .candidates_for(key)
            .into_iter()
            .map(|(id, registered)| self.resolve_registered(id, registered, key, argument()))
            .collect()
    }

    fn get_by<T: ?Sized + 'static>(&self, key: &BindingKey, argument: Argument) -> Result<Arc<T>, ResolveErrorKind> {
        let value = self.resolve(key, argument)?;
        downcast(key, &value)
    }

    fn get_by_id<T: ?Sized + 'static>(
        &self,
        id: BindingId,
        key: &BindingKey,
        argument: Argument,
    ) -> Result<Arc<T>, ResolveErrorKind> {
        let span = debug_span!("resolve", %key, context = %self.context.id());
        let _guard = span.enter();

        let Some(registered) = self.container.registry.get(id) else {
            let err = ResolveErrorKind::NotFound {
                key: key.clone(),
                similar: Vec::new(),
            };
            warn!("{}", err);
            return Err(err);
        };
        let value = self.resolve_registered(id, registered, key, argument)?;
        downcast(key, &value)
    }

    fn all_by<T: ?Sized + 'static>(
        &self,
        key: &BindingKey,
        argument: impl FnMut() -> Argument,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.resolve_all(key, argument)?
            .iter()
            .map(|value| downcast(key, value))
            .collect()
    }

    fn provider_by<T: ?Sized + Send + Sync + 'static>(&self, key: BindingKey) -> Result<Provider<T>, ResolveErrorKind> {
        self.ensure_bound(&key)?;

        let resolver = self.clone();
        Ok(Provider::new(move || resolver.get_by(&key, Argument::unit())))
    }

    fn factory_by<A, T>(&self, key: BindingKey) -> Result<Factory<A, T>, ResolveErrorKind>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.ensure_bound(&key)?;

        let resolver = self.clone();
        Ok(Factory::new(move |argument: A| resolver.get_by(&key, Argument::new(argument))))
    }

    fn all_providers_by<T: ?Sized + Send + Sync + 'static>(&self, key: BindingKey) -> Vec<Provider<T>> {
        self.container
            .candidates_for(&key)
            .into_iter()
            .map(|(id, _)| {
                let resolver = self.clone();
                let key = key.clone();
                Provider::new(move || resolver.get_by_id(id, &key, Argument::unit()))
            })
            .collect()
    }

    fn all_factories_by<A, T>(&self, key: BindingKey) -> Vec<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.container
            .candidates_for(&key)
            .into_iter()
            .map(|(id, _)| {
                let resolver = self.clone();
                let key = key.clone();
                Factory::new(move |argument: A| resolver.get_by_id(id, &key, Argument::new(argument)))
            })
            .collect()
    }

    fn ensure_bound(&self, key: &BindingKey) -> Result<(), ResolveErrorKind> {
        if self.container.lookup_for(key).is_some() {
            return Ok(());
        }
        let err = ResolveErrorKind::NotFound {
            key: key.clone(),
            similar: self.container.registry.similar(key),
        };
        warn!("{}", err);
        Err(err)
    }

    fn resolve_registered(
        &self,
        id: BindingId,
        registered: &Registered,
        key: &BindingKey,
        argument: Argument,
    ) -> Result<ErasedValue, ResolveErrorKind> {
        let value = self.instantiate(id, registered, argument)?;
        registered.binding.cast(&value, key.result).ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                key: registered.key.clone(),
                expected: key.result,
            };
            error!("{}", err);
            err
        })
    }

    /// Produces or fetches from its scope an instance of the binding, as its own result type.
    pub(crate) fn instantiate(
        &self,
        id: BindingId,
        registered: &Registered,
        argument: Argument,
    ) -> Result<ErasedValue, ResolveErrorKind> {
        let Registered { key, binding, .. } = registered;

        if argument.type_token() != binding.argument {
            let err = ResolveErrorKind::IncorrectArgument {
                key: key.clone(),
                expected: binding.argument,
                actual: argument.type_token(),
            };
            warn!("{}", err);
            return Err(err);
        }

        // Bindings found through context fallback are produced on the root context
        let resolver = if key.context == self.context.type_token() {
            self.clone()
        } else {
            self.root()
        };
        let owner = if binding.scope.is_some() {
            resolver.context.id()
        } else {
            ContextId::ROOT
        };
        let frame = if binding.kind.is_cached() {
            owner
        } else {
            resolver.context.id()
        };
        let _guard = LoopGuard::enter(self.container.id, id, key, frame)?;

        let slot = binding.kind.is_cached().then(|| SlotKey {
            binding: id,
            argument: binding.argument_key.and_then(|argument_key| argument_key(&argument)),
        });
        let produce = || {
            binding
                .producer
                .clone()
                .call(ProduceRequest::new(resolver, argument))
                .map_err(|err| producer_error(key, err))
        };

        match slot {
            Some(slot) => self
                .container
                .scopes
                .get_or_create(owner, slot, binding.finalizer.is_some(), produce),
            None => produce(),
        }
    }

    /// Changes whenever the root context or the context of this resolver is closed.
    pub(crate) fn epoch(&self) -> u64 {
        let root = self.container.scopes.epoch(ContextId::ROOT);
        if self.context.id().is_root() {
            root
        } else {
            root.wrapping_add(self.container.scopes.epoch(self.context.id()))
        }
    }
}
