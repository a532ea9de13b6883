use core::{
    any::Any,
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    marker::PhantomData,
};
use std::sync::Arc;

use crate::{
    any::{AnyValue, ErasedValue, TypeToken},
    cache::ArgumentKey,
    dependency_resolver::DependencyResolver,
    errors::{InstantiatorErrorKind, ResolveErrorKind},
    finalizer::{boxed_finalizer_factory, BoxedCloneFinalizer, Finalizer},
    instantiator::{
        boxed_factory_instantiator, boxed_instantiator, erase, BoxedProducer, FactoryInstantiator, Instantiator,
        ProduceRequest, ProducerError,
    },
    key::{BindingKey, Tag},
    scope::ScopeId,
    service::{service_fn, BoxCloneService, Service as _},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// New instance per call, built from a caller-supplied argument.
    Factory,
    /// New instance per call.
    Provider,
    /// One instance per owner context.
    Singleton,
    /// One instance per owner context and argument.
    Multiton,
    /// Prebuilt value.
    Instance,
}

impl BindingKind {
    /// Whether produced instances are kept in a scope.
    #[inline]
    #[must_use]
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::Singleton | Self::Multiton)
    }
}

impl Display for BindingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Factory => "factory",
            Self::Provider => "provider",
            Self::Singleton => "singleton",
            Self::Multiton => "multiton",
            Self::Instance => "instance",
        })
    }
}

/// Caller-supplied factory argument.
pub struct Argument {
    token: TypeToken,
    value: Box<dyn Any + Send + Sync>,
}

impl Argument {
    #[inline]
    #[must_use]
    pub fn new<A: Send + Sync + 'static>(value: A) -> Self {
        Self {
            token: TypeToken::of::<A>(),
            value: Box::new(value),
        }
    }

    /// Argument of argument-free bindings.
    #[inline]
    #[must_use]
    pub fn unit() -> Self {
        Self::new(())
    }

    #[inline]
    #[must_use]
    pub const fn type_token(&self) -> TypeToken {
        self.token
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<A: 'static>(&self) -> Option<&A> {
        self.value.downcast_ref()
    }

    /// # Errors
    /// Returns the argument back if it is not an `A`.
    pub fn take<A: 'static>(self) -> Result<A, Self> {
        let Self { token, value } = self;
        value.downcast().map(|value| *value).map_err(|value| Self { token, value })
    }
}

impl Debug for Argument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argument").field("type", &self.token.name()).finish_non_exhaustive()
    }
}

pub(crate) type Upcast = Arc<dyn Fn(&ErasedValue) -> Option<ErasedValue> + Send + Sync>;

pub(crate) type ArgumentKeyFn = fn(&Argument) -> Option<ArgumentKey>;

fn argument_key<A: Hash + Eq + Clone + Send + Sync + 'static>(argument: &Argument) -> Option<ArgumentKey> {
    argument.downcast_ref::<A>().cloned().map(ArgumentKey::new)
}

fn upcast_fn<T, U>(cast: fn(Arc<T>) -> Arc<U>) -> Upcast
where
    T: ?Sized + Send + Sync + 'static,
    U: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |value: &ErasedValue| value.downcast_ref::<Arc<T>>().cloned().map(|value| erase(cast(value))))
}

/// Type-erased recipe producing instances for one binding key. Immutable once registered.
#[derive(Clone)]
pub struct Binding {
    pub(crate) kind: BindingKind,
    pub(crate) scope: Option<ScopeId>,
    pub(crate) result: TypeToken,
    pub(crate) argument: TypeToken,
    pub(crate) producer: BoxedProducer,
    pub(crate) argument_key: Option<ArgumentKeyFn>,
    pub(crate) upcasts: Vec<(TypeToken, Upcast)>,
    pub(crate) finalizer: Option<BoxedCloneFinalizer>,
    pub(crate) eager: bool,
}

impl Binding {
    fn new(kind: BindingKind, result: TypeToken, argument: TypeToken, producer: BoxedProducer) -> Self {
        Self {
            kind,
            scope: None,
            result,
            argument,
            producer,
            argument_key: None,
            upcasts: Vec::new(),
            finalizer: None,
            eager: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> BindingKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    #[inline]
    #[must_use]
    pub const fn result(&self) -> TypeToken {
        self.result
    }

    #[inline]
    #[must_use]
    pub const fn argument(&self) -> TypeToken {
        self.argument
    }

    #[inline]
    #[must_use]
    pub const fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn is_eager(&self) -> bool {
        self.eager
    }

    /// Whether instances can be requested as `token`: the result type itself or one of the declared upcasts.
    #[must_use]
    pub fn provides(&self, token: TypeToken) -> bool {
        self.result == token || self.upcasts.iter().any(|(target, _)| *target == token)
    }

    /// Views a produced value as `token`.
    pub(crate) fn cast(&self, value: &ErasedValue, token: TypeToken) -> Option<ErasedValue> {
        if self.result == token {
            return Some(value.clone());
        }
        let (_, upcast) = self.upcasts.iter().find(|(target, _)| *target == token)?;
        upcast(value)
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("result", &self.result.name())
            .field("argument", &self.argument.name())
            .field("upcasts", &self.upcasts.iter().map(|(token, _)| token.name()).collect::<Vec<_>>())
            .field("finalizer", &self.finalizer.is_some())
            .field("eager", &self.eager)
            .finish_non_exhaustive()
    }
}

/// Builder of a binding of `T` with argument `A`, added to a [`crate::Module`].
#[must_use]
pub struct Bind<T: ?Sized, A = ()> {
    key: BindingKey,
    binding: Binding,
    allow_override: bool,
    _marker: PhantomData<fn(A) -> Arc<T>>,
}

impl<T, A> Bind<T, A>
where
    T: ?Sized + Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn new(kind: BindingKind, producer: BoxedProducer) -> Self {
        let key = BindingKey::of::<T>().with_argument::<A>();
        Self {
            binding: Binding::new(kind, key.result, key.argument, producer),
            key,
            allow_override: false,
            _marker: PhantomData,
        }
    }

    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.key.tag = Some(tag.into());
        self
    }

    /// Makes the binding available only to requests on a context of type `C`.
    pub fn on_context<C: ?Sized + 'static>(mut self) -> Self {
        self.key.context = TypeToken::of::<C>();
        self
    }

    /// Caches instances per context of type `C` instead of once per container.
    pub fn scoped<C: ?Sized + 'static>(mut self) -> Self {
        self.key.context = TypeToken::of::<C>();
        self.binding.scope = Some(ScopeId::of::<C>());
        self
    }

    /// Declares `U` as a supertype of `T`, making instances visible to multi-binding requests of `U`.
    pub fn upcast<U: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<T>) -> Arc<U>) -> Self {
        self.binding.upcasts.push((TypeToken::of::<U>(), upcast_fn(cast)));
        self
    }

    /// Registers the binding under `U` instead of `T`.
    ///
    /// Upcasts and the finalizer declared so far are dropped.
    pub fn expose<U: ?Sized + Send + Sync + 'static>(self, cast: fn(Arc<T>) -> Arc<U>) -> Bind<U, A> {
        let Self {
            mut key,
            mut binding,
            allow_override,
            ..
        } = self;

        let mut inner = binding.producer;
        binding.producer = BoxCloneService::new(service_fn(move |request: ProduceRequest| -> Result<ErasedValue, ProducerError> {
            let value = inner.call(request)?;
            match value.downcast_ref::<Arc<T>>() {
                Some(value) => Ok(erase(cast(value.clone()))),
                None => Err(InstantiatorErrorKind::Deps(ResolveErrorKind::IncorrectType {
                    key: BindingKey::of::<T>().with_argument::<A>(),
                    expected: TypeToken::of::<T>(),
                })),
            }
        }));
        key.result = TypeToken::of::<U>();
        binding.result = key.result;
        binding.upcasts.clear();
        binding.finalizer = None;

        Bind {
            key,
            binding,
            allow_override,
            _marker: PhantomData,
        }
    }

    /// Release hook run once when the owning context is closed. Only for singletons and multitons.
    pub fn finalizer<Fin: Finalizer<T>>(mut self, finalizer: Fin) -> Self {
        self.binding.finalizer = Some(boxed_finalizer_factory(finalizer));
        self
    }

    /// Allows this binding to replace an earlier one with the same key.
    pub fn overriding(mut self) -> Self {
        self.allow_override = true;
        self
    }

    /// Instantiates the singleton while the container is built.
    pub fn eager(mut self) -> Self {
        self.binding.eager = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> &BindingKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (BindingKey, Binding, bool) {
        (self.key, self.binding, self.allow_override)
    }
}

impl<T, A> Bind<T, A>
where
    T: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn sized(kind: BindingKind, producer: BoxedProducer) -> Self {
        Self::new(kind, producer).upcast::<AnyValue>(|value| value)
    }
}

/// Binding producing a new instance per request.
pub fn provider<Inst, Deps>(instantiator: Inst) -> Bind<Inst::Provides>
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver + 'static,
{
    Bind::sized(BindingKind::Provider, boxed_instantiator(instantiator))
}

/// Binding producing one instance per owner context, on first request.
pub fn singleton<Inst, Deps>(instantiator: Inst) -> Bind<Inst::Provides>
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver + 'static,
{
    Bind::sized(BindingKind::Singleton, boxed_instantiator(instantiator))
}

/// Binding producing a new instance per request from a caller-supplied argument.
pub fn factory<Inst, Arg, Deps>(instantiator: Inst) -> Bind<Inst::Provides, Arg>
where
    Inst: FactoryInstantiator<Arg, Deps>,
    Arg: Send + Sync + 'static,
    Deps: DependencyResolver + 'static,
{
    Bind::sized(BindingKind::Factory, boxed_factory_instantiator(instantiator))
}

/// Binding producing one instance per owner context and distinct argument.
pub fn multiton<Inst, Arg, Deps>(instantiator: Inst) -> Bind<Inst::Provides, Arg>
where
    Inst: FactoryInstantiator<Arg, Deps>,
    Arg: Hash + Eq + Clone + Send + Sync + 'static,
    Deps: DependencyResolver + 'static,
{
    let mut bind = Bind::sized(BindingKind::Multiton, boxed_factory_instantiator(instantiator));
    bind.binding.argument_key = Some(argument_key::<Arg>);
    bind
}

/// Binding returning the given value on every request.
pub fn instance<T: Send + Sync + 'static>(value: T) -> Bind<T> {
    let value = erase(Arc::new(value));
    Bind::sized(
        BindingKind::Instance,
        BoxCloneService::new(service_fn(move |_: ProduceRequest| Ok::<_, ProducerError>(value.clone()))),
    )
}

/// Binding returning the given shared value, possibly a trait object, on every request.
pub fn instance_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Bind<T> {
    let value = erase(value);
    Bind::new(
        BindingKind::Instance,
        BoxCloneService::new(service_fn(move |_: ProduceRequest| Ok::<_, ProducerError>(value.clone()))),
    )
}

#[cfg(test)]
mod tests {
    use super::{factory, instance, instance_arc, multiton, provider, singleton, Argument, BindingKind};
    use crate::{any::TypeToken, instantiator::ProduceRequest, service::Service as _, Container, InstantiateErrorKind};

    use std::sync::Arc;

    trait Animal: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Dog;

    impl Animal for Dog {
        fn name(&self) -> &str {
            "dog"
        }
    }

    #[test]
    fn test_argument() {
        let argument = Argument::new(5_u32);

        assert_eq!(argument.type_token(), TypeToken::of::<u32>());
        assert_eq!(argument.downcast_ref::<u32>(), Some(&5));
        assert!(argument.downcast_ref::<u64>().is_none());

        let argument = argument.take::<u64>().unwrap_err();
        assert_eq!(argument.take::<u32>().unwrap(), 5);
    }

    #[test]
    fn test_constructors_set_key_and_kind() {
        let (key, binding, allow_override) = singleton(|| Ok::<_, InstantiateErrorKind>(Dog))
            .tagged("rex")
            .overriding()
            .into_parts();
        assert_eq!(key.result, TypeToken::of::<Dog>());
        assert_eq!(key.tag.as_ref().map(|tag| tag.as_str()), Some("rex"));
        assert_eq!(binding.kind(), BindingKind::Singleton);
        assert!(allow_override);

        let bind = factory(|value: u8| Ok::<_, InstantiateErrorKind>(u32::from(value)));
        assert_eq!(bind.key().argument, TypeToken::of::<u8>());

        let (_, binding, _) = multiton(|value: u8| Ok::<_, InstantiateErrorKind>(value)).into_parts();
        assert!(binding.argument_key.is_some());
        assert!(binding.kind().is_cached());

        assert!(!provider(|| Ok::<_, InstantiateErrorKind>(Dog)).into_parts().1.kind().is_cached());
    }

    #[test]
    fn test_scoped_sets_context_and_scope() {
        struct Session;

        let (key, binding, _) = singleton(|| Ok::<_, InstantiateErrorKind>(Dog)).scoped::<Session>().into_parts();

        assert_eq!(key.context, TypeToken::of::<Session>());
        assert_eq!(binding.scope().map(|scope| scope.context_type()), Some(TypeToken::of::<Session>()));
    }

    #[test]
    fn test_upcast_and_cast() {
        let (_, binding, _) = instance(Dog).upcast::<dyn Animal>(|dog| dog).into_parts();

        assert!(binding.provides(TypeToken::of::<Dog>()));
        assert!(binding.provides(TypeToken::of::<dyn Animal>()));
        assert!(binding.provides(TypeToken::any()));
        assert!(!binding.provides(TypeToken::of::<u8>()));

        let container = Container::new([]).unwrap();
        let value = binding
            .producer
            .clone()
            .call(ProduceRequest::new(container.resolver(), Argument::unit()))
            .unwrap();
        let animal = binding.cast(&value, TypeToken::of::<dyn Animal>()).unwrap();

        assert_eq!(animal.downcast_ref::<Arc<dyn Animal>>().unwrap().name(), "dog");
        assert!(binding.cast(&value, TypeToken::of::<u8>()).is_none());
    }

    #[test]
    fn test_expose() {
        let (key, binding, _) = provider(|| Ok::<_, InstantiateErrorKind>(Dog))
            .expose::<dyn Animal>(|dog| dog)
            .into_parts();

        assert_eq!(key.result, TypeToken::of::<dyn Animal>());
        assert!(!binding.provides(TypeToken::of::<Dog>()));

        let container = Container::new([]).unwrap();
        let value = binding
            .producer
            .clone()
            .call(ProduceRequest::new(container.resolver(), Argument::unit()))
            .unwrap();
        assert_eq!(value.downcast_ref::<Arc<dyn Animal>>().unwrap().name(), "dog");
    }

    #[test]
    fn test_instance_arc_trait_object() {
        let animal: Arc<dyn Animal> = Arc::new(Dog);
        let (key, binding, _) = instance_arc(animal).into_parts();

        assert_eq!(key.result, TypeToken::of::<dyn Animal>());
        assert_eq!(binding.kind(), BindingKind::Instance);
        assert!(!binding.provides(TypeToken::any()));
    }
}
