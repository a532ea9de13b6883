use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{ErasedValue, TypeToken},
    binding::Argument,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    key::BindingKey,
    resolver::Resolver,
    service::{service_fn, BoxCloneService},
};

/// Producer taking only injected dependencies. Implemented for closures `FnMut(deps...) -> Result<T, E>`.
pub trait Instantiator<Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

/// Producer taking a caller-supplied argument followed by injected dependencies.
pub trait FactoryInstantiator<Arg, Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, argument: Arg, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

pub(crate) struct ProduceRequest {
    pub(crate) resolver: Resolver,
    pub(crate) argument: Argument,
}

impl ProduceRequest {
    #[inline]
    #[must_use]
    pub(crate) const fn new(resolver: Resolver, argument: Argument) -> Self {
        Self { resolver, argument }
    }
}

pub(crate) type ProducerError = InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>;

pub(crate) type BoxedProducer = BoxCloneService<ProduceRequest, ErasedValue, ProducerError>;

#[inline]
pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> ErasedValue {
    Arc::new(value)
}

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(mut instantiator: Inst) -> BoxedProducer
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
{
    BoxCloneService::new(service_fn(move |ProduceRequest { resolver, .. }| -> Result<ErasedValue, ProducerError> {
        let dependencies = match Deps::resolve(&resolver) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let provides = match instantiator.instantiate(dependencies) {
            Ok(provides) => provides,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Instantiated");
        Ok(erase(Arc::new(provides)))
    }))
}

#[must_use]
pub(crate) fn boxed_factory_instantiator<Inst, Arg, Deps>(mut instantiator: Inst) -> BoxedProducer
where
    Inst: FactoryInstantiator<Arg, Deps>,
    Arg: Send + Sync + 'static,
    Deps: DependencyResolver,
{
    BoxCloneService::new(service_fn(move |ProduceRequest { resolver, argument }| -> Result<ErasedValue, ProducerError> {
        let argument = match argument.take::<Arg>() {
            Ok(argument) => argument,
            Err(argument) => {
                return Err(InstantiatorErrorKind::Deps(ResolveErrorKind::IncorrectArgument {
                    key: BindingKey::of::<Inst::Provides>().with_argument::<Arg>(),
                    expected: TypeToken::of::<Arg>(),
                    actual: argument.type_token(),
                }))
            }
        };
        let dependencies = match Deps::resolve(&resolver) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let provides = match instantiator.instantiate(argument, dependencies) {
            Ok(provides) => provides,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Instantiated");
        Ok(erase(Arc::new(provides)))
    }))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

macro_rules! impl_factory_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Arg, Response, Err, $($ty,)*> FactoryInstantiator<Arg, ($($ty,)*)> for F
        where
            F: FnMut(Arg, $($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&mut self, argument: Arg, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self(argument, $($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
all_the_tuples!(impl_factory_instantiator);
