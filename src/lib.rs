#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binding;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod handle;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod key;
pub(crate) mod lazy;
pub(crate) mod loop_guard;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;

pub mod global;

pub use any::TypeToken;
pub use binding::{factory, instance, instance_arc, multiton, provider, singleton, Argument, Bind, Binding, BindingKind};
pub use config::Config;
pub use container::{Container, ContainerBuilder};
pub use context::{Context, ContextId};
pub use dependency_resolver::DependencyResolver;
pub use errors::{
    BuildErrorKind, GlobalErrorKind, InstantiateErrorKind, InstantiatorErrorKind, InstantiatorResult, ReleaseFailure,
    ResolveErrorKind, ScopeReleaseError,
};
pub use finalizer::Finalizer;
pub use handle::{Factory, Provider};
pub use inject::{Ctx, Inject, InjectAll, InjectProvider};
pub use instantiator::{FactoryInstantiator, Instantiator};
pub use key::{BindingKey, Tag};
pub use lazy::Lazy;
pub use registry::{BindingId, Module, Source};
pub use resolver::Resolver;
pub use scope::ScopeId;
