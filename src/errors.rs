mod container;
mod dependency_resolver;
mod global;
mod instantiate;
mod instantiator;

pub use container::{BuildErrorKind, ReleaseFailure, ScopeReleaseError};
pub use dependency_resolver::ResolveErrorKind;
pub use global::GlobalErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;

pub type InstantiatorResult<T> = Result<T, InstantiateErrorKind>;
