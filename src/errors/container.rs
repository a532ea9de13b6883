use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use super::dependency_resolver::ResolveErrorKind;
use crate::{any::TypeToken, binding::BindingKind, context::ContextId, key::BindingKey, registry::Source};

#[derive(thiserror::Error, Debug)]
pub enum BuildErrorKind {
    #[error("Binding {key} from {conflicting} overrides the one from {existing} without permission")]
    DuplicateBinding {
        key: BindingKey,
        existing: Source,
        conflicting: Source,
    },
    #[error("Module {name:?} is imported more than once")]
    DuplicateModule { name: Cow<'static, str> },
    #[error("Singleton binding {key} cannot take an argument, use a multiton")]
    SingletonWithArgument { key: BindingKey },
    #[error("Binding producing {provides} with argument {argument} cannot be registered under {key}")]
    KeyMismatch {
        key: BindingKey,
        provides: TypeToken,
        argument: TypeToken,
    },
    #[error("Option `{option}` is not supported by {kind} binding {key}")]
    UnsupportedOption {
        key: BindingKey,
        kind: BindingKind,
        option: &'static str,
    },
    #[error("Binding {key} is scoped to {scope}, but registered on another context")]
    ScopeContextMismatch { key: BindingKey, scope: TypeToken },
    #[error("Eager binding {key} failed to instantiate")]
    EagerInstantiation {
        key: BindingKey,
        #[source]
        source: ResolveErrorKind,
    },
}

/// Release hook failure of a single cached entry.
#[derive(Debug)]
pub struct ReleaseFailure {
    pub key: BindingKey,
    pub error: anyhow::Error,
}

impl Display for ReleaseFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Returned by closing a context when some release hooks failed.
/// All hooks have still been run.
#[derive(thiserror::Error, Debug)]
#[error("{} release hook(s) failed while closing context {context}", .failures.len())]
pub struct ScopeReleaseError {
    pub context: ContextId,
    pub failures: Vec<ReleaseFailure>,
}
