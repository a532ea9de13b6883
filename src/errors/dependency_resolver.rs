use core::fmt::{self, Display, Formatter};

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::{
    any::TypeToken,
    key::{BindingKey, DisplayKeys},
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No binding found for {key}{}", similar_keys(.similar))]
    NotFound { key: BindingKey, similar: Vec<BindingKey> },
    #[error("Dependency loop detected: {}", loop_keys(.cycle))]
    DependencyLoop { cycle: Vec<BindingKey> },
    #[error("Incorrect argument for {key}: expected {expected}, got {actual}")]
    IncorrectArgument {
        key: BindingKey,
        expected: TypeToken,
        actual: TypeToken,
    },
    #[error("Binding {key} does not provide {expected}")]
    IncorrectType { key: BindingKey, expected: TypeToken },
    #[error("Context mismatch: expected {expected}, got {actual}")]
    ContextMismatch { expected: TypeToken, actual: TypeToken },
    #[error("Failed to instantiate {key}")]
    Instantiator {
        key: BindingKey,
        #[source]
        source: InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>,
    },
}

impl ResolveErrorKind {
    /// Keys forming the loop, the first one repeated at the end.
    #[must_use]
    pub fn cycle(&self) -> Option<&[BindingKey]> {
        match self {
            Self::DependencyLoop { cycle } => Some(cycle),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_dependency_loop(&self) -> bool {
        matches!(self, Self::DependencyLoop { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Key of the binding the error is reported for, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&BindingKey> {
        match self {
            Self::NotFound { key, .. }
            | Self::IncorrectArgument { key, .. }
            | Self::IncorrectType { key, .. }
            | Self::Instantiator { key, .. } => Some(key),
            Self::DependencyLoop { .. } | Self::ContextMismatch { .. } => None,
        }
    }
}

struct SimilarKeys<'a>(&'a [BindingKey]);

impl Display for SimilarKeys<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(
            f,
            ". Registered bindings with the same type: {}",
            DisplayKeys {
                keys: self.0,
                separator: ", ",
            }
        )
    }
}

fn similar_keys(keys: &[BindingKey]) -> SimilarKeys<'_> {
    SimilarKeys(keys)
}

fn loop_keys(keys: &[BindingKey]) -> DisplayKeys<'_> {
    DisplayKeys { keys, separator: " -> " }
}

#[cfg(test)]
mod tests {
    use super::ResolveErrorKind;
    use crate::key::BindingKey;

    struct A;
    struct B;

    #[test]
    fn test_messages() {
        let err = ResolveErrorKind::DependencyLoop {
            cycle: vec![BindingKey::of::<A>(), BindingKey::of::<B>(), BindingKey::of::<A>()],
        };
        assert_eq!(err.to_string(), "Dependency loop detected: bind<A> -> bind<B> -> bind<A>");
        assert_eq!(err.cycle().map(<[_]>::len), Some(3));

        let err = ResolveErrorKind::NotFound {
            key: BindingKey::of::<A>(),
            similar: vec![BindingKey::of::<A>().tagged("other")],
        };
        assert_eq!(
            err.to_string(),
            "No binding found for bind<A>. Registered bindings with the same type: bind<A>(tag = \"other\")"
        );
    }
}
