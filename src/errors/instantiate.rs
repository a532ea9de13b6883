use core::convert::Infallible;

use super::dependency_resolver::ResolveErrorKind;

/// Error returned from the body of a producer.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}

impl From<Infallible> for InstantiateErrorKind {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
