use core::{
    fmt::{self, Debug, Display, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

use crate::any::{ErasedValue, TypeToken};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a context, used to partition scoped caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub const ROOT: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Owner of scoped instances.
///
/// The container never owns a context, it only keys caches by its [`ContextId`].
/// Cached entries of a context live until [`crate::Container::close_context`] is called for it.
#[derive(Clone)]
pub struct Context {
    id: ContextId,
    token: TypeToken,
    value: Option<ErasedValue>,
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}

impl Context {
    /// The context of context-free requests. Its type is `()`.
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self {
            id: ContextId::ROOT,
            token: TypeToken::unit(),
            value: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn new<C: Send + Sync + 'static>(value: C) -> Self {
        Self::from_arc(Arc::new(value))
    }

    #[must_use]
    pub fn from_arc<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            token: TypeToken::of::<C>(),
            value: Some(Arc::new(value)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn type_token(&self) -> TypeToken {
        self.token
    }

    /// Value the context was created from, if it is of type `C`.
    #[must_use]
    pub fn value<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.value.as_ref()?.downcast_ref::<Arc<C>>().cloned()
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("type", &self.token.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, ContextId};
    use crate::any::TypeToken;

    struct Session(u8);

    #[test]
    fn test_context_identity() {
        let first = Context::new(Session(1));
        let second = Context::new(Session(2));

        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
        assert_eq!(first.type_token(), TypeToken::of::<Session>());
        assert!(!first.id().is_root());
        assert_eq!(Context::root().id(), ContextId::ROOT);
        assert!(Context::root().type_token().is_unit());
    }

    #[test]
    fn test_context_value() {
        let context = Context::new(Session(7));

        assert_eq!(context.value::<Session>().unwrap().0, 7);
        assert!(context.value::<u8>().is_none());
        assert!(Context::root().value::<Session>().is_none());
    }
}
