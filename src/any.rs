use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::sync::Arc;

pub(crate) type AnyValue = dyn Any + Send + Sync;

/// Value as stored in scopes and passed between bindings: an `Arc<T>` behind `dyn Any`.
pub(crate) type ErasedValue = Arc<AnyValue>;

/// Comparable identifier of a static type, generic arguments included.
#[derive(Debug, Clone, Copy)]
pub struct TypeToken {
    name: &'static str,
    id: TypeId,
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeToken {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Token of `()`, used for argument-free bindings and the root context.
    #[inline]
    #[must_use]
    pub fn unit() -> Self {
        Self::of::<()>()
    }

    /// Token of `dyn Any + Send + Sync`, the supertype every sized binding is visible under.
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self::of::<AnyValue>()
    }

    #[inline]
    #[must_use]
    pub fn is_unit(&self) -> bool {
        *self == Self::unit()
    }

    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        *self == Self::any()
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Name with module paths stripped, including inside generic arguments.
    #[must_use]
    pub fn short_name(&self) -> String {
        let mut name = String::with_capacity(self.name.len());
        let mut segment = 0;
        for (index, ch) in self.name.char_indices() {
            if !(ch.is_alphanumeric() || ch == '_' || ch == ':') {
                name.push_str(short_path(&self.name[segment..index]));
                name.push(ch);
                segment = index + ch.len_utf8();
            }
        }
        name.push_str(short_path(&self.name[segment..]));
        name
    }
}

#[inline]
fn short_path(path: &str) -> &str {
    path.rsplit_once("::").map_or(path, |(_, name)| name)
}

impl Display for TypeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(self.name)
        } else {
            f.write_str(&self.short_name())
        }
    }
}
