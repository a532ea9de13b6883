use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use crate::any::TypeToken;

/// Name distinguishing several bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Tag {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Identifies one resolvable request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingKey {
    pub context: TypeToken,
    pub argument: TypeToken,
    pub result: TypeToken,
    pub tag: Option<Tag>,
}

impl BindingKey {
    #[inline]
    #[must_use]
    pub const fn new(context: TypeToken, argument: TypeToken, result: TypeToken, tag: Option<Tag>) -> Self {
        Self {
            context,
            argument,
            result,
            tag,
        }
    }

    /// Key of an untagged, argument-free request on the root context.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeToken::unit(), TypeToken::unit(), TypeToken::of::<T>(), None)
    }

    #[inline]
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_argument<A: ?Sized + 'static>(mut self) -> Self {
        self.argument = TypeToken::of::<A>();
        self
    }

    #[inline]
    #[must_use]
    pub fn on_context<C: ?Sized + 'static>(mut self) -> Self {
        self.context = TypeToken::of::<C>();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_root_context(&self) -> Self {
        Self {
            context: TypeToken::unit(),
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_root_context(&self) -> bool {
        self.context.is_unit()
    }
}

impl Display for BindingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let full = f.alternate();
        let token = |token: &TypeToken| if full { token.name().to_owned() } else { token.short_name() };

        write!(f, "bind<{}>", token(&self.result))?;
        if let Some(tag) = &self.tag {
            write!(f, "(tag = {tag})")?;
        }
        if !self.argument.is_unit() {
            write!(f, " with argument {}", token(&self.argument))?;
        }
        if !self.context.is_unit() {
            write!(f, " on context {}", token(&self.context))?;
        }
        Ok(())
    }
}

pub(crate) struct DisplayKeys<'a> {
    pub(crate) keys: &'a [BindingKey],
    pub(crate) separator: &'static str,
}

impl Display for DisplayKeys<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, key) in self.keys.iter().enumerate() {
            if index > 0 {
                f.write_str(self.separator)?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingKey, Tag};

    struct Dog;
    struct Session;

    #[test]
    fn test_key_equality() {
        assert_eq!(BindingKey::of::<Dog>(), BindingKey::of::<Dog>());
        assert_ne!(BindingKey::of::<Dog>(), BindingKey::of::<Dog>().tagged("rex"));
        assert_ne!(BindingKey::of::<Dog>(), BindingKey::of::<Dog>().with_argument::<u32>());
        assert_ne!(BindingKey::of::<Dog>(), BindingKey::of::<Dog>().on_context::<Session>());
        assert_eq!(BindingKey::of::<Dog>(), BindingKey::of::<Dog>().on_context::<Session>().with_root_context());
        assert_eq!(Tag::from(String::from("rex")), Tag::new("rex"));
    }

    #[test]
    fn test_key_display() {
        let key = BindingKey::of::<Dog>().tagged("rex").with_argument::<u32>().on_context::<Session>();
        assert_eq!(key.to_string(), "bind<Dog>(tag = \"rex\") with argument u32 on context Session");
        assert_eq!(BindingKey::of::<Dog>().to_string(), "bind<Dog>");
    }
}
