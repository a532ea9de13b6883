use core::fmt::{self, Display, Formatter};
use std::{borrow::Cow, collections::HashMap};

use ahash::RandomState;
use tracing::debug;

use crate::{
    binding::{Bind, Binding, BindingKind},
    errors::BuildErrorKind,
    key::BindingKey,
};

/// Position of a binding in the registration order of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(usize);

impl BindingId {
    #[cfg(test)]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Where a registration comes from, used in build errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub module: Cow<'static, str>,
    pub index: usize,
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "module {:?} entry #{}", self.module, self.index)
    }
}

pub(crate) struct Registration {
    key: BindingKey,
    binding: Binding,
    allow_override: bool,
}

/// Named, ordered group of registrations.
#[must_use]
pub struct Module {
    name: Cow<'static, str>,
    allow_override: bool,
    entries: Vec<Registration>,
}

impl Module {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            allow_override: false,
            entries: Vec::new(),
        }
    }

    /// Lets every binding of the module replace earlier ones with the same key.
    pub fn allow_override(mut self, allow_override: bool) -> Self {
        self.allow_override = allow_override;
        self
    }

    pub fn bind<T: ?Sized + Send + Sync + 'static, A: Send + Sync + 'static>(self, bind: Bind<T, A>) -> Self {
        let (key, binding, allow_override) = bind.into_parts();
        self.register(key, binding, allow_override)
    }

    /// Adds a binding under an explicit key. The key is checked against the binding when the container is built.
    pub fn register(mut self, key: BindingKey, binding: Binding, allow_override: bool) -> Self {
        self.entries.push(Registration {
            key,
            binding,
            allow_override,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub(crate) struct Registered {
    pub(crate) key: BindingKey,
    pub(crate) binding: Binding,
    pub(crate) source: Source,
}

/// Every registration in order, plus the exact-key map where later overrides replace earlier bindings.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    entries: Vec<Registered>,
    exact: HashMap<BindingKey, BindingId, RandomState>,
}

fn validate(key: &BindingKey, binding: &Binding) -> Result<(), BuildErrorKind> {
    if binding.kind == BindingKind::Singleton && !binding.argument.is_unit() {
        return Err(BuildErrorKind::SingletonWithArgument { key: key.clone() });
    }
    if !binding.provides(key.result) || key.argument != binding.argument {
        return Err(BuildErrorKind::KeyMismatch {
            key: key.clone(),
            provides: binding.result,
            argument: binding.argument,
        });
    }

    let unsupported = |option| BuildErrorKind::UnsupportedOption {
        key: key.clone(),
        kind: binding.kind,
        option,
    };
    if !binding.kind.is_cached() {
        if binding.scope.is_some() {
            return Err(unsupported("scoped"));
        }
        if binding.finalizer.is_some() {
            return Err(unsupported("finalizer"));
        }
    }
    if binding.eager && (binding.kind != BindingKind::Singleton || binding.scope.is_some() || !key.is_root_context()) {
        return Err(unsupported("eager"));
    }

    if let Some(scope) = binding.scope {
        if scope.context_type() != key.context {
            return Err(BuildErrorKind::ScopeContextMismatch {
                key: key.clone(),
                scope: scope.context_type(),
            });
        }
    }
    Ok(())
}

impl Registry {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, module: &Module, config_allow_override: bool) -> Result<(), BuildErrorKind> {
        for (index, Registration { key, binding, allow_override }) in module.entries.iter().enumerate() {
            validate(key, binding)?;

            let source = Source {
                module: module.name.clone(),
                index,
            };
            let id = BindingId(self.entries.len());

            if let Some(existing) = self.exact.get(key).and_then(|id| self.entries.get(id.0)) {
                if !(config_allow_override || module.allow_override || *allow_override) {
                    return Err(BuildErrorKind::DuplicateBinding {
                        key: key.clone(),
                        existing: existing.source.clone(),
                        conflicting: source,
                    });
                }
                debug!(%key, %source, "Binding overridden");
            }

            self.exact.insert(key.clone(), id);
            self.entries.push(Registered {
                key: key.clone(),
                binding: binding.clone(),
                source,
            });
        }
        Ok(())
    }

    #[must_use]
    pub(crate) fn lookup(&self, key: &BindingKey) -> Option<(BindingId, &Registered)> {
        let id = *self.exact.get(key)?;
        self.get(id).map(|registered| (id, registered))
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, id: BindingId) -> Option<&Registered> {
        self.entries.get(id.0)
    }

    /// Registrations, overridden ones included, matching the context, argument and tag of the key
    /// and providing its result type.
    pub(crate) fn candidates<'a>(&'a self, key: &BindingKey) -> impl Iterator<Item = (BindingId, &'a Registered)> + 'a {
        let key = key.clone();
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, registered)| {
                registered.key.context == key.context
                    && registered.key.argument == key.argument
                    && registered.key.tag == key.tag
                    && registered.binding.provides(key.result)
            })
            .map(|(index, registered)| (BindingId(index), registered))
    }

    /// Active keys with the same result type as `key`, for error reports.
    #[must_use]
    pub(crate) fn similar(&self, key: &BindingKey) -> Vec<BindingKey> {
        self.active()
            .filter(|(_, registered)| registered.key.result == key.result && registered.key != *key)
            .map(|(_, registered)| registered.key.clone())
            .collect()
    }

    /// Registrations not replaced by a later override, in registration order.
    pub(crate) fn active(&self) -> impl Iterator<Item = (BindingId, &Registered)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, registered)| (BindingId(index), registered))
            .filter(move |(id, registered)| self.exact.get(&registered.key) == Some(id))
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Module, Registry};
    use crate::{
        any::TypeToken, binding::Binding, errors::BuildErrorKind, factory, instance, multiton, provider, singleton,
        BindingKey, InstantiateErrorKind,
    };

    use std::sync::Arc;

    trait Animal: Send + Sync {}

    struct Dog;
    struct Cat;
    struct Session;

    impl Animal for Dog {}
    impl Animal for Cat {}

    fn binding_of<T: Send + Sync + 'static>(value: T) -> Binding {
        instance(value).into_parts().1
    }

    #[test]
    fn test_duplicate_binding() {
        let mut registry = Registry::new();
        registry
            .register(&Module::new("first").bind(instance(Dog)), false)
            .unwrap();

        let err = registry
            .register(&Module::new("second").bind(instance(Dog)), false)
            .unwrap_err();
        match err {
            BuildErrorKind::DuplicateBinding {
                key,
                existing,
                conflicting,
            } => {
                assert_eq!(key, BindingKey::of::<Dog>());
                assert_eq!(existing.module, "first");
                assert_eq!(conflicting.module, "second");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_override_keeps_both_entries() {
        let mut registry = Registry::new();
        registry
            .register(&Module::new("first").bind(instance(Dog)), false)
            .unwrap();
        registry
            .register(&Module::new("second").bind(instance(Dog).overriding()), false)
            .unwrap();

        let (id, registered) = registry.lookup(&BindingKey::of::<Dog>()).unwrap();
        assert_eq!(registered.source.module, "second");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.candidates(&BindingKey::of::<Dog>()).count(), 2);
        assert_eq!(registry.active().map(|(id, _)| id).collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_candidates_in_registration_order() {
        let mut registry = Registry::new();
        registry
            .register(
                &Module::new("animals")
                    .bind(instance(Dog).upcast::<dyn Animal>(|dog| dog))
                    .bind(instance(1_u8))
                    .bind(instance(Cat).upcast::<dyn Animal>(|cat| cat))
                    .bind(instance(Cat).tagged("other").upcast::<dyn Animal>(|cat| cat)),
                false,
            )
            .unwrap();

        let key = BindingKey::of::<dyn Animal>();
        let results: Vec<_> = registry
            .candidates(&key)
            .map(|(_, registered)| registered.key.result)
            .collect();

        assert_eq!(results, vec![TypeToken::of::<Dog>(), TypeToken::of::<Cat>()]);
        assert_eq!(registry.candidates(&BindingKey::of::<String>()).count(), 0);
    }

    #[test]
    fn test_validation() {
        let build = |module: Module| Registry::new().register(&module, false);

        let err = build(Module::new("m").register(BindingKey::of::<Cat>(), binding_of(Dog), false)).unwrap_err();
        assert!(matches!(err, BuildErrorKind::KeyMismatch { .. }));

        let err = build(Module::new("m").bind(provider(|| Ok::<_, InstantiateErrorKind>(Dog)).scoped::<Session>()))
            .unwrap_err();
        assert!(matches!(err, BuildErrorKind::UnsupportedOption { option: "scoped", .. }));

        let err = build(Module::new("m").bind(instance(Dog).finalizer(|_: Arc<Dog>| Ok(())))).unwrap_err();
        assert!(matches!(err, BuildErrorKind::UnsupportedOption { option: "finalizer", .. }));

        let err = build(
            Module::new("m").bind(multiton(|value: u8| Ok::<_, InstantiateErrorKind>(value)).eager()),
        )
        .unwrap_err();
        assert!(matches!(err, BuildErrorKind::UnsupportedOption { option: "eager", .. }));

        let (key, mut binding, _) = factory(|value: u8| Ok::<_, InstantiateErrorKind>(value)).into_parts();
        binding.kind = crate::BindingKind::Singleton;
        let err = build(Module::new("m").register(key, binding, false)).unwrap_err();
        assert!(matches!(err, BuildErrorKind::SingletonWithArgument { .. }));

        let (_, binding, _) = singleton(|| Ok::<_, InstantiateErrorKind>(Dog)).scoped::<Session>().into_parts();
        let err = build(Module::new("m").register(BindingKey::of::<Dog>(), binding, false)).unwrap_err();
        assert!(matches!(err, BuildErrorKind::ScopeContextMismatch { .. }));

        let (_, binding, _) = instance(Dog).upcast::<dyn Animal>(|dog| dog).into_parts();
        assert!(build(Module::new("m").register(BindingKey::of::<dyn Animal>(), binding, false)).is_ok());
    }
}
