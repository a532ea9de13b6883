use crate::{errors::ResolveErrorKind, resolver::Resolver};

/// A producer parameter that can be resolved from the container.
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error>;
}

impl DependencyResolver for Resolver {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        Ok(resolver.clone())
    }
}

/// Resolves to `None` when the dependency has no binding.
impl<Dep: DependencyResolver> DependencyResolver for Option<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        match Dep::resolve(resolver).map_err(Into::<ResolveErrorKind>::into) {
            Ok(dependency) => Ok(Some(dependency)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(resolver).map_err(Into::<ResolveErrorKind>::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    use super::DependencyResolver;
    use crate::{instance, Container, Inject, Module};

    struct Name(&'static str);
    struct Missing;

    #[test]
    fn test_tuple_resolves_each_dependency() {
        let container = Container::new([Module::new("names").bind(instance(Name("rex"))).bind(instance(3_u8))]).unwrap();

        let (Inject(name), Inject(count)) = <(Inject<Name>, Inject<u8>)>::resolve(&container.resolver()).unwrap();

        assert_eq!(name.0, "rex");
        assert_eq!(*count, 3);
    }

    #[test]
    fn test_optional_dependency() {
        let container = Container::new([Module::new("names").bind(instance(Name("rex")))]).unwrap();
        let resolver = container.resolver();

        assert!(<Option<Inject<Name>>>::resolve(&resolver).unwrap().is_some());
        assert!(<Option<Inject<Missing>>>::resolve(&resolver).unwrap().is_none());
        assert!(<(Inject<Name>, Inject<Missing>)>::resolve(&resolver).is_err());
    }
}
