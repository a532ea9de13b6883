use std::sync::Arc;

use crate::{
    any::ErasedValue,
    service::{service_fn, BoxCloneService},
};

/// Release hook of a cached instance, run once when its owner context is closed.
pub trait Finalizer<Dep: ?Sized>: Clone + Send + Sync + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>) -> anyhow::Result<()>;
}

impl<F, Dep> Finalizer<Dep> for F
where
    Dep: ?Sized,
    F: FnMut(Arc<Dep>) -> anyhow::Result<()> + Clone + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) -> anyhow::Result<()> {
        self(dependency)
    }
}

pub(crate) type BoxedCloneFinalizer = BoxCloneService<ErasedValue, (), anyhow::Error>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(mut finalizer: Fin) -> BoxedCloneFinalizer
where
    Dep: ?Sized + Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    BoxCloneService::new(service_fn(move |value: ErasedValue| -> anyhow::Result<()> {
        let Some(dependency) = value.downcast_ref::<Arc<Dep>>().cloned() else {
            anyhow::bail!("Cached value is not {}", core::any::type_name::<Dep>());
        };
        finalizer.finalize(dependency)
    }))
}

#[cfg(test)]
mod tests {
    use super::boxed_finalizer_factory;
    use crate::{any::ErasedValue, service::Service as _};

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    struct Connection(u8);

    #[test]
    fn test_finalizer_receives_value() {
        let finalized = Arc::new(AtomicU8::new(0));
        let mut finalizer = boxed_finalizer_factory({
            let finalized = finalized.clone();
            move |connection: Arc<Connection>| {
                finalized.store(connection.0, Ordering::SeqCst);
                Ok(())
            }
        });

        let value: ErasedValue = Arc::new(Arc::new(Connection(5)));
        finalizer.call(value).unwrap();

        assert_eq!(finalized.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_finalizer_rejects_other_type() {
        let mut finalizer = boxed_finalizer_factory(|_: Arc<Connection>| Ok(()));

        let value: ErasedValue = Arc::new(Arc::new(1_u8));
        assert!(finalizer.call(value).is_err());
    }
}
