use core::{cell::RefCell, marker::PhantomData};
use tracing::warn;

use crate::{container::ContainerId, context::ContextId, errors::ResolveErrorKind, key::BindingKey, registry::BindingId};

struct Frame {
    container: ContainerId,
    binding: BindingId,
    context: ContextId,
    key: BindingKey,
}

impl Frame {
    #[inline]
    fn is_same(&self, container: ContainerId, binding: BindingId, context: ContextId) -> bool {
        self.container == container && self.binding == binding && self.context == context
    }
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Marks a binding as being constructed on the current thread until dropped.
///
/// Entering a binding already under construction for the same container and context is a dependency loop.
pub(crate) struct LoopGuard {
    _not_send: PhantomData<*const ()>,
}

impl LoopGuard {
    pub(crate) fn enter(
        container: ContainerId,
        binding: BindingId,
        key: &BindingKey,
        context: ContextId,
    ) -> Result<Self, ResolveErrorKind> {
        STACK.with_borrow_mut(|stack| {
            if let Some(position) = stack
                .iter()
                .position(|frame| frame.is_same(container, binding, context))
            {
                let cycle: Vec<_> = stack[position..]
                    .iter()
                    .filter(|frame| frame.container == container)
                    .map(|frame| frame.key.clone())
                    .chain([key.clone()])
                    .collect();

                let err = ResolveErrorKind::DependencyLoop { cycle };
                warn!("{}", err);
                return Err(err);
            }

            stack.push(Frame {
                container,
                binding,
                context,
                key: key.clone(),
            });
            Ok(Self { _not_send: PhantomData })
        })
    }

    #[cfg(test)]
    pub(crate) fn depth() -> usize {
        STACK.with_borrow(Vec::len)
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        // Guards are dropped in reverse order of creation, so the top frame is ours.
        let _ = STACK.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
