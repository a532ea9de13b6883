//! Process-wide container, for code that cannot receive one explicitly.

use parking_lot::{const_rwlock, RwLock};
use tracing::{debug, warn};

use crate::{container::Container, errors::GlobalErrorKind};

static GLOBAL: RwLock<Option<Container>> = const_rwlock(None);

/// # Errors
/// Returns [`GlobalErrorKind::AlreadyInitialized`] if a container is already set.
pub fn init(container: Container) -> Result<(), GlobalErrorKind> {
    let mut global = GLOBAL.write();
    if global.is_some() {
        let err = GlobalErrorKind::AlreadyInitialized;
        warn!("{}", err);
        return Err(err);
    }
    *global = Some(container);
    debug!("Global container initialized");
    Ok(())
}

/// # Errors
/// Returns [`GlobalErrorKind::NotInitialized`] if no container is set.
pub fn get() -> Result<Container, GlobalErrorKind> {
    GLOBAL.read().clone().ok_or(GlobalErrorKind::NotInitialized)
}

/// Removes the global container and returns it.
/// Its cached instances are released once the returned handle and all other clones are dropped.
///
/// # Errors
/// Returns [`GlobalErrorKind::NotInitialized`] if no container is set.
pub fn teardown() -> Result<Container, GlobalErrorKind> {
    let container = GLOBAL.write().take().ok_or(GlobalErrorKind::NotInitialized)?;
    debug!("Global container removed");
    Ok(container)
}
