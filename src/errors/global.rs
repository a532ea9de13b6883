#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalErrorKind {
    #[error("Global container is already initialized")]
    AlreadyInitialized,
    #[error("Global container is not initialized")]
    NotInitialized,
}
