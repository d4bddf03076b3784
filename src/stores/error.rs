use crate::domain::order::OrderError;
use crate::domain::resource::ResourceError;
use crate::persistence::PersistenceError;

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No signed-in user; raised before any backend call
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}
