use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::{Service, TimeSlot};
use crate::domain::notification::{NewNotification, Notification};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::resource::Resource;

// ============================================================================
// Persistence Boundary
// ============================================================================
//
// Table-style CRUD, every call scoped to a user id. Stores only see these
// traits; the backend behind them is swappable.
//
// Implementations:
// - memory    process-local tables (tests, demo binary)
// - postgres  sqlx over the relational schema
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{InMemoryBackend, MemoryTable};
pub use postgres::PostgresBackend;

/// Backend call failed; carries the backend's human-readable message
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct PersistenceError {
    pub message: String,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CRUD for one kind of single-default resource
#[async_trait]
pub trait ResourceRepository<R: Resource>: Send + Sync {
    /// All of the user's entries, default first
    async fn list(&self, user_id: Uuid) -> Result<Vec<R>, PersistenceError>;

    /// Store a new entry; unsets other defaults when the new one is default
    async fn insert(&self, user_id: Uuid, draft: R::Draft) -> Result<R, PersistenceError>;

    async fn update(&self, user_id: Uuid, id: Uuid, update: &R::Update) -> Result<R, PersistenceError>;

    /// Remove an entry; returns the entry promoted to default, if any
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Uuid>, PersistenceError>;
}

/// What the backend found when asked to cancel an order
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled,
    /// The stored order had already left pending/confirmed
    Refused { current: OrderStatus },
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Newest first
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, PersistenceError>;

    async fn find_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, PersistenceError>;

    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError>;

    /// Cancel only while the stored status is pending or confirmed
    async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<CancelOutcome, PersistenceError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, PersistenceError>;

    async fn insert_notification(
        &self,
        user_id: Uuid,
        notification: NewNotification,
    ) -> Result<Notification, PersistenceError>;

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), PersistenceError>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError>;

    async fn clear_notifications(&self, user_id: Uuid) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active services only
    async fn list_services(&self) -> Result<Vec<Service>, PersistenceError>;

    /// Active time slots only
    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, PersistenceError>;
}

/// Everything a full client needs from one backend
pub trait Backend:
    ResourceRepository<crate::domain::resource::Address>
    + ResourceRepository<crate::domain::resource::PaymentMethod>
    + OrderRepository
    + NotificationRepository
    + CatalogRepository
    + Send
    + Sync
{
}

impl<T> Backend for T where
    T: ResourceRepository<crate::domain::resource::Address>
        + ResourceRepository<crate::domain::resource::PaymentMethod>
        + OrderRepository
        + NotificationRepository
        + CatalogRepository
        + Send
        + Sync
{
}
