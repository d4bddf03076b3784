use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::catalog::{Service, TimeSlot};
use crate::domain::notification::{NewNotification, Notification};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::resource::{Address, PaymentMethod, Resource, ResourceUpdate};
use super::{
    CancelOutcome, CatalogRepository, NotificationRepository, OrderRepository, PersistenceError, ResourceRepository,
};

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// Behaves like the hosted backend as far as the stores can tell: rows are
// scoped per user, inserts/updates that make a row default unset the others,
// deleting the default promotes another row.
//
// Tests can make the next call of a named operation fail with `fail_next`.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryState {
    addresses: HashMap<Uuid, Vec<Address>>,
    payment_methods: HashMap<Uuid, Vec<PaymentMethod>>,
    orders: Vec<Order>,
    notifications: Vec<Notification>,
    services: Vec<Service>,
    time_slots: Vec<TimeSlot>,
}

/// Gives the generic resource impl access to the right table
pub trait MemoryTable: Resource {
    fn table(state: &mut MemoryState) -> &mut HashMap<Uuid, Vec<Self>>;
}

impl MemoryTable for Address {
    fn table(state: &mut MemoryState) -> &mut HashMap<Uuid, Vec<Self>> {
        &mut state.addresses
    }
}

impl MemoryTable for PaymentMethod {
    fn table(state: &mut MemoryState) -> &mut HashMap<Uuid, Vec<Self>> {
        &mut state.payment_methods
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    failures: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(services: Vec<Service>, time_slots: Vec<TimeSlot>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                services,
                time_slots,
                ..MemoryState::default()
            }),
            ..Self::default()
        }
    }

    /// Make the next call to `operation` (e.g. "address.insert") fail
    pub async fn fail_next(&self, operation: impl Into<String>, message: impl Into<String>) {
        self.failures.lock().await.insert(operation.into(), message.into());
    }

    /// Number of repository calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Overwrite an order's status the way the backend's workers would
    pub async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| PersistenceError::new(format!("Order not found: {}", order_id)))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn enter(&self, operation: &str) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failures.lock().await.remove(operation) {
            tracing::debug!(operation, "Injected backend failure");
            return Err(PersistenceError::new(message));
        }
        Ok(())
    }
}

fn default_first<R: Resource>(rows: &[R]) -> Vec<R> {
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|r| !r.is_default());
    sorted
}

// ============================================================================
// Resource Tables
// ============================================================================

#[async_trait]
impl<R: MemoryTable> ResourceRepository<R> for InMemoryBackend {
    async fn list(&self, user_id: Uuid) -> Result<Vec<R>, PersistenceError> {
        self.enter(&format!("{}.list", R::KIND)).await?;

        let mut state = self.state.lock().await;
        let rows = R::table(&mut state).get(&user_id).map(|rows| default_first(rows));
        Ok(rows.unwrap_or_default())
    }

    async fn insert(&self, user_id: Uuid, mut draft: R::Draft) -> Result<R, PersistenceError> {
        self.enter(&format!("{}.insert", R::KIND)).await?;

        let mut state = self.state.lock().await;
        let rows = R::table(&mut state).entry(user_id).or_default();

        if rows.is_empty() {
            R::mark_draft_default(&mut draft);
        }
        if R::draft_is_default(&draft) {
            for row in rows.iter_mut() {
                row.set_default(false);
            }
        }

        let resource = R::from_draft(Uuid::new_v4(), draft);
        rows.push(resource.clone());
        Ok(resource)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, update: &R::Update) -> Result<R, PersistenceError> {
        self.enter(&format!("{}.update", R::KIND)).await?;

        let mut state = self.state.lock().await;
        let rows = R::table(&mut state).entry(user_id).or_default();
        let index = rows
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| PersistenceError::new(format!("{} not found: {}", R::KIND, id)))?;

        if update.makes_default() {
            for row in rows.iter_mut() {
                row.set_default(false);
            }
        }

        rows[index].apply_update(update);
        Ok(rows[index].clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Uuid>, PersistenceError> {
        self.enter(&format!("{}.delete", R::KIND)).await?;

        let mut state = self.state.lock().await;
        let rows = R::table(&mut state).entry(user_id).or_default();
        let index = rows
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| PersistenceError::new(format!("{} not found: {}", R::KIND, id)))?;

        // rows are kept in insertion order, so the first one is the oldest
        let removed = rows.remove(index);
        if !removed.is_default() {
            return Ok(None);
        }
        Ok(rows.first_mut().map(|oldest| {
            oldest.set_default(true);
            oldest.id()
        }))
    }
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for InMemoryBackend {
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, PersistenceError> {
        self.enter("order.list").await?;

        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, PersistenceError> {
        self.enter("order.find").await?;

        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError> {
        self.enter("order.insert").await?;

        let mut state = self.state.lock().await;
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(PersistenceError::new(format!("Order already exists: {}", order.id)));
        }
        state.orders.push(order.clone());
        Ok(())
    }

    async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<CancelOutcome, PersistenceError> {
        self.enter("order.cancel").await?;

        let mut state = self.state.lock().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .ok_or_else(|| PersistenceError::new("Order not found or does not belong to the user"))?;

        if !order.status.is_cancellable() {
            return Ok(CancelOutcome::Refused { current: order.status.clone() });
        }
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(CancelOutcome::Cancelled)
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[async_trait]
impl NotificationRepository for InMemoryBackend {
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, PersistenceError> {
        self.enter("notification.list").await?;

        let state = self.state.lock().await;
        let mut items: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn insert_notification(
        &self,
        user_id: Uuid,
        notification: NewNotification,
    ) -> Result<Notification, PersistenceError> {
        self.enter("notification.insert").await?;

        let stored = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            read: false,
            related_id: notification.related_id,
            related_type: notification.related_type,
            created_at: Utc::now(),
        };
        self.state.lock().await.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        self.enter("notification.mark_read").await?;

        let mut state = self.state.lock().await;
        for n in state.notifications.iter_mut().filter(|n| n.id == id && n.user_id == user_id) {
            n.read = true;
        }
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), PersistenceError> {
        self.enter("notification.mark_all_read").await?;

        let mut state = self.state.lock().await;
        for n in state.notifications.iter_mut().filter(|n| n.user_id == user_id) {
            n.read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        self.enter("notification.delete").await?;

        self.state
            .lock()
            .await
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(())
    }

    async fn clear_notifications(&self, user_id: Uuid) -> Result<(), PersistenceError> {
        self.enter("notification.clear").await?;

        self.state.lock().await.notifications.retain(|n| n.user_id != user_id);
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for InMemoryBackend {
    async fn list_services(&self) -> Result<Vec<Service>, PersistenceError> {
        self.enter("catalog.services").await?;
        Ok(self.state.lock().await.services.clone())
    }

    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, PersistenceError> {
        self.enter("catalog.time_slots").await?;
        Ok(self.state.lock().await.time_slots.clone())
    }
}
