use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::notification::NewNotification;
use crate::domain::order::{
    DraftStage, Order, OrderCommand, OrderDraft, OrderError, OrderEvent, OrderStatus,
};
use crate::domain::resource::{Address, PaymentMethod};
use crate::kernel::{Aggregate, EventEnvelope};
use crate::metrics::Metrics;
use crate::persistence::{CancelOutcome, OrderRepository};
use crate::session::SessionHandle;
use super::error::StoreError;
use super::notification::NotificationStore;
use super::state::{Snapshot, StateCell};

const STORE: &str = "order";

// ============================================================================
// Order Store - the draft being assembled and the user's submitted orders
// ============================================================================
//
// Draft edits are local and synchronous. Placement, cancellation and fetches
// go to the backend.
//
// Notifications for placed/cancelled orders are best-effort: a failure is
// logged and counted, never returned.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    /// Newest first
    pub orders: Vec<Order>,
    pub draft: OrderDraft,
}

pub struct OrderStore {
    backend: Arc<dyn OrderRepository>,
    notifications: Arc<NotificationStore>,
    session: SessionHandle,
    metrics: Arc<Metrics>,
    state: StateCell<OrderState>,
}

impl OrderStore {
    pub fn new(
        backend: Arc<dyn OrderRepository>,
        notifications: Arc<NotificationStore>,
        session: SessionHandle,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            backend,
            notifications,
            session,
            metrics,
            state: StateCell::new(STORE),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<OrderState>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<OrderState> {
        self.state.snapshot()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.read(|s| s.orders.clone())
    }

    pub fn draft(&self) -> OrderDraft {
        self.state.read(|s| s.draft.clone())
    }

    pub fn restore(&self, saved: Snapshot<OrderState>) -> bool {
        self.state.restore(saved)
    }

    pub fn clear(&self) {
        self.state.clear();
    }

    // ========================================================================
    // Draft
    // ========================================================================

    pub fn add_line_item(
        &self,
        service_id: Uuid,
        service_name: impl Into<String>,
        quantity: i32,
        unit_price: f64,
    ) -> Result<(), StoreError> {
        let service_name = service_name.into();
        self.edit_draft("add_line_item", |draft| {
            draft.add_line_item(service_id, service_name, quantity, unit_price)
        })
    }

    pub fn set_line_item_quantity(&self, service_id: Uuid, quantity: i32) -> Result<(), StoreError> {
        self.edit_draft("set_line_item_quantity", |draft| {
            draft.set_line_item_quantity(service_id, quantity)
        })
    }

    pub fn remove_line_item(&self, service_id: Uuid) -> Result<(), StoreError> {
        self.edit_draft("remove_line_item", |draft| {
            draft.remove_line_item(service_id);
            Ok(())
        })
    }

    pub fn set_pickup(&self, address: Address, date: NaiveDate, time_slot: impl Into<String>) -> Result<(), StoreError> {
        let time_slot = time_slot.into();
        self.edit_draft("set_pickup", |draft| {
            draft.set_pickup(address, date, time_slot);
            Ok(())
        })
    }

    pub fn set_delivery(&self, address: Address, date: NaiveDate, time_slot: impl Into<String>) -> Result<(), StoreError> {
        let time_slot = time_slot.into();
        self.edit_draft("set_delivery", |draft| {
            draft.set_delivery(address, date, time_slot);
            Ok(())
        })
    }

    pub fn set_payment_method(&self, method: PaymentMethod) -> Result<(), StoreError> {
        self.edit_draft("set_payment_method", |draft| {
            draft.set_payment_method(method);
            Ok(())
        })
    }

    pub fn set_special_instructions(&self, text: impl Into<String>) -> Result<(), StoreError> {
        let text = text.into();
        self.edit_draft("set_special_instructions", |draft| {
            draft.set_special_instructions(text);
            Ok(())
        })
    }

    pub fn calculate_total(&self) -> f64 {
        self.state.read(|s| s.draft.calculate_total())
    }

    pub fn stage(&self) -> DraftStage {
        self.state.read(|s| s.draft.stage())
    }

    pub fn reset_draft(&self) {
        // reset cannot fail
        let _ = self.edit_draft("reset_draft", |draft| {
            draft.reset();
            Ok(())
        });
    }

    fn edit_draft(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut OrderDraft) -> Result<(), OrderError>,
    ) -> Result<(), StoreError> {
        match self.state.edit(|state| apply(&mut state.draft)) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.state.refuse(&self.metrics, operation, err.into())),
        }
    }

    // ========================================================================
    // Submitted Orders
    // ========================================================================

    /// Validate the draft, persist it as a pending order, reset the draft
    pub async fn place_order(&self) -> Result<Order, StoreError> {
        let user_id = self.require_user("place_order")?;
        let completed = self
            .state
            .read(|s| s.draft.validate())
            .map_err(|err| self.state.refuse(&self.metrics, "place_order", err.into()))?;

        let ticket = self.state.begin();
        let (order, event) = Order::place(Uuid::new_v4(), user_id, completed, Utc::now());

        let result = async {
            self.backend.insert_order(&order).await?;

            self.state.commit(ticket, |state| {
                state.orders.insert(0, order.clone());
                state.draft.reset();
                Ok::<_, StoreError>(())
            })?;
            Ok::<_, StoreError>(())
        }
        .await;
        self.state.settle(&self.metrics, "place_order", ticket, result)?;

        tracing::info!(
            order_id = %order.id,
            %user_id,
            total_amount = order.total_amount,
            line_items = order.line_items.len(),
            "Order placed"
        );
        self.metrics.record_order_placed(order.total_amount);

        self.announce(EventEnvelope::new(order.id, event).with_user(user_id)).await;
        Ok(order)
    }

    /// Cancel a pending or confirmed order
    ///
    /// The backend re-checks the stored status. When it has already moved on,
    /// the local copy takes the stored status and the cancel is refused.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        let user_id = self.require_user("cancel_order")?;
        let (order, events) = self
            .local_order(order_id)
            .and_then(|order| {
                let events = order.handle_command(&OrderCommand::CancelOrder)?;
                Ok((order, events))
            })
            .map_err(|err| self.state.refuse(&self.metrics, "cancel_order", err.into()))?;

        let ticket = self.state.begin();

        let result = async {
            match self.backend.cancel_order(user_id, order_id).await? {
                CancelOutcome::Cancelled => Ok::<_, StoreError>(self.apply_events(ticket, order, &events)?),
                CancelOutcome::Refused { current } => {
                    tracing::warn!(order_id = %order_id, status = %current, "Backend refused cancel");
                    self.state.commit(ticket, |state| {
                        if let Some(stored) = state.orders.iter_mut().find(|o| o.id == order_id) {
                            stored.status = current.clone();
                            stored.updated_at = Utc::now();
                        }
                        Ok::<_, StoreError>(())
                    })?;
                    Err(StoreError::from(OrderError::InvalidStateTransition {
                        from: current,
                        to: OrderStatus::Cancelled,
                    }))
                }
            }
        }
        .await;
        let updated = self.state.settle(&self.metrics, "cancel_order", ticket, result)?;

        tracing::info!(order_id = %order_id, %user_id, "Order cancelled");
        self.metrics.record_order_cancelled();

        for event in events {
            self.announce(EventEnvelope::new(order_id, event).with_user(user_id)).await;
        }
        Ok(updated)
    }

    /// Apply a status change pushed by the backend
    ///
    /// Local only; rejected when the lifecycle does not allow the move.
    pub fn advance_status(&self, order_id: Uuid, to: OrderStatus) -> Result<Order, StoreError> {
        let (order, events) = self
            .local_order(order_id)
            .and_then(|order| {
                let events = order.handle_command(&OrderCommand::AdvanceStatus { to: to.clone() })?;
                Ok((order, events))
            })
            .map_err(|err| self.state.refuse(&self.metrics, "advance_status", err.into()))?;

        let ticket = self.state.ticket();
        let updated = self
            .apply_events(ticket, order, &events)
            .map_err(|err| self.state.refuse(&self.metrics, "advance_status", err.into()))?;

        tracing::info!(order_id = %order_id, status = %updated.status, "Order status advanced");
        self.metrics.record_operation(STORE, "advance_status", true);
        Ok(updated)
    }

    pub async fn fetch_orders(&self) -> Result<Vec<Order>, StoreError> {
        let user_id = self.require_user("fetch_orders")?;
        let ticket = self.state.begin();

        let result = async {
            let orders = self.backend.list_orders(user_id).await?;
            let count = orders.len();

            let applied = self.state.commit_if_current(ticket, |state| {
                state.orders = orders;
                Ok::<_, StoreError>(())
            })?;
            if !applied {
                self.metrics.record_stale_response(STORE);
            }

            tracing::debug!(%user_id, count, applied, "Fetched orders");
            Ok::<_, StoreError>(self.orders())
        }
        .await;

        self.state.settle(&self.metrics, "fetch_orders", ticket, result)
    }

    /// Local copy if present, otherwise asks the backend
    pub async fn order_by_id(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        if let Ok(order) = self.local_order(order_id) {
            return Ok(Some(order));
        }

        let user_id = self.require_user("order_by_id")?;
        let ticket = self.state.ticket();
        let result = self
            .backend
            .find_order(user_id, order_id)
            .await
            .map_err(StoreError::from);
        self.state.settle(&self.metrics, "order_by_id", ticket, result)
    }

    /// Step on the delivery progress tracker; None for cancelled/unknown
    pub fn progress(&self, order_id: Uuid) -> Option<usize> {
        self.local_order(order_id).ok()?.status.progress_step()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require_user(&self, operation: &str) -> Result<Uuid, StoreError> {
        self.session
            .user_id()
            .ok_or_else(|| self.state.refuse(&self.metrics, operation, StoreError::NotAuthenticated))
    }

    fn local_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.state
            .read(|s| s.orders.iter().find(|o| o.id == order_id).cloned())
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Fold events into `order` and publish the result in place of the local copy
    fn apply_events(&self, ticket: u64, mut order: Order, events: &[OrderEvent]) -> Result<Order, OrderError> {
        for event in events {
            order.apply_event(event)?;
        }
        self.state.commit(ticket, |state| {
            let stored = state
                .orders
                .iter_mut()
                .find(|o| o.id == order.id)
                .ok_or(OrderError::NotFound(order.id))?;
            *stored = order.clone();
            Ok::<_, OrderError>(())
        })?;
        Ok(order)
    }

    /// Best-effort notification for an order event
    async fn announce(&self, envelope: EventEnvelope<OrderEvent>) {
        let Some(notification) = NewNotification::for_order_event(&envelope) else {
            return;
        };
        let Some(user_id) = envelope.user_id else {
            return;
        };

        if let Err(err) = self.notifications.create_for(user_id, notification).await {
            tracing::warn!(
                order_id = %envelope.aggregate_id,
                event_type = %envelope.event_type,
                error = %err,
                "Failed to create order notification"
            );
            self.metrics.record_side_effect_failure("order_notification");
        }
    }
}
