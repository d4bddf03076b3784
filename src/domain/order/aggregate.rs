use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::kernel::Aggregate;
use super::commands::OrderCommand;
use super::draft::CompletedDraft;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{LineItem, OrderStatus, PaymentDetails, PaymentStatus, Schedule};

// ============================================================================
// Order Aggregate - a submitted order
// ============================================================================
//
// Line items and total are fixed at placement. Only `status` (and
// `updated_at`) ever change afterwards.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub user_id: Uuid,

    // Contents (immutable after placement)
    pub line_items: Vec<LineItem>,
    pub pickup: Schedule,
    pub delivery: Schedule,
    pub payment: PaymentDetails,
    pub special_instructions: Option<String>,
    pub total_amount: f64,

    // Lifecycle
    pub status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Turn a validated draft into a pending order
    pub fn place(id: Uuid, user_id: Uuid, draft: CompletedDraft, now: DateTime<Utc>) -> (Self, OrderEvent) {
        let event = OrderEvent::Placed(OrderPlaced {
            user_id,
            total_amount: draft.total_amount,
            line_item_count: draft.line_items.len(),
            placed_at: now,
        });

        let order = Self {
            id,
            user_id,
            line_items: draft.line_items,
            pickup: draft.pickup,
            delivery: draft.delivery,
            payment: PaymentDetails {
                method: draft.payment_method,
                status: PaymentStatus::Pending,
            },
            special_instructions: draft.special_instructions,
            total_amount: draft.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        (order, event)
    }

    /// Short reference shown to users, e.g. "#1a2b3c4d"
    pub fn reference(&self) -> String {
        short_reference(self.id)
    }

    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(LineItem::quantity).sum()
    }
}

pub fn short_reference(order_id: Uuid) -> String {
    let simple = order_id.simple().to_string();
    format!("#{}", &simple[..8])
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Placed(_) => {
                // Placement builds the order; nothing left to apply
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to.clone();
                self.updated_at = e.changed_at;
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = e.cancelled_at;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CancelOrder => {
                if !self.status.is_cancellable() {
                    return Err(OrderError::InvalidStateTransition {
                        from: self.status.clone(),
                        to: OrderStatus::Cancelled,
                    });
                }

                Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                    previous: self.status.clone(),
                    cancelled_at: Utc::now(),
                })])
            }

            OrderCommand::AdvanceStatus { to } => {
                if *to == OrderStatus::Cancelled {
                    return self.handle_command(&OrderCommand::CancelOrder);
                }

                if !self.status.can_transition_to(to) {
                    return Err(OrderError::InvalidStateTransition {
                        from: self.status.clone(),
                        to: to.clone(),
                    });
                }

                Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
                    from: self.status.clone(),
                    to: to.clone(),
                    changed_at: Utc::now(),
                })])
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderDraft;
    use crate::domain::resource::{Address, PaymentMethod, PaymentMethodKind};
    use crate::domain::order::value_objects::STATUS_SEQUENCE;
    use chrono::NaiveDate;

    fn completed_draft() -> CompletedDraft {
        let address = Address {
            id: Uuid::new_v4(),
            label: "Home".to_string(),
            street: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            zip_code: "560001".to_string(),
            is_default: true,
        };
        let mut draft = OrderDraft::new();
        draft.add_line_item(Uuid::new_v4(), "Wash & Fold", 3, 50.0).unwrap();
        draft.add_line_item(Uuid::new_v4(), "Dry Clean", 1, 200.0).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        draft.set_pickup(address.clone(), day, "09:00 - 11:00");
        draft.set_delivery(address, day, "17:00 - 19:00");
        draft.set_payment_method(PaymentMethod {
            id: Uuid::new_v4(),
            kind: PaymentMethodKind::Paypal,
            last_four: None,
            card_brand: None,
            expiry: None,
            is_default: true,
        });
        draft.validate().unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let (mut order, _) = Order::place(Uuid::new_v4(), Uuid::new_v4(), completed_draft(), Utc::now());
        order.status = status;
        order
    }

    #[test]
    fn test_place_creates_pending_order() {
        let user_id = Uuid::new_v4();
        let (order, event) = Order::place(Uuid::new_v4(), user_id, completed_draft(), Utc::now());

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, 350.0);
        assert_eq!(order.item_count(), 4);
        assert_eq!(order.payment.status, PaymentStatus::Pending);
        match event {
            OrderEvent::Placed(e) => {
                assert_eq!(e.user_id, user_id);
                assert_eq!(e.line_item_count, 2);
            }
            _ => panic!("Expected OrderPlaced"),
        }
    }

    #[test]
    fn test_cancel_pending_and_confirmed() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed] {
            let mut order = order_in(status);
            let total = order.total_amount;
            let events = order.execute(&OrderCommand::CancelOrder).unwrap();

            assert_eq!(events.len(), 1);
            assert_eq!(order.status, OrderStatus::Cancelled);
            assert_eq!(order.total_amount, total);
        }
    }

    #[test]
    fn test_cancel_after_pickup_fails() {
        for status in [
            OrderStatus::PickedUp,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Unknown("on_hold".to_string()),
        ] {
            let mut order = order_in(status.clone());
            let result = order.execute(&OrderCommand::CancelOrder);

            assert_eq!(
                result.unwrap_err(),
                OrderError::InvalidStateTransition {
                    from: status.clone(),
                    to: OrderStatus::Cancelled,
                }
            );
            assert_eq!(order.status, status);
        }
    }

    #[test]
    fn test_advance_through_full_lifecycle() {
        let mut order = order_in(OrderStatus::Pending);

        for next in STATUS_SEQUENCE.iter().skip(1) {
            order
                .execute(&OrderCommand::AdvanceStatus { to: next.clone() })
                .unwrap();
            assert_eq!(&order.status, next);
        }

        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_advance_cannot_skip_steps() {
        let mut order = order_in(OrderStatus::Confirmed);
        let result = order.execute(&OrderCommand::AdvanceStatus {
            to: OrderStatus::Delivered,
        });

        assert!(matches!(result, Err(OrderError::InvalidStateTransition { .. })));
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_advance_to_cancelled_uses_cancel_rules() {
        let mut order = order_in(OrderStatus::Processing);
        let result = order.execute(&OrderCommand::AdvanceStatus {
            to: OrderStatus::Cancelled,
        });
        assert!(result.is_err());

        let mut order = order_in(OrderStatus::Pending);
        order
            .execute(&OrderCommand::AdvanceStatus { to: OrderStatus::Cancelled })
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_short_reference() {
        let order = order_in(OrderStatus::Pending);
        let reference = order.reference();
        assert_eq!(reference.len(), 9);
        assert!(reference.starts_with('#'));
        assert!(order.id.to_string().starts_with(&reference[1..]));
    }
}
