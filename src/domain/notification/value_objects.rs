use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::order::{short_reference, OrderEvent};
use crate::kernel::EventEnvelope;

// ============================================================================
// Notification Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Promotion,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Order => "order",
            NotificationKind::Promotion => "promotion",
            NotificationKind::System => "system",
        }
    }

    /// Unrecognized kinds are shown as system messages
    pub fn parse(raw: &str) -> Self {
        match raw {
            "order" => NotificationKind::Order,
            "promotion" => NotificationKind::Promotion,
            _ => NotificationKind::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification content before the backend stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
}

impl NewNotification {
    /// Notification the user gets for an order event, if any
    ///
    /// Status changes are announced by the backend, not by this client.
    pub fn for_order_event(envelope: &EventEnvelope<OrderEvent>) -> Option<Self> {
        let reference = short_reference(envelope.aggregate_id);

        let (title, message) = match &envelope.event_data {
            OrderEvent::Placed(_) => (
                "Order Placed",
                format!("Your order {} has been placed successfully.", reference),
            ),
            OrderEvent::Cancelled(_) => (
                "Order Cancelled",
                format!("Your order {} has been cancelled.", reference),
            ),
            OrderEvent::StatusChanged(_) => return None,
        };

        Some(Self {
            title: title.to_string(),
            message,
            kind: NotificationKind::Order,
            related_id: Some(envelope.aggregate_id),
            related_type: Some("order".to_string()),
        })
    }
}
