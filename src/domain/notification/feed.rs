use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::Notification;

// ============================================================================
// Notification Feed
// ============================================================================

/// The user's notifications, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationFeed {
    items: Vec<Notification>,
}

impl NotificationFeed {
    pub fn new(mut items: Vec<Notification>) -> Self {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { items }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// New notifications go to the top
    pub fn push(&mut self, notification: Notification) {
        self.items.insert(0, notification);
    }

    pub fn mark_read(&mut self, id: Uuid) {
        if let Some(n) = self.items.iter_mut().find(|n| n.id == id) {
            n.read = true;
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in self.items.iter_mut() {
            n.read = true;
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        self.items.retain(|n| n.id != id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::{NewNotification, NotificationKind};
    use crate::domain::order::{OrderCancelled, OrderEvent, OrderStatus, OrderStatusChanged};
    use crate::kernel::EventEnvelope;
    use chrono::{Duration, Utc};

    fn notification(minutes_ago: i64, read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Weekend offer".to_string(),
            message: "20% off dry cleaning".to_string(),
            kind: NotificationKind::Promotion,
            read,
            related_id: None,
            related_type: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_feed_sorted_newest_first() {
        let old = notification(60, false);
        let new = notification(1, false);
        let feed = NotificationFeed::new(vec![old.clone(), new.clone()]);

        assert_eq!(feed.items()[0].id, new.id);
        assert_eq!(feed.items()[1].id, old.id);
    }

    #[test]
    fn test_unread_count_tracks_mutations() {
        let a = notification(3, false);
        let b = notification(2, false);
        let c = notification(1, true);
        let mut feed = NotificationFeed::new(vec![a.clone(), b.clone(), c]);
        assert_eq!(feed.unread_count(), 2);

        feed.mark_read(a.id);
        assert_eq!(feed.unread_count(), 1);

        feed.remove(b.id);
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.len(), 2);

        feed.clear();
        assert!(feed.is_empty());
    }

    #[test]
    fn test_order_event_notifications() {
        let order_id = Uuid::new_v4();
        let cancelled = EventEnvelope::new(
            order_id,
            OrderEvent::Cancelled(OrderCancelled {
                previous: OrderStatus::Pending,
                cancelled_at: Utc::now(),
            }),
        );

        let new = NewNotification::for_order_event(&cancelled).unwrap();
        assert_eq!(new.title, "Order Cancelled");
        assert!(new.message.contains(&order_id.simple().to_string()[..8]));
        assert_eq!(new.related_id, Some(order_id));
        assert_eq!(new.kind, NotificationKind::Order);

        let changed = EventEnvelope::new(
            order_id,
            OrderEvent::StatusChanged(OrderStatusChanged {
                from: OrderStatus::Pending,
                to: OrderStatus::Confirmed,
                changed_at: Utc::now(),
            }),
        );
        assert!(NewNotification::for_order_event(&changed).is_none());
    }
}
