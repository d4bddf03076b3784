use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata side effects need (who, when, which
// aggregate). Order placement and cancellation hand an envelope to the
// notification side effect instead of the bare event.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,

    // Event Type Information
    pub event_type: String,

    // Event Payload
    pub event_data: E,

    // Actor Information
    pub user_id: Option<Uuid>,

    // Timing
    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(aggregate_id: Uuid, event_data: E) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: event_data.event_type().to_string(),
            event_data,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events name themselves for logging and envelopes
pub trait DomainEvent: Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
}
