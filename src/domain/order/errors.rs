use uuid::Uuid;

use super::value_objects::{MissingSection, OrderStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is incomplete: missing {0}")]
    IncompleteOrder(MissingSection),

    #[error("Cannot change order status from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid unit price: {0}")]
    InvalidUnitPrice(f64),

    #[error("Unit price for service {service_id} is {stored}, not {requested}")]
    UnitPriceMismatch {
        service_id: Uuid,
        stored: f64,
        requested: f64,
    },

    #[error("Service {0} is not in the order")]
    LineItemNotFound(Uuid),

    #[error("Order not found: {0}")]
    NotFound(Uuid),
}
