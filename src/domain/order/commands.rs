use super::value_objects::OrderStatus;

// ============================================================================
// Order Commands - Represent user intent (or server-pushed status changes)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    CancelOrder,
    AdvanceStatus {
        to: OrderStatus,
    },
}
