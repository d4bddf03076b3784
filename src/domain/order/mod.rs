// ============================================================================
// Order Domain - Draft assembly and submitted order lifecycle
// ============================================================================
//
// - Value objects (LineItem, Schedule, OrderStatus, ...)
// - Draft (OrderDraft, the in-progress order, and CompletedDraft)
// - Events (OrderPlaced, OrderStatusChanged, OrderCancelled)
// - Commands (CancelOrder, AdvanceStatus)
// - Errors (OrderError enum)
// - Aggregate (Order with lifecycle rules)
//
// ============================================================================

pub mod value_objects;
pub mod draft;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use draft::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
