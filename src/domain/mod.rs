// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own module:
// - catalog       services and pickup/delivery windows
// - resource      addresses and payment methods (single-default lists)
// - order         draft assembly and the submitted order lifecycle
// - notification  the user's notification feed
//
// Nothing here talks to the backend; that is src/stores/.
//
// ============================================================================

pub mod catalog;
pub mod resource;
pub mod order;
pub mod notification;
