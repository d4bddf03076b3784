// ============================================================================
// Stores - observable client state backed by the persistence layer
// ============================================================================
//
// - resource      addresses and payment methods
// - order         draft + submitted orders
// - catalog       services and time slots
// - notification  notification feed
//
// ============================================================================

mod error;
mod state;

pub mod catalog;
pub mod notification;
pub mod order;
pub mod resource;

pub use error::StoreError;
pub use state::{Snapshot, StateCell};

pub use catalog::{CatalogState, CatalogStore};
pub use notification::NotificationStore;
pub use order::{OrderState, OrderStore};
pub use resource::{AddressStore, PaymentMethodStore, ResourceStore};
