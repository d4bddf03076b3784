// ============================================================================
// Notification Domain - the user's in-app notification feed
// ============================================================================

pub mod value_objects;
pub mod feed;

pub use value_objects::*;
pub use feed::*;
