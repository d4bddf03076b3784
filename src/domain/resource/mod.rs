// ============================================================================
// Resource Domain - Addresses and Payment Methods
// ============================================================================
//
// Both are user-owned lists where exactly one entry is the default that new
// orders pre-select. The list logic is written once in `collection` and
// shared through the `Resource` trait.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod collection;

pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use collection::*;
