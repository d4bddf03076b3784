// ============================================================================
// Domain Kernel - Generic Abstractions
// ============================================================================
//
// Reusable pieces shared by every aggregate in src/domain/:
// - Aggregate trait (command → events → state)
// - Event envelope and DomainEvent trait
//
// No laundry-specific code lives here.
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope};
