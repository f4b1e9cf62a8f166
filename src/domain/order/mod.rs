// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (LineItem, Customer, PickupCode, TransitionActor)
// - Status state machine (OrderStatus + the legal transition table)
// - Errors (OrderError enum)
// - Aggregate (Order with snapshot line items and transition logic)
//
// The state machine is the single authority on which status changes are
// legal. Actor authorization (who may request a transition) is deliberately
// out of scope here.
//
// ============================================================================

pub mod errors;
pub mod order;
pub mod status;
pub mod value_objects;

// Re-export for convenience
pub use errors::*;
pub use order::*;
pub use status::*;
pub use value_objects::*;
