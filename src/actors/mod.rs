// ============================================================================
// Actors Module
// ============================================================================
//
// Server-side runtime: the order service actor is the server of record for
// all orders. Client-side code (sessions, store) never mutates an order
// directly; it talks to this actor over the transport seam or the command
// destination.
//
// ============================================================================

mod order_service;

pub use order_service::{
    CompletePickup, GetOrder, GetVendorOrders, OrderServiceActor, PlaceOrder, ServiceError,
    SubmitTransition,
};
