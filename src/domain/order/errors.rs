use super::status::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order items cannot be empty")]
    EmptyItems,

    #[error("invalid item quantity: {0}")]
    InvalidQuantity(u32),
}

/// Raised when a status string at the wire boundary is not one of the
/// closed set of lifecycle values.
#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0:?}")]
pub struct UnknownStatus(pub String);
