use std::fmt;
use uuid::Uuid;

use crate::domain::order::PickupCode;

// ============================================================================
// Subscription Topics
// ============================================================================

/// Routing key for the status channel.
///
/// A vendor-scoped topic carries every status event for orders belonging to
/// that vendor; an order-scoped topic carries events for exactly one order,
/// keyed by its public pickup code so the customer tracker never needs the
/// internal id. Topics hold no state; a late subscriber misses prior events
/// and must snapshot-fetch before trusting deltas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Vendor(Uuid),
    Order(PickupCode),
}

impl Topic {
    /// Scope label, used for metrics.
    pub fn scope(&self) -> &'static str {
        match self {
            Topic::Vendor(_) => "vendor",
            Topic::Order(_) => "order",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Vendor(id) => write!(f, "vendor.{}", id),
            Topic::Order(code) => write!(f, "order.{}", code),
        }
    }
}
