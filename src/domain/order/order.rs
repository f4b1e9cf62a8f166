use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::status::OrderStatus;
use super::value_objects::{Customer, LineItem, PickupCode, TransitionActor};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The server is the sole authority over an Order; every client copy is a
// read-through replica that is advisory until confirmed by a server event
// or response. After creation the only mutable field is `status` (plus the
// server-assigned event timestamp stamped alongside it). Line items and the
// total are a snapshot taken at placement time for price integrity.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub pickup_code: PickupCode,

    // Parties - immutable after creation
    pub customer: Customer,
    pub vendor_id: Uuid,
    pub shop_id: Uuid,

    // Snapshot line items - never recomputed from live product data
    pub items: Vec<LineItem>,
    pub total_cents: i64,

    // Lifecycle
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub estimated_ready_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in `Placed`. Called from the checkout flow, which
    /// is an external collaborator of this core.
    pub fn place(
        customer: Customer,
        vendor_id: Uuid,
        shop_id: Uuid,
        items: Vec<LineItem>,
        prep_estimate: Duration,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity(item.quantity));
            }
        }

        let total_cents = items.iter().map(LineItem::line_total_cents).sum();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            pickup_code: PickupCode::generate(),
            customer,
            vendor_id,
            shop_id,
            items,
            total_cents,
            status: OrderStatus::Placed,
            placed_at: now,
            estimated_ready_at: now + prep_estimate,
            updated_at: now,
        })
    }

    /// Apply a requested transition if the state machine allows it.
    ///
    /// On success the status mutates and the server-assigned event timestamp
    /// is stamped; nothing else changes. The actor is recorded for tracing
    /// only - authorization is checked elsewhere.
    pub fn apply_transition(
        &mut self,
        requested: OrderStatus,
        actor: TransitionActor,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition(requested) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: requested,
            });
        }

        tracing::debug!(
            order_id = %self.id,
            from = %self.status,
            to = %requested,
            actor = %actor,
            "Applying status transition"
        );

        self.status = requested;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
