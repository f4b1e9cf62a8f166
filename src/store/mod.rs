use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};
use crate::models::StatusEvent;

// ============================================================================
// Client Order Store
// ============================================================================
//
// In-memory, per-viewer collection of visible orders. Exclusively owned by
// one viewer context (one vendor session or one customer tracking session),
// so there are no cross-tenant races by construction.
//
// The apply/confirm/rollback discipline:
// - apply_optimistic mutates the local copy immediately and captures the
//   pre-mutation state of exactly that order. The baseline is captured at
//   the FIRST optimistic mutation; a second apply before confirm/rollback
//   keeps the original baseline, so a single rollback restores the true
//   last-known-good state.
// - ingest(event) is server truth and always wins over pending optimistic
//   state: the local copy is overwritten, not merged, and the pending
//   baseline is cleared. Re-ingesting the same event is a no-op.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} not present in store")]
    UnknownOrder(Uuid),
}

/// Opaque token returned by apply_optimistic; redeemed by confirm/rollback.
#[derive(Debug, Clone)]
pub struct SnapshotToken {
    order_id: Uuid,
}

struct Entry {
    order: Order,
    /// Monotonic arrival index, used for deterministic view ordering.
    arrival: u64,
    /// Pre-mutation state of a pending optimistic change, if any.
    baseline: Option<Order>,
    /// Last ingested event, for idempotent re-delivery.
    last_event: Option<Uuid>,
}

#[derive(Default)]
pub struct ClientOrderStore {
    orders: HashMap<Uuid, Entry>,
    next_arrival: u64,
}

impl ClientOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the store contents with a freshly fetched snapshot. Required
    /// after every (re)subscription before trusting channel deltas.
    pub fn seed(&mut self, orders: Vec<Order>) {
        self.orders.clear();
        self.next_arrival = 0;
        for order in orders {
            let arrival = self.next_arrival;
            self.next_arrival += 1;
            self.orders.insert(
                order.id,
                Entry {
                    order,
                    arrival,
                    baseline: None,
                    last_event: None,
                },
            );
        }
    }

    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.get(&order_id).map(|e| &e.order)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Mutate the local copy immediately, ahead of server confirmation.
    pub fn apply_optimistic(
        &mut self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<SnapshotToken, StoreError> {
        let entry = self
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::UnknownOrder(order_id))?;

        // Keep the original baseline across stacked optimistic mutations.
        if entry.baseline.is_none() {
            entry.baseline = Some(entry.order.clone());
        }

        tracing::debug!(
            order_id = %order_id,
            from = %entry.order.status,
            to = %new_status,
            "Optimistic status applied"
        );
        entry.order.status = new_status;

        Ok(SnapshotToken { order_id })
    }

    /// Drop the rollback baseline after the server confirmed the change.
    pub fn confirm(&mut self, token: SnapshotToken) {
        if let Some(entry) = self.orders.get_mut(&token.order_id) {
            entry.baseline = None;
        }
    }

    /// Restore the pre-mutation state captured by apply_optimistic.
    pub fn rollback(&mut self, token: SnapshotToken) {
        if let Some(entry) = self.orders.get_mut(&token.order_id) {
            if let Some(baseline) = entry.baseline.take() {
                tracing::debug!(
                    order_id = %token.order_id,
                    restored = %baseline.status,
                    "Optimistic status rolled back"
                );
                entry.order = baseline;
            }
        }
    }

    /// Apply a server-originated event. Server truth supersedes any pending
    /// optimistic guess for the same order. Unknown orders are inserted:
    /// that is how a live vendor queue learns about new orders.
    pub fn ingest(&mut self, event: &StatusEvent) {
        match self.orders.get_mut(&event.order.id) {
            Some(entry) => {
                if entry.last_event == Some(event.event_id) {
                    return;
                }
                entry.order = event.order.clone();
                entry.baseline = None;
                entry.last_event = Some(event.event_id);
            }
            None => {
                let arrival = self.next_arrival;
                self.next_arrival += 1;
                self.orders.insert(
                    event.order.id,
                    Entry {
                        order: event.order.clone(),
                        arrival,
                        baseline: None,
                        last_event: Some(event.event_id),
                    },
                );
            }
        }
        tracing::debug!(
            order_id = %event.order.id,
            status = %event.order.status,
            event_id = %event.event_id,
            "Ingested status event"
        );
    }

    /// Deterministic grouped view for the vendor queue: Placed orders
    /// newest-placed-first, the other buckets in arrival order, with
    /// Completed and Rejected merged as historical.
    pub fn queue_view(&self) -> QueueView {
        let mut placed: Vec<(&Entry, &Order)> = Vec::new();
        let mut preparing: Vec<(&Entry, &Order)> = Vec::new();
        let mut ready: Vec<(&Entry, &Order)> = Vec::new();
        let mut historical: Vec<(&Entry, &Order)> = Vec::new();

        for entry in self.orders.values() {
            let slot = match entry.order.status {
                OrderStatus::Placed => &mut placed,
                OrderStatus::Preparing => &mut preparing,
                OrderStatus::ReadyForPickup => &mut ready,
                OrderStatus::Completed | OrderStatus::Rejected => &mut historical,
            };
            slot.push((entry, &entry.order));
        }

        placed.sort_by(|(ea, a), (eb, b)| {
            b.placed_at
                .cmp(&a.placed_at)
                .then_with(|| ea.arrival.cmp(&eb.arrival))
        });
        for bucket in [&mut preparing, &mut ready, &mut historical] {
            bucket.sort_by_key(|(entry, _)| entry.arrival);
        }

        QueueView {
            placed: placed.into_iter().map(|(_, o)| o.clone()).collect(),
            preparing: preparing.into_iter().map(|(_, o)| o.clone()).collect(),
            ready: ready.into_iter().map(|(_, o)| o.clone()).collect(),
            historical: historical.into_iter().map(|(_, o)| o.clone()).collect(),
        }
    }
}

/// Status-bucketed snapshot of the store, ready to render.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub placed: Vec<Order>,
    pub preparing: Vec<Order>,
    pub ready: Vec<Order>,
    pub historical: Vec<Order>,
}

// ============================================================================
// Tests
// ============================================================================
