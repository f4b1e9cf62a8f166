use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::dispatch::{DispatchError, TransitionTransport};
use crate::domain::order::{
    Customer, LineItem, Order, OrderStatus, PickupCode, TransitionActor,
};
use crate::models::TransitionRequest;

// ============================================================================
// Test Support - in-memory stand-ins for the server of record
// ============================================================================
//
// MockTransport implements the TransitionTransport seam entirely in memory,
// so dispatcher and session logic is tested without spawning the service
// actor. Responses are staged per call; an unstaged submit fails NotFound.
//
// ============================================================================

#[derive(Default)]
pub struct MockTransport {
    submit_calls: AtomicUsize,
    staged_submits: Mutex<VecDeque<Result<Order, DispatchError>>>,
    vendor_snapshot: Mutex<Vec<Order>>,
    by_code: Mutex<HashMap<PickupCode, Order>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_submit_ok(&self, order: Order) {
        self.staged_submits.lock().unwrap().push_back(Ok(order));
    }

    pub fn fail_next_submit(&self) {
        self.staged_submits
            .lock()
            .unwrap()
            .push_back(Err(DispatchError::TransportUnavailable));
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn set_vendor_snapshot(&self, orders: Vec<Order>) {
        *self.vendor_snapshot.lock().unwrap() = orders;
    }

    pub fn insert_order(&self, order: Order) {
        self.by_code
            .lock()
            .unwrap()
            .insert(order.pickup_code.clone(), order);
    }
}

#[async_trait]
impl TransitionTransport for MockTransport {
    async fn submit(&self, request: TransitionRequest) -> Result<Order, DispatchError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.staged_submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(DispatchError::NotFound(request.order_id.to_string())))
    }

    async fn fetch_vendor_orders(&self, _vendor_id: Uuid) -> Result<Vec<Order>, DispatchError> {
        Ok(self.vendor_snapshot.lock().unwrap().clone())
    }

    async fn fetch_order(&self, code: &PickupCode) -> Result<Order, DispatchError> {
        self.by_code
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(code.to_string()))
    }

    async fn complete_pickup(&self, code: &PickupCode) -> Result<Order, DispatchError> {
        let mut by_code = self.by_code.lock().unwrap();
        let order = by_code
            .get_mut(code)
            .ok_or_else(|| DispatchError::NotFound(code.to_string()))?;
        order
            .apply_transition(OrderStatus::Completed, TransitionActor::PickupScan)
            .map_err(|e| DispatchError::Rejected(e.to_string()))?;
        Ok(order.clone())
    }
}

/// An order in the given status, walked there through the state machine.
pub fn sample_order(vendor_id: Uuid, status: OrderStatus) -> Order {
    let mut order = Order::place(
        Customer {
            name: "Siti".to_string(),
            phone: "+65 9123 0000".to_string(),
            email: "siti@example.com".to_string(),
        },
        vendor_id,
        Uuid::new_v4(),
        vec![LineItem {
            product_id: Uuid::new_v4(),
            name: "Char Kway Teow".to_string(),
            unit_price_cents: 600,
            quantity: 1,
            diet_flags: vec![],
        }],
        Duration::minutes(15),
    )
    .unwrap();

    let actor = TransitionActor::Vendor(vendor_id);
    let path: &[OrderStatus] = match status {
        OrderStatus::Placed => &[],
        OrderStatus::Preparing => &[OrderStatus::Preparing],
        OrderStatus::ReadyForPickup => &[OrderStatus::Preparing, OrderStatus::ReadyForPickup],
        OrderStatus::Completed => &[
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup,
            OrderStatus::Completed,
        ],
        OrderStatus::Rejected => &[OrderStatus::Rejected],
    };
    for step in path {
        order.apply_transition(*step, actor).unwrap();
    }
    order
}
