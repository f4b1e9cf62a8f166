use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::dispatch::{CommandDispatcher, DispatchError, TransitionTransport};
use crate::domain::order::{Order, OrderStatus, PickupCode, TransitionActor};
use crate::messaging::{StatusChannel, Subscription, Topic};
use crate::metrics::Metrics;
use crate::models::{Ack, Notification};
use crate::store::{ClientOrderStore, QueueView};

// ============================================================================
// Viewer Sessions
// ============================================================================
//
// A session is the explicit per-viewer context that owns a Client Order
// Store, the subscription handles for the topics it watches, and the
// dispatcher it submits transitions through. Lifecycle is tied to the
// viewer session, not to any UI component: subscriptions close when the
// session closes.
//
// Bootstrap discipline: fetch the snapshot first, seed the store, then
// subscribe - a fresh subscription carries no backlog, so deltas are only
// trusted once a baseline is established.
//
// In-flight network calls are not cancelled on close; every continuation
// checks the liveness flag before touching the store.
//
// ============================================================================

struct SessionCore {
    store: Arc<Mutex<ClientOrderStore>>,
    notifications: Arc<std::sync::Mutex<Vec<Notification>>>,
    alive: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl SessionCore {
    /// Spawn the event pump: ingests channel events into the store until
    /// the session closes. Close is immediate - queued events that were not
    /// yet handled are dropped with the subscription.
    fn start(store: Arc<Mutex<ClientOrderStore>>, mut subscription: Subscription) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        let pump_store = Arc::clone(&store);
        let pump_alive = Arc::clone(&alive);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        subscription.close();
                        break;
                    }
                    event = subscription.recv() => {
                        let Some(event) = event else { break };
                        if !pump_alive.load(Ordering::SeqCst) {
                            break;
                        }
                        pump_store.lock().await.ingest(&event);
                    }
                }
            }
            tracing::debug!("Session event pump stopped");
        });

        Self {
            store,
            notifications: Arc::new(std::sync::Mutex::new(Vec::new())),
            alive,
            close_tx: Some(close_tx),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn notify(&self, order_id: Option<Uuid>, message: String) {
        tracing::warn!(?order_id, %message, "Surfacing notification");
        self.notifications
            .lock()
            .unwrap()
            .push(Notification::new(order_id, message));
    }

    fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn dismiss(&self, id: Uuid) {
        self.notifications.lock().unwrap().retain(|n| n.id != id);
    }

    fn close(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Vendor Queue Session
// ============================================================================

pub struct VendorSession {
    vendor_id: Uuid,
    core: SessionCore,
    dispatcher: CommandDispatcher,
    metrics: Arc<Metrics>,
}

impl VendorSession {
    pub async fn start(
        vendor_id: Uuid,
        channel: StatusChannel,
        transport: Arc<dyn TransitionTransport>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, DispatchError> {
        let snapshot = transport.fetch_vendor_orders(vendor_id).await?;
        tracing::info!(
            vendor_id = %vendor_id,
            orders = snapshot.len(),
            "Vendor session baseline fetched"
        );

        let mut store = ClientOrderStore::new();
        store.seed(snapshot);
        let store = Arc::new(Mutex::new(store));

        let subscription = channel.subscribe(Topic::Vendor(vendor_id));
        let core = SessionCore::start(Arc::clone(&store), subscription);
        let dispatcher = CommandDispatcher::new(transport, channel, vendor_id);

        Ok(Self {
            vendor_id,
            core,
            dispatcher,
            metrics,
        })
    }

    /// Request a status transition: optimistic apply, then dispatch; on
    /// failure the store reverts to last-known-good and a notification is
    /// raised.
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<(), DispatchError> {
        let (current, token) = {
            let mut store = self.core.store.lock().await;
            let current = store
                .get(order_id)
                .ok_or_else(|| DispatchError::NotFound(order_id.to_string()))?
                .status;

            if !current.can_transition(target) {
                let err = DispatchError::InvalidTransition {
                    from: current,
                    to: target,
                };
                // No-op with explanation; nothing was mutated.
                self.core.notify(Some(order_id), err.to_string());
                return Err(err);
            }

            let token = store
                .apply_optimistic(order_id, target)
                .map_err(|e| DispatchError::NotFound(e.to_string()))?;
            (current, token)
        };

        let outcome = self
            .dispatcher
            .request_transition(order_id, current, target, TransitionActor::Vendor(self.vendor_id))
            .await;

        // The session may have been torn down while the call was in flight.
        if !self.core.is_alive() {
            return outcome.map(|_| ());
        }

        match outcome {
            Ok(Ack::Confirmed(_)) => {
                self.core.store.lock().await.confirm(token);
                Ok(())
            }
            Ok(Ack::Accepted) => {
                // The broadcast event clears the pending baseline on ingest.
                Ok(())
            }
            Err(e) => {
                self.core.store.lock().await.rollback(token);
                self.metrics.optimistic_rollbacks.inc();
                self.core
                    .notify(Some(order_id), format!("Could not update order: {}", e));
                Err(e)
            }
        }
    }

    pub async fn queue_view(&self) -> QueueView {
        self.core.store.lock().await.queue_view()
    }

    pub async fn order(&self, order_id: Uuid) -> Option<Order> {
        self.core.store.lock().await.get(order_id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.core.notifications()
    }

    pub fn dismiss(&self, notification_id: Uuid) {
        self.core.dismiss(notification_id)
    }

    pub fn close(&mut self) {
        tracing::info!(vendor_id = %self.vendor_id, "Vendor session closing");
        self.core.close();
    }
}

// ============================================================================
// Customer Tracker Session
// ============================================================================

/// Tracks exactly one order via its public pickup code. Never sees, and
/// cannot subscribe to, another customer's orders.
pub struct TrackerSession {
    order_id: Uuid,
    pickup_code: PickupCode,
    core: SessionCore,
    transport: Arc<dyn TransitionTransport>,
}

impl std::fmt::Debug for TrackerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSession")
            .field("order_id", &self.order_id)
            .field("pickup_code", &self.pickup_code)
            .finish_non_exhaustive()
    }
}

impl TrackerSession {
    pub async fn start(
        pickup_code: PickupCode,
        channel: StatusChannel,
        transport: Arc<dyn TransitionTransport>,
    ) -> Result<Self, DispatchError> {
        let order = transport.fetch_order(&pickup_code).await?;
        let order_id = order.id;
        tracing::info!(
            pickup_code = %pickup_code,
            status = %order.status,
            "Tracker session baseline fetched"
        );

        let mut store = ClientOrderStore::new();
        store.seed(vec![order]);
        let store = Arc::new(Mutex::new(store));

        let subscription = channel.subscribe(Topic::Order(pickup_code.clone()));
        let core = SessionCore::start(Arc::clone(&store), subscription);

        Ok(Self {
            order_id,
            pickup_code,
            core,
            transport,
        })
    }

    pub async fn order(&self) -> Option<Order> {
        self.core.store.lock().await.get(self.order_id).cloned()
    }

    pub async fn status(&self) -> Option<OrderStatus> {
        self.order().await.map(|o| o.status)
    }

    /// QR-driven completion. Out-of-band relative to the vendor queue, but
    /// still validated by the server's state machine.
    pub async fn complete_pickup(&self) -> Result<Order, DispatchError> {
        let result = self.transport.complete_pickup(&self.pickup_code).await;

        if let Err(ref e) = result {
            if self.core.is_alive() {
                self.core
                    .notify(Some(self.order_id), format!("Pickup failed: {}", e));
            }
        }
        result
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.core.notifications()
    }

    pub fn close(&mut self) {
        tracing::info!(pickup_code = %self.pickup_code, "Tracker session closing");
        self.core.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
