use actix::prelude::*;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{
    Customer, LineItem, Order, OrderError, OrderStatus, PickupCode, TransitionActor,
};
use crate::messaging::{StatusChannel, Topic};
use crate::metrics::Metrics;
use crate::models::StatusEvent;

// ============================================================================
// Order Service Actor - server of record for the order lifecycle
// ============================================================================
//
// Owns the order collection and the pickup-code index. Every status change
// flows through the state machine here; a committed transition stamps the
// server event timestamp and is broadcast as a full-record event on BOTH
// the owning vendor's topic and the order's own topic.
//
// The actor also drains the channel's fire-and-forget command destination
// into its own mailbox, so the publish path and the request/response path
// converge on the same transition handler. Sequential message processing
// gives per-order commit ordering without locks.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("unknown pickup code: {0}")]
    UnknownPickupCode(PickupCode),

    #[error(transparent)]
    Order(#[from] OrderError),
}

// ============================================================================
// Actor Messages
// ============================================================================

/// Entry point for the checkout flow (an external collaborator of this
/// core): creates the order in Placed and announces it on the vendor topic.
#[derive(Message)]
#[rtype(result = "Result<Order, ServiceError>")]
pub struct PlaceOrder {
    pub customer: Customer,
    pub vendor_id: Uuid,
    pub shop_id: Uuid,
    pub items: Vec<LineItem>,
    pub prep_estimate: Duration,
}

#[derive(Message)]
#[rtype(result = "Result<Order, ServiceError>")]
pub struct SubmitTransition {
    pub order_id: Uuid,
    pub new_status: OrderStatus,
    pub actor: TransitionActor,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<Order>, ServiceError>")]
pub struct GetVendorOrders {
    pub vendor_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Result<Order, ServiceError>")]
pub struct GetOrder {
    pub pickup_code: PickupCode,
}

/// QR-driven completion: the scanned code carries the public identifier
/// and triggers ReadyForPickup -> Completed through the same validator.
#[derive(Message)]
#[rtype(result = "Result<Order, ServiceError>")]
pub struct CompletePickup {
    pub pickup_code: PickupCode,
}

// ============================================================================
// Actor
// ============================================================================

pub struct OrderServiceActor {
    channel: StatusChannel,
    metrics: Arc<Metrics>,
    orders: HashMap<Uuid, Order>,
    by_code: HashMap<PickupCode, Uuid>,
}

impl OrderServiceActor {
    pub fn new(channel: StatusChannel, metrics: Arc<Metrics>) -> Self {
        Self {
            channel,
            metrics,
            orders: HashMap::new(),
            by_code: HashMap::new(),
        }
    }

    fn commit_transition(
        &mut self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: TransitionActor,
    ) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(ServiceError::NotFound(order_id))?;
        let from = order.status;

        if let Err(e) = order.apply_transition(new_status, actor) {
            self.metrics
                .record_transition(from.as_str(), new_status.as_str(), false);
            tracing::warn!(
                order_id = %order_id,
                from = %from,
                to = %new_status,
                actor = %actor,
                "Transition rejected"
            );
            return Err(e.into());
        }

        self.metrics
            .record_transition(from.as_str(), new_status.as_str(), true);
        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %new_status,
            actor = %actor,
            "Transition committed"
        );

        let committed = order.clone();
        self.broadcast(StatusEvent::new(committed.clone(), actor));
        Ok(committed)
    }

    /// Fan a committed change out to both interested topics. The same event
    /// id travels on both, so a store subscribed to both converges once.
    fn broadcast(&self, event: StatusEvent) {
        let vendor_topic = Topic::Vendor(event.order.vendor_id);
        let order_topic = Topic::Order(event.order.pickup_code.clone());

        for topic in [vendor_topic, order_topic] {
            if let Err(e) = self.channel.publish(&topic, event.clone()) {
                // The transition is committed server-side; subscribers will
                // recover via a snapshot fetch on reconnect.
                tracing::error!(
                    topic = %topic,
                    order_id = %event.order.id,
                    error = %e,
                    "Failed to broadcast committed transition"
                );
            }
        }
    }
}

impl Actor for OrderServiceActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("OrderServiceActor started");

        // Drain the fire-and-forget command destination into the mailbox,
        // so published commands share the request/response transition path.
        let mut commands = self.channel.register_command_sink();
        let addr = ctx.address();
        actix::spawn(async move {
            while let Some(cmd) = commands.recv().await {
                let result = addr
                    .send(SubmitTransition {
                        order_id: cmd.order_id,
                        new_status: cmd.new_status,
                        actor: cmd.actor,
                    })
                    .await;
                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        // No response channel on this path; the rejection is
                        // only observable server-side and via metrics.
                        tracing::warn!(
                            order_id = %cmd.order_id,
                            error = %e,
                            "Published transition command rejected"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Order service mailbox closed");
                        break;
                    }
                }
            }
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!(orders = self.orders.len(), "OrderServiceActor stopped");
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<PlaceOrder> for OrderServiceActor {
    type Result = Result<Order, ServiceError>;

    fn handle(&mut self, msg: PlaceOrder, _: &mut Self::Context) -> Self::Result {
        let order = Order::place(
            msg.customer,
            msg.vendor_id,
            msg.shop_id,
            msg.items,
            msg.prep_estimate,
        )?;

        tracing::info!(
            order_id = %order.id,
            vendor_id = %order.vendor_id,
            pickup_code = %order.pickup_code,
            total_cents = order.total_cents,
            item_count = order.items.len(),
            "Order placed"
        );
        self.metrics.orders_placed.inc();

        self.by_code.insert(order.pickup_code.clone(), order.id);
        self.orders.insert(order.id, order.clone());

        // Announce on the vendor topic so a live queue sees the new order
        // without polling.
        self.broadcast(StatusEvent::new(order.clone(), TransitionActor::Customer));

        Ok(order)
    }
}

impl Handler<SubmitTransition> for OrderServiceActor {
    type Result = Result<Order, ServiceError>;

    fn handle(&mut self, msg: SubmitTransition, _: &mut Self::Context) -> Self::Result {
        self.commit_transition(msg.order_id, msg.new_status, msg.actor)
    }
}

impl Handler<GetVendorOrders> for OrderServiceActor {
    type Result = Result<Vec<Order>, ServiceError>;

    fn handle(&mut self, msg: GetVendorOrders, _: &mut Self::Context) -> Self::Result {
        self.metrics.record_snapshot_fetch("vendor");
        Ok(self
            .orders
            .values()
            .filter(|o| o.vendor_id == msg.vendor_id)
            .cloned()
            .collect())
    }
}

impl Handler<GetOrder> for OrderServiceActor {
    type Result = Result<Order, ServiceError>;

    fn handle(&mut self, msg: GetOrder, _: &mut Self::Context) -> Self::Result {
        self.metrics.record_snapshot_fetch("order");
        let order_id = self
            .by_code
            .get(&msg.pickup_code)
            .ok_or_else(|| ServiceError::UnknownPickupCode(msg.pickup_code.clone()))?;
        self.orders
            .get(order_id)
            .cloned()
            .ok_or(ServiceError::NotFound(*order_id))
    }
}

impl Handler<CompletePickup> for OrderServiceActor {
    type Result = Result<Order, ServiceError>;

    fn handle(&mut self, msg: CompletePickup, _: &mut Self::Context) -> Self::Result {
        let order_id = *self
            .by_code
            .get(&msg.pickup_code)
            .ok_or_else(|| ServiceError::UnknownPickupCode(msg.pickup_code.clone()))?;
        self.commit_transition(order_id, OrderStatus::Completed, TransitionActor::PickupScan)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransitionCommand;

    fn service() -> (Addr<OrderServiceActor>, StatusChannel) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let channel = StatusChannel::new(metrics.clone());
        let addr = OrderServiceActor::new(channel.clone(), metrics).start();
        (addr, channel)
    }

    fn place_msg(vendor_id: Uuid) -> PlaceOrder {
        PlaceOrder {
            customer: Customer {
                name: "Wei".to_string(),
                phone: "+65 8555 2222".to_string(),
                email: "wei@example.com".to_string(),
            },
            vendor_id,
            shop_id: Uuid::new_v4(),
            items: vec![LineItem {
                product_id: Uuid::new_v4(),
                name: "Hokkien Mee".to_string(),
                unit_price_cents: 700,
                quantity: 1,
                diet_flags: vec![],
            }],
            prep_estimate: Duration::minutes(20),
        }
    }

    #[actix::test]
    async fn test_place_then_accept_synchronously() {
        let (addr, _channel) = service();
        let vendor_id = Uuid::new_v4();

        let order = addr.send(place_msg(vendor_id)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Placed);

        let accepted = addr
            .send(SubmitTransition {
                order_id: order.id,
                new_status: OrderStatus::Preparing,
                actor: TransitionActor::Vendor(vendor_id),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, OrderStatus::Preparing);
        assert!(accepted.updated_at >= order.updated_at);
    }

    #[actix::test]
    async fn test_illegal_transition_rejected_and_state_unchanged() {
        let (addr, _channel) = service();
        let vendor_id = Uuid::new_v4();
        let order = addr.send(place_msg(vendor_id)).await.unwrap().unwrap();

        let err = addr
            .send(SubmitTransition {
                order_id: order.id,
                new_status: OrderStatus::Completed,
                actor: TransitionActor::Vendor(vendor_id),
            })
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Order(OrderError::InvalidTransition { .. })
        ));

        let snapshot = addr
            .send(GetVendorOrders { vendor_id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot[0].status, OrderStatus::Placed);
    }

    #[actix::test]
    async fn test_unknown_order_is_not_found() {
        let (addr, _channel) = service();
        let err = addr
            .send(SubmitTransition {
                order_id: Uuid::new_v4(),
                new_status: OrderStatus::Preparing,
                actor: TransitionActor::Customer,
            })
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix::test]
    async fn test_committed_transition_broadcasts_on_both_topics() {
        let (addr, channel) = service();
        let vendor_id = Uuid::new_v4();
        let mut vendor_sub = channel.subscribe(Topic::Vendor(vendor_id));

        let order = addr.send(place_msg(vendor_id)).await.unwrap().unwrap();
        let mut order_sub = channel.subscribe(Topic::Order(order.pickup_code.clone()));

        // Placement announcement on the vendor topic.
        assert_eq!(
            vendor_sub.recv().await.unwrap().order.status,
            OrderStatus::Placed
        );

        addr.send(SubmitTransition {
            order_id: order.id,
            new_status: OrderStatus::Preparing,
            actor: TransitionActor::Vendor(vendor_id),
        })
        .await
        .unwrap()
        .unwrap();

        let vendor_event = vendor_sub.recv().await.unwrap();
        let order_event = order_sub.recv().await.unwrap();
        assert_eq!(vendor_event.order.status, OrderStatus::Preparing);
        assert_eq!(order_event.order.status, OrderStatus::Preparing);
        assert_eq!(vendor_event.event_id, order_event.event_id);
    }

    #[actix::test]
    async fn test_command_destination_feeds_the_same_validator() {
        let (addr, channel) = service();
        let vendor_id = Uuid::new_v4();
        let order = addr.send(place_msg(vendor_id)).await.unwrap().unwrap();

        addr.send(SubmitTransition {
            order_id: order.id,
            new_status: OrderStatus::Preparing,
            actor: TransitionActor::Vendor(vendor_id),
        })
        .await
        .unwrap()
        .unwrap();

        channel
            .publish_command(TransitionCommand {
                order_id: order.id,
                new_status: OrderStatus::ReadyForPickup,
                vendor_id,
                actor: TransitionActor::Vendor(vendor_id),
            })
            .unwrap();

        // The drain task hands the command to the mailbox asynchronously.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let fetched = addr
            .send(GetOrder {
                pickup_code: order.pickup_code.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, OrderStatus::ReadyForPickup);
    }

    #[actix::test]
    async fn test_pickup_scan_completes_ready_order() {
        let (addr, _channel) = service();
        let vendor_id = Uuid::new_v4();
        let order = addr.send(place_msg(vendor_id)).await.unwrap().unwrap();

        for step in [OrderStatus::Preparing, OrderStatus::ReadyForPickup] {
            addr.send(SubmitTransition {
                order_id: order.id,
                new_status: step,
                actor: TransitionActor::Vendor(vendor_id),
            })
            .await
            .unwrap()
            .unwrap();
        }

        let completed = addr
            .send(CompletePickup {
                pickup_code: order.pickup_code.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
    }

    #[actix::test]
    async fn test_pickup_scan_on_unready_order_is_rejected() {
        let (addr, _channel) = service();
        let order = addr
            .send(place_msg(Uuid::new_v4()))
            .await
            .unwrap()
            .unwrap();

        // Still Placed: the QR path goes through the same validator.
        let err = addr
            .send(CompletePickup {
                pickup_code: order.pickup_code.clone(),
            })
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Order(OrderError::InvalidTransition { .. })
        ));
    }
}
