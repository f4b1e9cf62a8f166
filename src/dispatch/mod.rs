use std::sync::Arc;

use actix::MailboxError;
use async_trait::async_trait;
use uuid::Uuid;

use crate::actors::{
    CompletePickup, GetOrder, GetVendorOrders, OrderServiceActor, ServiceError, SubmitTransition,
};
use crate::domain::order::{Order, OrderError, OrderStatus, PickupCode, TransitionActor};
use crate::messaging::StatusChannel;
use crate::models::{Ack, TransitionCommand, TransitionRequest};

// ============================================================================
// Command Dispatcher
// ============================================================================
//
// Decides, per transition, whether the change goes over the synchronous
// request/response call or the fire-and-forget publish channel:
//
// - Transitions OUT OF Placed (accept or reject of a brand-new order) go
//   request/response. This is the highest-stakes decision point and the
//   customer is actively waiting, so the vendor gets an immediate
//   authoritative confirmation.
// - Every other transition is fire-and-forget; the originating actor
//   already owns the order, and the broadcast event confirms eventually.
//
// Failures on either path are surfaced to the caller for rollback. Nothing
// is retried automatically: a retried transition could double-submit a
// state change whose side effects (customer notification) already fired.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("transport unavailable")]
    TransportUnavailable,

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("transition rejected by server: {0}")]
    Rejected(String),
}

impl From<ServiceError> for DispatchError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(id) => DispatchError::NotFound(id.to_string()),
            ServiceError::UnknownPickupCode(code) => DispatchError::NotFound(code.to_string()),
            ServiceError::Order(OrderError::InvalidTransition { from, to }) => {
                DispatchError::InvalidTransition { from, to }
            }
            ServiceError::Order(other) => DispatchError::Rejected(other.to_string()),
        }
    }
}

/// Request/response and snapshot surface of the server of record. A trait
/// seam so sessions and the dispatcher are testable against a mock server.
#[async_trait]
pub trait TransitionTransport: Send + Sync {
    /// Synchronous transition submission; returns the updated Order.
    async fn submit(&self, request: TransitionRequest) -> Result<Order, DispatchError>;

    /// Snapshot read of all orders for a vendor.
    async fn fetch_vendor_orders(&self, vendor_id: Uuid) -> Result<Vec<Order>, DispatchError>;

    /// Snapshot read of a single order by its public identifier.
    async fn fetch_order(&self, code: &PickupCode) -> Result<Order, DispatchError>;

    /// QR-driven completion: resolves the public identifier and submits
    /// ReadyForPickup -> Completed through the same validator.
    async fn complete_pickup(&self, code: &PickupCode) -> Result<Order, DispatchError>;
}

pub struct CommandDispatcher {
    transport: Arc<dyn TransitionTransport>,
    channel: StatusChannel,
    vendor_id: Uuid,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn TransitionTransport>, channel: StatusChannel, vendor_id: Uuid) -> Self {
        Self {
            transport,
            channel,
            vendor_id,
        }
    }

    pub async fn request_transition(
        &self,
        order_id: Uuid,
        current: OrderStatus,
        target: OrderStatus,
        actor: TransitionActor,
    ) -> Result<Ack, DispatchError> {
        if !current.can_transition(target) {
            return Err(DispatchError::InvalidTransition {
                from: current,
                to: target,
            });
        }

        if current == OrderStatus::Placed {
            // Accept/reject of a new order needs an authoritative answer now.
            let order = self
                .transport
                .submit(TransitionRequest {
                    order_id,
                    new_status: target,
                    vendor_id: self.vendor_id,
                })
                .await?;
            tracing::info!(
                order_id = %order_id,
                status = %order.status,
                "Transition confirmed synchronously"
            );
            Ok(Ack::Confirmed(order))
        } else {
            self.channel
                .publish_command(TransitionCommand {
                    order_id,
                    new_status: target,
                    vendor_id: self.vendor_id,
                    actor,
                })
                .map_err(|_| DispatchError::TransportUnavailable)?;
            tracing::info!(
                order_id = %order_id,
                target = %target,
                "Transition command published, awaiting broadcast confirmation"
            );
            Ok(Ack::Accepted)
        }
    }
}

// ============================================================================
// Actor-backed transport
// ============================================================================

/// Adapts the order service actor's mailbox to the transport seam. A dead
/// or saturated mailbox surfaces as TransportUnavailable.
pub struct ActorTransport {
    service: actix::Addr<OrderServiceActor>,
}

impl ActorTransport {
    pub fn new(service: actix::Addr<OrderServiceActor>) -> Self {
        Self { service }
    }

    fn mailbox(_: MailboxError) -> DispatchError {
        DispatchError::TransportUnavailable
    }
}

#[async_trait]
impl TransitionTransport for ActorTransport {
    async fn submit(&self, request: TransitionRequest) -> Result<Order, DispatchError> {
        let result = self
            .service
            .send(SubmitTransition {
                order_id: request.order_id,
                new_status: request.new_status,
                actor: TransitionActor::Vendor(request.vendor_id),
            })
            .await
            .map_err(Self::mailbox)?;
        result.map_err(DispatchError::from)
    }

    async fn fetch_vendor_orders(&self, vendor_id: Uuid) -> Result<Vec<Order>, DispatchError> {
        let result = self
            .service
            .send(GetVendorOrders { vendor_id })
            .await
            .map_err(Self::mailbox)?;
        result.map_err(DispatchError::from)
    }

    async fn fetch_order(&self, code: &PickupCode) -> Result<Order, DispatchError> {
        let result = self
            .service
            .send(GetOrder {
                pickup_code: code.clone(),
            })
            .await
            .map_err(Self::mailbox)?;
        result.map_err(DispatchError::from)
    }

    async fn complete_pickup(&self, code: &PickupCode) -> Result<Order, DispatchError> {
        let result = self
            .service
            .send(CompletePickup {
                pickup_code: code.clone(),
            })
            .await
            .map_err(Self::mailbox)?;
        result.map_err(DispatchError::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::testing::MockTransport;

    fn channel() -> StatusChannel {
        StatusChannel::new(Arc::new(Metrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_illegal_edge_fails_before_any_transport_call() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = CommandDispatcher::new(transport.clone(), channel(), Uuid::new_v4());

        let err = dispatcher
            .request_transition(
                Uuid::new_v4(),
                OrderStatus::Completed,
                OrderStatus::Placed,
                TransitionActor::Customer,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
        assert_eq!(transport.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_placed_goes_request_response() {
        let transport = Arc::new(MockTransport::new());
        let order = crate::testing::sample_order(Uuid::new_v4(), OrderStatus::Preparing);
        transport.stage_submit_ok(order.clone());

        let dispatcher =
            CommandDispatcher::new(transport.clone(), channel(), order.vendor_id);
        let ack = dispatcher
            .request_transition(
                order.id,
                OrderStatus::Placed,
                OrderStatus::Preparing,
                TransitionActor::Vendor(order.vendor_id),
            )
            .await
            .unwrap();

        match ack {
            Ack::Confirmed(confirmed) => assert_eq!(confirmed.status, OrderStatus::Preparing),
            Ack::Accepted => panic!("accept/reject must be confirmed synchronously"),
        }
        assert_eq!(transport.submit_calls(), 1);
    }

    #[tokio::test]
    async fn test_later_edges_go_fire_and_forget() {
        let transport = Arc::new(MockTransport::new());
        let channel = channel();
        let mut sink = channel.register_command_sink();
        let vendor_id = Uuid::new_v4();
        let dispatcher = CommandDispatcher::new(transport.clone(), channel, vendor_id);
        let order_id = Uuid::new_v4();

        let ack = dispatcher
            .request_transition(
                order_id,
                OrderStatus::Preparing,
                OrderStatus::ReadyForPickup,
                TransitionActor::Vendor(vendor_id),
            )
            .await
            .unwrap();

        assert!(matches!(ack, Ack::Accepted));
        assert_eq!(transport.submit_calls(), 0);
        let cmd = sink.recv().await.unwrap();
        assert_eq!(cmd.order_id, order_id);
        assert_eq!(cmd.new_status, OrderStatus::ReadyForPickup);
    }

    #[tokio::test]
    async fn test_publish_failure_is_surfaced_not_retried() {
        let transport = Arc::new(MockTransport::new());
        let channel = channel();
        // No command sink registered: the transport is unreachable.
        let dispatcher = CommandDispatcher::new(transport, channel, Uuid::new_v4());

        let err = dispatcher
            .request_transition(
                Uuid::new_v4(),
                OrderStatus::ReadyForPickup,
                OrderStatus::Completed,
                TransitionActor::PickupScan,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TransportUnavailable));
    }

    #[tokio::test]
    async fn test_request_response_failure_is_surfaced() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next_submit();

        let dispatcher = CommandDispatcher::new(transport.clone(), channel(), Uuid::new_v4());
        let err = dispatcher
            .request_transition(
                Uuid::new_v4(),
                OrderStatus::Placed,
                OrderStatus::Rejected,
                TransitionActor::Vendor(Uuid::new_v4()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TransportUnavailable));
        // Exactly one attempt: no automatic retry.
        assert_eq!(transport.submit_calls(), 1);
    }
}
