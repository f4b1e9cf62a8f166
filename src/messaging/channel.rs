use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::metrics::Metrics;
use crate::models::{StatusEvent, TransitionCommand};
use crate::utils::{BreakerConfig, BreakerState, CircuitBreaker};

use super::topic::Topic;

// ============================================================================
// Status Channel - publish/subscribe fan-out for status events
// ============================================================================
//
// In-process broker with a per-topic subscriber registry. Each subscriber
// gets its own unbounded FIFO queue, and publishes for one topic are
// committed under the registry lock in server commit order, so ordering
// within a single topic is guaranteed. No ordering across topics, no
// replay: a fresh subscription starts empty.
//
// The publish paths are guarded by a circuit breaker. When the transport is
// down (or the breaker is open), publish and publish_command fail with a
// distinguishable ChannelError so the dispatcher can surface the failure
// and roll back. subscribe never fails: the registration is local and
// handlers start receiving once the transport is live again.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("status channel transport unavailable")]
    TransportUnavailable,
}

type SubscriberId = u64;

struct Registry {
    topics: HashMap<Topic, Vec<(SubscriberId, mpsc::UnboundedSender<StatusEvent>)>>,
    command_sink: Option<mpsc::UnboundedSender<TransitionCommand>>,
    next_id: SubscriberId,
    available: bool,
}

struct Inner {
    registry: Mutex<Registry>,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

#[derive(Clone)]
pub struct StatusChannel {
    inner: Arc<Inner>,
}

impl StatusChannel {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self::with_breaker(metrics, BreakerConfig::default())
    }

    pub fn with_breaker(metrics: Arc<Metrics>, config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry {
                    topics: HashMap::new(),
                    command_sink: None,
                    next_id: 1,
                    available: true,
                }),
                breaker: CircuitBreaker::new(config),
                metrics,
            }),
        }
    }

    /// Register a subscriber for a topic. Never fails, even while the
    /// transport is unavailable; events flow once it is back.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut registry = self.inner.registry.lock().unwrap();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.topics.entry(topic.clone()).or_default().push((id, tx));
            id
        };

        tracing::debug!(topic = %topic, subscriber = id, "Subscribed");

        Subscription {
            id,
            topic,
            receiver: rx,
            channel: Arc::clone(&self.inner),
            closed: false,
        }
    }

    /// Publish a status event to every connected subscriber of `topic`.
    /// Returns the number of live subscribers the event was delivered to.
    pub fn publish(&self, topic: &Topic, event: StatusEvent) -> Result<usize, ChannelError> {
        self.guard_transport("event")?;

        let delivered = {
            let mut registry = self.inner.registry.lock().unwrap();
            match registry.topics.get_mut(topic) {
                Some(subscribers) => {
                    // At-most-once: a dead receiver is pruned, not retried.
                    subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
                    subscribers.len()
                }
                None => 0,
            }
        };

        self.inner.breaker.record_success();
        self.sync_breaker_gauge();
        self.inner.metrics.record_publish(topic.scope(), delivered);
        tracing::debug!(
            topic = %topic,
            event_id = %event.event_id,
            order_id = %event.order.id,
            status = %event.order.status,
            delivered,
            "Published status event"
        );

        Ok(delivered)
    }

    /// Take ownership of the fire-and-forget command destination. The order
    /// service calls this once at startup and drains the receiver.
    pub fn register_command_sink(&self) -> mpsc::UnboundedReceiver<TransitionCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.inner.registry.lock().unwrap();
        registry.command_sink = Some(tx);
        rx
    }

    /// Publish a transition command to the command destination. No direct
    /// response; confirmation arrives via the broadcast event.
    pub fn publish_command(&self, command: TransitionCommand) -> Result<(), ChannelError> {
        self.guard_transport("command")?;

        let sent = {
            let registry = self.inner.registry.lock().unwrap();
            match &registry.command_sink {
                Some(sink) => sink.send(command.clone()).is_ok(),
                None => false,
            }
        };

        if !sent {
            if self.inner.breaker.record_failure() {
                self.inner.metrics.breaker_trips.inc();
            }
            self.inner.metrics.publish_failures.with_label_values(&["command"]).inc();
            self.sync_breaker_gauge();
            tracing::error!(
                order_id = %command.order_id,
                "Command destination unreachable"
            );
            return Err(ChannelError::TransportUnavailable);
        }

        self.inner.breaker.record_success();
        self.sync_breaker_gauge();
        self.inner.metrics.commands_published.inc();
        tracing::debug!(
            order_id = %command.order_id,
            new_status = %command.new_status,
            "Published transition command"
        );
        Ok(())
    }

    /// Mark the transport up or down. Down publishes fail fast and feed the
    /// circuit breaker.
    pub fn set_available(&self, available: bool) {
        let mut registry = self.inner.registry.lock().unwrap();
        registry.available = available;
        tracing::info!(available, "Status channel transport availability changed");
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.inner.breaker.state()
    }

    fn guard_transport(&self, path: &str) -> Result<(), ChannelError> {
        let available = self.inner.registry.lock().unwrap().available;
        if !available {
            if self.inner.breaker.record_failure() {
                self.inner.metrics.breaker_trips.inc();
            }
            self.inner.metrics.publish_failures.with_label_values(&[path]).inc();
            self.sync_breaker_gauge();
            return Err(ChannelError::TransportUnavailable);
        }
        if !self.inner.breaker.allow_request() {
            self.inner.metrics.publish_failures.with_label_values(&[path]).inc();
            tracing::error!(path, "Circuit breaker open - status channel unavailable");
            return Err(ChannelError::TransportUnavailable);
        }
        Ok(())
    }

    fn sync_breaker_gauge(&self) {
        let state = match self.inner.breaker.state() {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        };
        self.inner.metrics.update_breaker_state(state);
    }

    fn unsubscribe(inner: &Inner, topic: &Topic, id: SubscriberId) {
        let mut registry = inner.registry.lock().unwrap();
        if let Some(subscribers) = registry.topics.get_mut(topic) {
            subscribers.retain(|(sub_id, _)| *sub_id != id);
            if subscribers.is_empty() {
                registry.topics.remove(topic);
            }
        }
        tracing::debug!(topic = %topic, subscriber = id, "Unsubscribed");
    }
}

// ============================================================================
// Subscription Handle
// ============================================================================

/// Owned subscription handle. Closing (or dropping) it is immediate:
/// queued events that were not yet handled are discarded.
pub struct Subscription {
    id: SubscriberId,
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<StatusEvent>,
    channel: Arc<Inner>,
    closed: bool,
}

impl Subscription {
    /// Next event on this topic, in server commit order. Returns None after
    /// close().
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        if self.closed {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            StatusChannel::unsubscribe(&self.channel, &self.topic, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
