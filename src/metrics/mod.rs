// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Status transitions (applied / rejected, by edge)
// - Channel fan-out (events published and delivered, by topic scope)
// - Fire-and-forget command publishes and publish failures
// - Client-side optimistic rollbacks
// - Snapshot fetches
// - Circuit breaker state and trips
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Transition metrics
    pub transitions_applied: IntCounterVec,
    pub transitions_rejected: IntCounterVec,
    pub orders_placed: IntCounter,

    // Channel metrics
    pub events_published: IntCounterVec,
    pub events_delivered: IntCounterVec,
    pub commands_published: IntCounter,
    pub publish_failures: IntCounterVec,

    // Client metrics
    pub optimistic_rollbacks: IntCounter,
    pub snapshot_fetches: IntCounterVec,

    // Circuit breaker metrics
    pub breaker_state: IntGauge,
    pub breaker_trips: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_applied = IntCounterVec::new(
            Opts::new("order_transitions_applied_total", "Status transitions committed"),
            &["from", "to"],
        )?;
        registry.register(Box::new(transitions_applied.clone()))?;

        let transitions_rejected = IntCounterVec::new(
            Opts::new(
                "order_transitions_rejected_total",
                "Status transitions rejected by the state machine",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(transitions_rejected.clone()))?;

        let orders_placed = IntCounter::new("orders_placed_total", "Orders created in PLACED")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("status_events_published_total", "Status events published to a topic"),
            &["scope"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let events_delivered = IntCounterVec::new(
            Opts::new(
                "status_events_delivered_total",
                "Status event deliveries to connected subscribers",
            ),
            &["scope"],
        )?;
        registry.register(Box::new(events_delivered.clone()))?;

        let commands_published = IntCounter::new(
            "transition_commands_published_total",
            "Fire-and-forget transition commands handed to the transport",
        )?;
        registry.register(Box::new(commands_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("channel_publish_failures_total", "Publishes refused by the transport"),
            &["path"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let optimistic_rollbacks = IntCounter::new(
            "optimistic_rollbacks_total",
            "Client-side optimistic mutations rolled back after a failed dispatch",
        )?;
        registry.register(Box::new(optimistic_rollbacks.clone()))?;

        let snapshot_fetches = IntCounterVec::new(
            Opts::new("snapshot_fetches_total", "Baseline snapshot reads"),
            &["kind"],
        )?;
        registry.register(Box::new(snapshot_fetches.clone()))?;

        let breaker_state = IntGauge::new(
            "channel_breaker_state",
            "Publish circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(breaker_state.clone()))?;

        let breaker_trips = IntCounter::new(
            "channel_breaker_trips_total",
            "Times the publish circuit breaker tripped open",
        )?;
        registry.register(Box::new(breaker_trips.clone()))?;

        Ok(Self {
            registry,
            transitions_applied,
            transitions_rejected,
            orders_placed,
            events_published,
            events_delivered,
            commands_published,
            publish_failures,
            optimistic_rollbacks,
            snapshot_fetches,
            breaker_state,
            breaker_trips,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: &str, to: &str, accepted: bool) {
        if accepted {
            self.transitions_applied.with_label_values(&[from, to]).inc();
        } else {
            self.transitions_rejected.with_label_values(&[from, to]).inc();
        }
    }

    pub fn record_publish(&self, scope: &str, delivered: usize) {
        self.events_published.with_label_values(&[scope]).inc();
        self.events_delivered
            .with_label_values(&[scope])
            .inc_by(delivered as u64);
    }

    pub fn record_snapshot_fetch(&self, kind: &str) {
        self.snapshot_fetches.with_label_values(&[kind]).inc();
    }

    pub fn update_breaker_state(&self, state: u8) {
        self.breaker_state.set(i64::from(state));
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
