use actix::prelude::*;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod dispatch;
mod domain;
mod messaging;
mod metrics;
mod models;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use actors::{OrderServiceActor, PlaceOrder};
use dispatch::{ActorTransport, TransitionTransport};
use domain::order::{Customer, LineItem, OrderStatus};
use messaging::StatusChannel;
use session::{TrackerSession, VendorSession};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hawker_orders=debug")),
        )
        .init();

    tracing::info!("🍜 Starting Hawker Orders status propagation demo");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(metrics.registry().clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, 9090).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Status channel (with circuit breaker) ===
    let channel = StatusChannel::new(Arc::clone(&metrics));

    // === 3. Start the order service actor (server of record) ===
    tracing::info!("Starting order service actor");
    let service = OrderServiceActor::new(channel.clone(), Arc::clone(&metrics)).start();
    let transport: Arc<dyn TransitionTransport> = Arc::new(ActorTransport::new(service.clone()));

    // === 4. A customer places an order ===
    let vendor_id = uuid::Uuid::new_v4();
    let shop_id = uuid::Uuid::new_v4();
    let order = service
        .send(PlaceOrder {
            customer: Customer {
                name: "Wei Ling".to_string(),
                phone: "+65 9123 4567".to_string(),
                email: "weiling@example.com".to_string(),
            },
            vendor_id,
            shop_id,
            items: vec![
                LineItem {
                    product_id: uuid::Uuid::new_v4(),
                    name: "Hainanese Chicken Rice".to_string(),
                    unit_price_cents: 550,
                    quantity: 2,
                    diet_flags: vec![],
                },
                LineItem {
                    product_id: uuid::Uuid::new_v4(),
                    name: "Teh Tarik".to_string(),
                    unit_price_cents: 180,
                    quantity: 1,
                    diet_flags: vec![],
                },
            ],
            prep_estimate: chrono::Duration::minutes(15),
        })
        .await??;

    tracing::info!(
        "✅ Order placed: {} (pickup code {}, total {} cents)",
        order.id,
        order.pickup_code,
        order.total_cents
    );

    // === 5. Vendor and customer open their sessions ===
    let vendor_session = VendorSession::start(
        vendor_id,
        channel.clone(),
        Arc::clone(&transport),
        Arc::clone(&metrics),
    )
    .await?;

    let tracker_session =
        TrackerSession::start(order.pickup_code.clone(), channel.clone(), Arc::clone(&transport))
            .await?;

    let view = vendor_session.queue_view().await;
    tracing::info!("📋 Vendor queue: {} order(s) awaiting acceptance", view.placed.len());

    // === 6. Vendor works the order through the queue ===
    vendor_session
        .transition(order.id, OrderStatus::Preparing)
        .await?;
    tracing::info!("✅ Order accepted, now preparing");
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    vendor_session
        .transition(order.id, OrderStatus::ReadyForPickup)
        .await?;
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    tracing::info!(
        "✅ Order ready for pickup, customer sees: {:?}",
        tracker_session.status().await
    );

    // === 7. Customer scans the QR code at the counter ===
    let completed = tracker_session.complete_pickup().await?;
    tracing::info!("🎉 Pickup complete: order {} is {}", completed.id, completed.status);
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let view = vendor_session.queue_view().await;
    tracing::info!(
        "📋 Vendor queue: {} active, {} historical",
        view.placed.len() + view.preparing.len() + view.ready.len(),
        view.historical.len()
    );

    // === 8. Tear down sessions (subscriptions close with them) ===
    let mut vendor_session = vendor_session;
    let mut tracker_session = tracker_session;
    vendor_session.close();
    tracker_session.close();

    tracing::info!("Demo complete");
    Ok(())
}
