use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use laundry_client::cache::SnapshotCache;
use laundry_client::config::ClientConfig;
use laundry_client::domain::catalog::{Service, TimeSlot};
use laundry_client::domain::resource::{CardExpiry, NewAddress, NewPaymentMethod, PaymentMethodKind};
use laundry_client::metrics::Metrics;
use laundry_client::persistence::{Backend, InMemoryBackend, PostgresBackend};
use laundry_client::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load()?;

    // RUST_LOG wins over LAUNDRY_LOG / --log-filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .init();

    tracing::info!("🧺 Starting laundry client demo");

    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let backend = PostgresBackend::connect(url, config.max_connections).await?;
            backend.ensure_schema().await?;
            run_demo(Arc::new(backend), &config, metrics).await
        }
        None => {
            tracing::info!("No database configured, using in-memory backend");
            let backend = InMemoryBackend::with_catalog(demo_services(), demo_time_slots());
            run_demo(Arc::new(backend), &config, metrics).await
        }
    }
}

async fn run_demo<B: Backend + 'static>(backend: Arc<B>, config: &ClientConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let mut ctx = AppContext::new(backend, metrics.clone());
    if let Some(dir) = &config.cache_dir {
        ctx = ctx.with_cache(SnapshotCache::new(dir));
    }

    // === 1. Sign in and load state ===
    let user_id = config.demo_user.unwrap_or_else(Uuid::new_v4);
    ctx.sign_in(user_id, "demo@laundry.local", "demo-token");
    ctx.restore().await?;
    ctx.refresh().await?;

    // === 2. Make sure there is somewhere to pick up from and a way to pay ===
    if ctx.addresses.items().is_empty() {
        ctx.addresses
            .add(NewAddress {
                label: "Home".to_string(),
                street: "18 Church Street".to_string(),
                city: "Bengaluru".to_string(),
                state: "KA".to_string(),
                zip_code: "560001".to_string(),
                is_default: true,
            })
            .await?;
    }
    if ctx.payment_methods.items().is_empty() {
        ctx.payment_methods
            .add(NewPaymentMethod {
                kind: PaymentMethodKind::Card,
                last_four: Some("4242".to_string()),
                card_brand: Some("Visa".to_string()),
                expiry: Some(CardExpiry { month: 12, year: 2029 }),
                is_default: true,
            })
            .await?;
    }

    // === 3. Build the draft ===
    ctx.begin_order()?;

    let services = ctx.catalog.services();
    for (service, quantity) in services.iter().take(2).zip([3, 1]) {
        ctx.orders
            .add_line_item(service.id, service.name.clone(), quantity, service.price_per_unit)?;
    }

    let address = ctx.addresses.default().context("no saved address")?;
    let dates = ctx.catalog.available_dates();
    let pickup_date = *dates.get(1).context("no pickup dates on offer")?;
    let delivery_date = *dates.get(3).context("no delivery dates on offer")?;
    let pickup_slot = ctx.catalog.time_slots_for(pickup_date).into_iter().next().context("no pickup slots")?;
    let delivery_slot = ctx.catalog.time_slots_for(delivery_date).into_iter().last().context("no delivery slots")?;

    ctx.orders.set_pickup(address.clone(), pickup_date, pickup_slot.label())?;
    ctx.orders.set_delivery(address, delivery_date, delivery_slot.label())?;
    ctx.orders.set_special_instructions("Please use mild detergent")?;
    tracing::info!(stage = ?ctx.orders.stage(), total = ctx.orders.calculate_total(), "Draft ready");

    // === 4. Place and cancel ===
    let order = ctx.orders.place_order().await?;
    tracing::info!("✅ Order placed: {} ({} items, total {:.2})", order.reference(), order.item_count(), order.total_amount);

    let cancelled = ctx.orders.cancel_order(order.id).await?;
    tracing::info!("✅ Order {} is now {}", cancelled.reference(), cancelled.status.label());

    tracing::info!(unread = ctx.notifications.unread_count(), "Notifications");

    // === 5. Flush and report ===
    ctx.shutdown().await?;
    tracing::debug!("Metrics:\n{}", metrics.render()?);

    tracing::info!("🎉 Demo complete!");
    Ok(())
}

fn demo_services() -> Vec<Service> {
    [
        ("Wash & Fold", "Everyday laundry, washed and folded", "shirt", 100.0, "kg", 24),
        ("Dry Cleaning", "Suits, sarees and delicates", "hanger", 150.0, "item", 48),
        ("Ironing", "Pressed and ready to wear", "iron", 20.0, "item", 12),
        ("Shoe Cleaning", "Deep clean for sneakers and leather", "shoe", 250.0, "pair", 72),
    ]
    .into_iter()
    .map(|(name, description, icon, price_per_unit, unit, estimated_hours)| Service {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        price_per_unit,
        unit: unit.to_string(),
        estimated_hours,
    })
    .collect()
}

fn demo_time_slots() -> Vec<TimeSlot> {
    [("09:00", "11:00"), ("11:00", "13:00"), ("13:00", "15:00"), ("15:00", "17:00"), ("17:00", "19:00")]
        .into_iter()
        .map(|(start, end)| TimeSlot {
            id: format!("slot-{}", start),
            start_time: start.to_string(),
            end_time: end.to_string(),
            available: true,
        })
        .collect()
}
