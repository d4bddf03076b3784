use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use laundry_client::domain::catalog::Service;
use laundry_client::domain::order::{DraftStage, MissingSection, OrderError, OrderStatus};
use laundry_client::domain::resource::{AddressUpdate, NewAddress, NewPaymentMethod, PaymentMethodKind};
use laundry_client::metrics::Metrics;
use laundry_client::persistence::InMemoryBackend;
use laundry_client::stores::StoreError;
use laundry_client::AppContext;

fn service(name: &str, price_per_unit: f64, unit: &str) -> Service {
    Service {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: String::new(),
        icon: String::new(),
        price_per_unit,
        unit: unit.to_string(),
        estimated_hours: 24,
    }
}

fn address(label: &str) -> NewAddress {
    NewAddress {
        label: label.to_string(),
        street: "7 Marine Drive".to_string(),
        city: "Mumbai".to_string(),
        state: "MH".to_string(),
        zip_code: "400020".to_string(),
        is_default: false,
    }
}

#[tokio::test]
async fn test_full_order_flow() {
    let wash = service("Wash & Fold", 100.0, "kg");
    let dry = service("Dry Cleaning", 150.0, "item");
    let backend = Arc::new(InMemoryBackend::with_catalog(vec![wash.clone(), dry.clone()], Vec::new()));
    let ctx = AppContext::new(backend.clone(), Arc::new(Metrics::new().unwrap()));

    // Nothing works before sign-in
    assert_eq!(ctx.orders.place_order().await.unwrap_err(), StoreError::NotAuthenticated);

    let user = Uuid::new_v4();
    ctx.sign_in(user, "farah@example.com", "token");
    ctx.refresh().await.unwrap();
    assert_eq!(ctx.catalog.services().len(), 2);

    let home = ctx.addresses.add(address("Home")).await.unwrap();
    let office = ctx.addresses.add(address("Office")).await.unwrap();
    assert!(home.is_default);
    ctx.addresses.update(office.id, AddressUpdate::MakeDefault).await.unwrap();
    assert_eq!(ctx.addresses.default().unwrap().id, office.id);

    ctx.payment_methods
        .add(NewPaymentMethod {
            kind: PaymentMethodKind::ApplePay,
            last_four: None,
            card_brand: None,
            expiry: None,
            is_default: false,
        })
        .await
        .unwrap();

    ctx.begin_order().unwrap();
    assert_eq!(ctx.orders.stage(), DraftStage::Empty);

    ctx.orders.add_line_item(wash.id, &wash.name, 2, wash.price_per_unit).unwrap();
    ctx.orders.add_line_item(dry.id, &dry.name, 1, dry.price_per_unit).unwrap();
    ctx.orders.add_line_item(wash.id, &wash.name, 1, wash.price_per_unit).unwrap();
    assert_eq!(ctx.orders.calculate_total(), 450.0);

    let err = ctx.orders.place_order().await.unwrap_err();
    assert_eq!(err, StoreError::Order(OrderError::IncompleteOrder(MissingSection::Pickup)));

    let pickup_on = NaiveDate::from_ymd_opt(2026, 10, 22).unwrap();
    let pickup = ctx.addresses.default().unwrap();
    ctx.orders.set_pickup(pickup.clone(), pickup_on, "09:00 - 11:00").unwrap();
    ctx.orders.set_delivery(pickup, pickup_on.succ_opt().unwrap(), "17:00 - 19:00").unwrap();
    assert_eq!(ctx.orders.stage(), DraftStage::PaymentSet);

    let order = ctx.orders.place_order().await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 450.0);
    assert_eq!(order.item_count(), 4);
    assert_eq!(order.pickup.address.id, office.id);
    assert!(ctx.orders.draft().is_empty());

    let cancelled = ctx.orders.cancel_order(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    ctx.notifications.fetch_all().await.unwrap();
    let titles: Vec<String> = ctx.notifications.items().into_iter().map(|n| n.title).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Order Placed".to_string()));
    assert!(titles.contains(&"Order Cancelled".to_string()));
    assert_eq!(ctx.notifications.unread_count(), 2);

    let stored = ctx.orders.fetch_orders().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, OrderStatus::Cancelled);

    ctx.sign_out();
    assert!(ctx.orders.orders().is_empty());
    assert!(ctx.addresses.items().is_empty());
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    let backend = Arc::new(InMemoryBackend::new());
    let ctx = AppContext::new(backend, Arc::new(Metrics::new().unwrap()));

    ctx.sign_in(Uuid::new_v4(), "first@example.com", "token");
    ctx.addresses.add(address("Home")).await.unwrap();
    ctx.sign_out();

    ctx.sign_in(Uuid::new_v4(), "second@example.com", "token");
    assert!(ctx.addresses.fetch_all().await.unwrap().is_empty());
}
