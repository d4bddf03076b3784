use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;

use crate::domain::resource::{Address, PaymentMethod};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Tolerance used when comparing unit prices
pub const PRICE_EPSILON: f64 = 1e-9;

/// One service selection with its quantity
///
/// `unit_price` is authoritative; `price` is recomputed from it on every
/// quantity change and never set directly. A serialized `price` is ignored on
/// the way back in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "StoredLineItem")]
pub struct LineItem {
    pub service_id: Uuid,
    pub service_name: String,
    quantity: u32,
    unit_price: f64,
    price: f64,
}

#[derive(Deserialize)]
struct StoredLineItem {
    service_id: Uuid,
    service_name: String,
    quantity: u32,
    unit_price: f64,
}

impl From<StoredLineItem> for LineItem {
    fn from(stored: StoredLineItem) -> Self {
        LineItem::new(stored.service_id, stored.service_name, stored.quantity, stored.unit_price)
    }
}

impl LineItem {
    pub fn new(service_id: Uuid, service_name: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        Self {
            service_id,
            service_name: service_name.into(),
            quantity,
            unit_price,
            price: f64::from(quantity) * unit_price,
        }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.price = f64::from(quantity) * self.unit_price;
    }
}

/// Where and when a pickup or delivery happens
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Schedule {
    pub address: Address,
    pub date: NaiveDate,
    pub time_slot: String,
}

/// Section of the draft that must be filled before submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSection {
    Services,
    Pickup,
    Delivery,
    Payment,
}

impl std::fmt::Display for MissingSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MissingSection::Services => "services",
            MissingSection::Pickup => "pickup",
            MissingSection::Delivery => "delivery",
            MissingSection::Payment => "payment",
        };
        f.write_str(name)
    }
}

/// Furthest step of the order flow the draft has data for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DraftStage {
    Empty,
    ServicesSelected,
    PickupSet,
    DeliverySet,
    PaymentSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

// ============================================================================
// Order Status Lifecycle
// ============================================================================
//
//   pending → confirmed → picked_up → processing → ready_for_delivery
//           → out_for_delivery → delivered
//
//   pending | confirmed → cancelled
//
// Statuses the client does not know are kept verbatim as `Unknown` so they
// can still be rendered.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    PickedUp,
    Processing,
    ReadyForDelivery,
    OutForDelivery,
    Delivered,
    Cancelled,
    Unknown(String),
}

/// Linear happy path, in order
pub const STATUS_SEQUENCE: [OrderStatus; 7] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::PickedUp,
    OrderStatus::Processing,
    OrderStatus::ReadyForDelivery,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
];

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Processing => "processing",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown(raw) => raw,
        }
    }

    /// Human label for status badges
    pub fn label(&self) -> String {
        match self {
            OrderStatus::Pending => "Pending".to_string(),
            OrderStatus::Confirmed => "Confirmed".to_string(),
            OrderStatus::PickedUp => "Picked Up".to_string(),
            OrderStatus::Processing => "Processing".to_string(),
            OrderStatus::ReadyForDelivery => "Ready for Delivery".to_string(),
            OrderStatus::OutForDelivery => "Out for Delivery".to_string(),
            OrderStatus::Delivered => "Delivered".to_string(),
            OrderStatus::Cancelled => "Cancelled".to_string(),
            OrderStatus::Unknown(raw) => raw.replace('_', " "),
        }
    }

    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, PickedUp)
                | (PickedUp, Processing)
                | (Processing, ReadyForDelivery)
                | (ReadyForDelivery, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(&OrderStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Zero-based step on the happy path; None for cancelled or unknown
    pub fn progress_step(&self) -> Option<usize> {
        STATUS_SEQUENCE.iter().position(|s| s == self)
    }
}

impl From<&str> for OrderStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "pending" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "picked_up" => OrderStatus::PickedUp,
            "processing" => OrderStatus::Processing,
            "ready_for_delivery" => OrderStatus::ReadyForDelivery,
            "out_for_delivery" => OrderStatus::OutForDelivery,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            other => OrderStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        OrderStatus::from(raw.as_str())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
