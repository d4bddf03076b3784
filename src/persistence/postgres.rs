use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{query, query_as, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::catalog::{Service, TimeSlot};
use crate::domain::notification::{NewNotification, Notification, NotificationKind};
use crate::domain::order::{LineItem, Order, OrderStatus, PaymentDetails, PaymentStatus, Schedule};
use crate::domain::resource::{
    Address, AddressUpdate, CardExpiry, NewAddress, NewPaymentMethod, PaymentMethod, PaymentMethodKind,
    PaymentMethodUpdate,
};
use super::{
    CancelOutcome, CatalogRepository, NotificationRepository, OrderRepository, PersistenceError, ResourceRepository,
};

// ============================================================================
// Postgres Backend
// ============================================================================
//
// Tables:
// - addresses, payment_methods   per-user, one is_default row each
// - orders                       header row (status, totals, payment)
// - order_details                pickup/delivery schedule snapshots
// - order_services               line items
// - services, time_slots         catalog (read-only here)
// - notifications
//
// Address and payment method snapshots inside order_details are stored as
// JSON text so a later edit of the saved address does not rewrite history.
//
// ============================================================================

const SCHEMA: [&str; 8] = [
    "CREATE TABLE IF NOT EXISTS addresses (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        label TEXT NOT NULL,
        street TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zip_code TEXT NOT NULL,
        is_default BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS payment_methods (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        type TEXT NOT NULL,
        card_last_four TEXT,
        card_brand TEXT,
        card_exp_month INTEGER,
        card_exp_year INTEGER,
        is_default BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        status TEXT NOT NULL,
        total_amount DOUBLE PRECISION NOT NULL,
        payment_status TEXT NOT NULL,
        special_instructions TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS order_details (
        order_id UUID PRIMARY KEY REFERENCES orders(id) ON DELETE CASCADE,
        pickup_address TEXT NOT NULL,
        pickup_date DATE NOT NULL,
        pickup_time_slot TEXT NOT NULL,
        delivery_address TEXT NOT NULL,
        delivery_date DATE NOT NULL,
        delivery_time_slot TEXT NOT NULL,
        payment_method TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS order_services (
        order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        service_id UUID NOT NULL,
        service_name TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price DOUBLE PRECISION NOT NULL,
        price DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (order_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS services (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT '',
        price_per_unit DOUBLE PRECISION NOT NULL,
        unit TEXT NOT NULL,
        estimated_hours INTEGER NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS time_slots (
        id TEXT PRIMARY KEY,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        is_available BOOLEAN NOT NULL DEFAULT TRUE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        type TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        related_id UUID,
        related_type TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

const ADDRESS_COLUMNS: &str = "id, label, street, city, state, zip_code, is_default";
const PAYMENT_METHOD_COLUMNS: &str =
    "id, type, card_last_four, card_brand, card_exp_month, card_exp_year, is_default";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, type, is_read, related_id, related_type, created_at";

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::new(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::new(format!("Malformed order snapshot: {}", err))
    }
}

#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create any missing tables
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        for statement in SCHEMA {
            query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(tables = SCHEMA.len(), "Schema ensured");
        Ok(())
    }

    async fn clear_defaults(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        user_id: Uuid,
    ) -> Result<(), PersistenceError> {
        let sql = format!("UPDATE {} SET is_default = FALSE WHERE user_id = $1", table);
        query(&sql).bind(user_id).execute(&mut **tx).await?;
        Ok(())
    }

    async fn has_rows(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        user_id: Uuid,
    ) -> Result<bool, PersistenceError> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1) AS present", table);
        let row = query(&sql).bind(user_id).fetch_one(&mut **tx).await?;
        Ok(row.try_get("present")?)
    }

    /// Promote the oldest remaining row when the user has no default left
    async fn repair_default(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        user_id: Uuid,
    ) -> Result<Option<Uuid>, PersistenceError> {
        let sql = format!(
            "UPDATE {table} SET is_default = TRUE
             WHERE id = (SELECT id FROM {table} WHERE user_id = $1 ORDER BY created_at, id LIMIT 1)
               AND NOT EXISTS (SELECT 1 FROM {table} WHERE user_id = $1 AND is_default)
             RETURNING id",
            table = table
        );
        let promoted = query(&sql).bind(user_id).fetch_optional(&mut **tx).await?;
        Ok(promoted.map(|row| row.try_get::<Uuid, _>("id")).transpose()?)
    }

    async fn load_order(&self, row: PgRow) -> Result<Order, PersistenceError> {
        let id: Uuid = row.try_get("id")?;

        let details = query("SELECT * FROM order_details WHERE order_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        let line_items = query(
            "SELECT service_id, service_name, quantity, unit_price
             FROM order_services WHERE order_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|item| -> Result<LineItem, PersistenceError> {
            let quantity: i32 = item.try_get("quantity")?;
            Ok(LineItem::new(
                item.try_get("service_id")?,
                item.try_get::<String, _>("service_name")?,
                u32::try_from(quantity).unwrap_or(0),
                item.try_get("unit_price")?,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

        let pickup = Schedule {
            address: serde_json::from_str(&details.try_get::<String, _>("pickup_address")?)?,
            date: details.try_get::<NaiveDate, _>("pickup_date")?,
            time_slot: details.try_get("pickup_time_slot")?,
        };
        let delivery = Schedule {
            address: serde_json::from_str(&details.try_get::<String, _>("delivery_address")?)?,
            date: details.try_get::<NaiveDate, _>("delivery_date")?,
            time_slot: details.try_get("delivery_time_slot")?,
        };
        let method: PaymentMethod = serde_json::from_str(&details.try_get::<String, _>("payment_method")?)?;

        Ok(Order {
            id,
            user_id: row.try_get("user_id")?,
            line_items,
            pickup,
            delivery,
            payment: PaymentDetails {
                method,
                status: PaymentStatus::parse(&row.try_get::<String, _>("payment_status")?),
            },
            special_instructions: row.try_get("special_instructions")?,
            total_amount: row.try_get("total_amount")?,
            status: OrderStatus::from(row.try_get::<String, _>("status")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

impl<'r> FromRow<'r, PgRow> for Address {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            label: row.try_get("label")?,
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip_code: row.try_get("zip_code")?,
            is_default: row.try_get("is_default")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for PaymentMethod {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let raw_kind: String = row.try_get("type")?;
        let kind = PaymentMethodKind::parse(&raw_kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "type".to_string(),
            source: format!("unknown payment method type: {}", raw_kind).into(),
        })?;

        let month: Option<i32> = row.try_get("card_exp_month")?;
        let year: Option<i32> = row.try_get("card_exp_year")?;
        let expiry = match (month, year) {
            (Some(month), Some(year)) => Some(CardExpiry {
                month: u8::try_from(month).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "card_exp_month".to_string(),
                    source: Box::new(e),
                })?,
                year: u16::try_from(year).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "card_exp_year".to_string(),
                    source: Box::new(e),
                })?,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            kind,
            last_four: row.try_get("card_last_four")?,
            card_brand: row.try_get("card_brand")?,
            expiry,
            is_default: row.try_get("is_default")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Notification {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: NotificationKind::parse(&row.try_get::<String, _>("type")?),
            read: row.try_get("is_read")?,
            related_id: row.try_get("related_id")?,
            related_type: row.try_get("related_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Service {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let hours: i32 = row.try_get("estimated_hours")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            price_per_unit: row.try_get("price_per_unit")?,
            unit: row.try_get("unit")?,
            estimated_hours: u32::try_from(hours).map_err(|e| sqlx::Error::ColumnDecode {
                index: "estimated_hours".to_string(),
                source: Box::new(e),
            })?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for TimeSlot {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            available: row.try_get("is_available")?,
        })
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[async_trait]
impl ResourceRepository<Address> for PostgresBackend {
    async fn list(&self, user_id: Uuid) -> Result<Vec<Address>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
            ADDRESS_COLUMNS
        );
        Ok(query_as::<Postgres, Address>(&sql).bind(user_id).fetch_all(&self.pool).await?)
    }

    async fn insert(&self, user_id: Uuid, draft: NewAddress) -> Result<Address, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let is_default = draft.is_default || !Self::has_rows(&mut tx, "addresses", user_id).await?;
        if is_default {
            Self::clear_defaults(&mut tx, "addresses", user_id).await?;
        }

        let sql = format!(
            "INSERT INTO addresses (id, user_id, label, street, city, state, zip_code, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            ADDRESS_COLUMNS
        );
        let address = query_as::<Postgres, Address>(&sql)
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(&draft.label)
            .bind(&draft.street)
            .bind(&draft.city)
            .bind(&draft.state)
            .bind(&draft.zip_code)
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(address_id = %address.id, %user_id, "Address inserted");
        Ok(address)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, update: &AddressUpdate) -> Result<Address, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let returning = format!("RETURNING {}", ADDRESS_COLUMNS);
        let updated = match update {
            AddressUpdate::Relabel { label } => {
                let sql = format!("UPDATE addresses SET label = $3 WHERE id = $1 AND user_id = $2 {}", returning);
                query_as::<Postgres, Address>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .bind(label)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            AddressUpdate::ChangeLocation { street, city, state, zip_code } => {
                let sql = format!(
                    "UPDATE addresses SET street = $3, city = $4, state = $5, zip_code = $6
                     WHERE id = $1 AND user_id = $2 {}",
                    returning
                );
                query_as::<Postgres, Address>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .bind(street)
                    .bind(city)
                    .bind(state)
                    .bind(zip_code)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            AddressUpdate::MakeDefault => {
                Self::clear_defaults(&mut tx, "addresses", user_id).await?;
                let sql = format!(
                    "UPDATE addresses SET is_default = TRUE WHERE id = $1 AND user_id = $2 {}",
                    returning
                );
                query_as::<Postgres, Address>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        let address = updated.ok_or_else(|| PersistenceError::new(format!("address not found: {}", id)))?;
        tx.commit().await?;
        Ok(address)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Uuid>, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let result = query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::new(format!("address not found: {}", id)));
        }

        let promoted = Self::repair_default(&mut tx, "addresses", user_id).await?;
        tx.commit().await?;
        Ok(promoted)
    }
}

// ============================================================================
// Payment Methods
// ============================================================================

#[async_trait]
impl ResourceRepository<PaymentMethod> for PostgresBackend {
    async fn list(&self, user_id: Uuid) -> Result<Vec<PaymentMethod>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM payment_methods WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
            PAYMENT_METHOD_COLUMNS
        );
        Ok(query_as::<Postgres, PaymentMethod>(&sql).bind(user_id).fetch_all(&self.pool).await?)
    }

    async fn insert(&self, user_id: Uuid, draft: NewPaymentMethod) -> Result<PaymentMethod, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let is_default = draft.is_default || !Self::has_rows(&mut tx, "payment_methods", user_id).await?;
        if is_default {
            Self::clear_defaults(&mut tx, "payment_methods", user_id).await?;
        }

        let sql = format!(
            "INSERT INTO payment_methods
                (id, user_id, type, card_last_four, card_brand, card_exp_month, card_exp_year, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            PAYMENT_METHOD_COLUMNS
        );
        let method = query_as::<Postgres, PaymentMethod>(&sql)
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(draft.kind.as_str())
            .bind(&draft.last_four)
            .bind(&draft.card_brand)
            .bind(draft.expiry.map(|e| i32::from(e.month)))
            .bind(draft.expiry.map(|e| i32::from(e.year)))
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(payment_method_id = %method.id, %user_id, "Payment method inserted");
        Ok(method)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let returning = format!("RETURNING {}", PAYMENT_METHOD_COLUMNS);
        let updated = match update {
            PaymentMethodUpdate::ChangeExpiry { expiry } => {
                let sql = format!(
                    "UPDATE payment_methods SET card_exp_month = $3, card_exp_year = $4
                     WHERE id = $1 AND user_id = $2 {}",
                    returning
                );
                query_as::<Postgres, PaymentMethod>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .bind(i32::from(expiry.month))
                    .bind(i32::from(expiry.year))
                    .fetch_optional(&mut *tx)
                    .await?
            }
            PaymentMethodUpdate::MakeDefault => {
                Self::clear_defaults(&mut tx, "payment_methods", user_id).await?;
                let sql = format!(
                    "UPDATE payment_methods SET is_default = TRUE WHERE id = $1 AND user_id = $2 {}",
                    returning
                );
                query_as::<Postgres, PaymentMethod>(&sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        let method = updated.ok_or_else(|| PersistenceError::new(format!("payment_method not found: {}", id)))?;
        tx.commit().await?;
        Ok(method)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Uuid>, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let result = query("DELETE FROM payment_methods WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::new(format!("payment_method not found: {}", id)));
        }

        let promoted = Self::repair_default(&mut tx, "payment_methods", user_id).await?;
        tx.commit().await?;
        Ok(promoted)
    }
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for PostgresBackend {
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, PersistenceError> {
        let rows = query("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.load_order(row).await?);
        }
        Ok(orders)
    }

    async fn find_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, PersistenceError> {
        let row = query("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_order(row).await?)),
            None => Ok(None),
        }
    }

    /// Header, details and line items land together or not at all
    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        query(
            "INSERT INTO orders
                (id, user_id, status, total_amount, payment_status, special_instructions, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.payment.status.as_str())
        .bind(&order.special_instructions)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        query(
            "INSERT INTO order_details
                (order_id, pickup_address, pickup_date, pickup_time_slot,
                 delivery_address, delivery_date, delivery_time_slot, payment_method)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id)
        .bind(serde_json::to_string(&order.pickup.address)?)
        .bind(order.pickup.date)
        .bind(&order.pickup.time_slot)
        .bind(serde_json::to_string(&order.delivery.address)?)
        .bind(order.delivery.date)
        .bind(&order.delivery.time_slot)
        .bind(serde_json::to_string(&order.payment.method)?)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.line_items.iter().enumerate() {
            query(
                "INSERT INTO order_services
                    (order_id, position, service_id, service_name, quantity, unit_price, price)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(order.id)
            .bind(position as i32)
            .bind(item.service_id)
            .bind(&item.service_name)
            .bind(item.quantity() as i32)
            .bind(item.unit_price())
            .bind(item.price())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(order_id = %order.id, line_items = order.line_items.len(), "Order persisted");
        Ok(())
    }

    async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<CancelOutcome, PersistenceError> {
        let result = query(
            "UPDATE orders SET status = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'confirmed')",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(OrderStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(CancelOutcome::Cancelled);
        }

        let current = query("SELECT status FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PersistenceError::new("Order not found or does not belong to the user"))?;
        let status: String = current.try_get("status")?;

        tracing::debug!(order_id = %order_id, status = %status, "Cancel refused by stored status");
        Ok(CancelOutcome::Refused { current: OrderStatus::from(status.as_str()) })
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[async_trait]
impl NotificationRepository for PostgresBackend {
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        Ok(query_as::<Postgres, Notification>(&sql).bind(user_id).fetch_all(&self.pool).await?)
    }

    async fn insert_notification(
        &self,
        user_id: Uuid,
        notification: NewNotification,
    ) -> Result<Notification, PersistenceError> {
        let sql = format!(
            "INSERT INTO notifications (id, user_id, title, message, type, related_id, related_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        Ok(query_as::<Postgres, Notification>(&sql)
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.kind.as_str())
            .bind(notification.related_id)
            .bind(&notification.related_type)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), PersistenceError> {
        query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_notifications(&self, user_id: Uuid) -> Result<(), PersistenceError> {
        query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for PostgresBackend {
    async fn list_services(&self) -> Result<Vec<Service>, PersistenceError> {
        Ok(query_as::<Postgres, Service>(
            "SELECT id, name, description, icon, price_per_unit, unit, estimated_hours
             FROM services WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, PersistenceError> {
        Ok(query_as::<Postgres, TimeSlot>(
            "SELECT id, start_time, end_time, is_available FROM time_slots WHERE is_active ORDER BY start_time",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
