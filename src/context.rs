use std::sync::Arc;

use uuid::Uuid;

use crate::cache::SnapshotCache;
use crate::metrics::Metrics;
use crate::persistence::Backend;
use crate::session::{SessionHandle, UserSession};
use crate::stores::{
    AddressStore, CatalogStore, NotificationStore, OrderStore, PaymentMethodStore, StoreError,
};

// ============================================================================
// Application Context - owns every store
// ============================================================================
//
// Built once from a backend; all stores share the same session and metrics.
// Per-user snapshots are cached under "<user_id>-<store>", the catalog under
// "catalog".
//
// ============================================================================

pub struct AppContext {
    pub session: SessionHandle,
    pub addresses: AddressStore,
    pub payment_methods: PaymentMethodStore,
    pub orders: OrderStore,
    pub notifications: Arc<NotificationStore>,
    pub catalog: CatalogStore,
    pub metrics: Arc<Metrics>,
    cache: Option<SnapshotCache>,
}

impl AppContext {
    pub fn new<B: Backend + 'static>(backend: Arc<B>, metrics: Arc<Metrics>) -> Self {
        let session = SessionHandle::new();
        let notifications = Arc::new(NotificationStore::new(backend.clone(), session.clone(), metrics.clone()));

        Self {
            addresses: AddressStore::new(backend.clone(), session.clone(), metrics.clone()),
            payment_methods: PaymentMethodStore::new(backend.clone(), session.clone(), metrics.clone()),
            orders: OrderStore::new(backend.clone(), notifications.clone(), session.clone(), metrics.clone()),
            catalog: CatalogStore::new(backend, metrics.clone()),
            notifications,
            session,
            metrics,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sign_in(&self, user_id: Uuid, email: impl Into<String>, access_token: impl Into<String>) -> UserSession {
        self.session.sign_in(user_id, email, access_token)
    }

    /// Ends the session and drops every per-user snapshot
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.addresses.clear();
        self.payment_methods.clear();
        self.orders.clear();
        self.notifications.clear();
    }

    /// Fresh draft with the default payment method pre-selected
    pub fn begin_order(&self) -> Result<(), StoreError> {
        self.orders.reset_draft();
        if let Some(method) = self.payment_methods.default() {
            self.orders.set_payment_method(method)?;
        }
        Ok(())
    }

    /// Fetch everything the signed-in user sees
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.catalog.fetch_services().await?;
        self.addresses.fetch_all().await?;
        self.payment_methods.fetch_all().await?;
        self.orders.fetch_orders().await?;
        self.notifications.fetch_all().await?;
        Ok(())
    }

    /// Seed stores from cached snapshots; returns how many were restored
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let Some(cache) = &self.cache else {
            return Ok(0);
        };

        let mut restored = 0;
        if let Some(saved) = cache.load("catalog").await? {
            restored += usize::from(self.catalog.restore(saved));
        }

        if let Some(user_id) = self.session.user_id() {
            if let Some(saved) = cache.load(&key(user_id, "address")).await? {
                restored += usize::from(self.addresses.restore(saved));
            }
            if let Some(saved) = cache.load(&key(user_id, "payment_method")).await? {
                restored += usize::from(self.payment_methods.restore(saved));
            }
            if let Some(saved) = cache.load(&key(user_id, "order")).await? {
                restored += usize::from(self.orders.restore(saved));
            }
            if let Some(saved) = cache.load(&key(user_id, "notification")).await? {
                restored += usize::from(self.notifications.restore(saved));
            }
        }

        tracing::info!(restored, "Restored cached snapshots");
        Ok(restored)
    }

    /// Flush snapshots to the cache
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        cache.save("catalog", &self.catalog.snapshot()).await?;

        if let Some(user_id) = self.session.user_id() {
            cache.save(&key(user_id, "address"), &self.addresses.snapshot()).await?;
            cache.save(&key(user_id, "payment_method"), &self.payment_methods.snapshot()).await?;
            cache.save(&key(user_id, "order"), &self.orders.snapshot()).await?;
            cache.save(&key(user_id, "notification"), &self.notifications.snapshot()).await?;
        }

        tracing::info!(dir = %cache.dir().display(), "Snapshots flushed");
        Ok(())
    }
}

fn key(user_id: Uuid, store: &str) -> String {
    format!("{}-{}", user_id, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{NewPaymentMethod, PaymentMethodKind};
    use crate::persistence::InMemoryBackend;

    fn context() -> AppContext {
        AppContext::new(Arc::new(InMemoryBackend::new()), Arc::new(Metrics::new().unwrap()))
    }

    fn paypal() -> NewPaymentMethod {
        NewPaymentMethod {
            kind: PaymentMethodKind::Paypal,
            last_four: None,
            card_brand: None,
            expiry: None,
            is_default: false,
        }
    }

    #[tokio::test]
    async fn test_sign_out_clears_user_stores() {
        let ctx = context();
        ctx.sign_in(Uuid::new_v4(), "neha@example.com", "token");
        ctx.payment_methods.add(paypal()).await.unwrap();

        ctx.sign_out();

        assert!(ctx.payment_methods.items().is_empty());
        assert!(ctx.session.current().is_none());
    }

    #[tokio::test]
    async fn test_begin_order_preselects_default_payment() {
        let ctx = context();
        ctx.sign_in(Uuid::new_v4(), "neha@example.com", "token");
        let method = ctx.payment_methods.add(paypal()).await.unwrap();

        ctx.begin_order().unwrap();
        assert_eq!(ctx.orders.draft().payment_method().unwrap().id, method.id);
    }

    #[tokio::test]
    async fn test_shutdown_and_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let user = Uuid::new_v4();

        let ctx = context().with_cache(SnapshotCache::new(dir.path()));
        ctx.sign_in(user, "neha@example.com", "token");
        let method = ctx.payment_methods.add(paypal()).await.unwrap();
        ctx.shutdown().await.unwrap();

        let next = context().with_cache(SnapshotCache::new(dir.path()));
        next.sign_in(user, "neha@example.com", "token");
        assert_eq!(next.restore().await.unwrap(), 1);
        assert_eq!(next.payment_methods.default().unwrap().id, method.id);
    }
}
