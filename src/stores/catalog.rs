use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::catalog::{self, Service, TimeSlot, DEFAULT_DAYS_AHEAD};
use crate::metrics::Metrics;
use crate::persistence::CatalogRepository;
use super::error::StoreError;
use super::state::{Snapshot, StateCell};

const STORE: &str = "catalog";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogState {
    pub services: Vec<Service>,
    pub time_slots: Vec<TimeSlot>,
}

/// Services and slot templates; public data, no session needed
pub struct CatalogStore {
    backend: Arc<dyn CatalogRepository>,
    metrics: Arc<Metrics>,
    state: StateCell<CatalogState>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn CatalogRepository>, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            metrics,
            state: StateCell::new(STORE),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<CatalogState>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<CatalogState> {
        self.state.snapshot()
    }

    pub fn services(&self) -> Vec<Service> {
        self.state.read(|s| s.services.clone())
    }

    pub fn service(&self, id: Uuid) -> Option<Service> {
        self.state.read(|s| s.services.iter().find(|svc| svc.id == id).cloned())
    }

    pub fn restore(&self, saved: Snapshot<CatalogState>) -> bool {
        self.state.restore(saved)
    }

    pub async fn fetch_services(&self) -> Result<Vec<Service>, StoreError> {
        let ticket = self.state.begin();

        let result = async {
            let services = self.backend.list_services().await?;
            tracing::debug!(count = services.len(), "Fetched services");

            let applied = self.state.commit_if_current(ticket, |state| {
                state.services = services;
                Ok::<_, StoreError>(())
            })?;
            if !applied {
                self.metrics.record_stale_response(STORE);
            }
            Ok::<_, StoreError>(self.services())
        }
        .await;

        self.state.settle(&self.metrics, "fetch_services", ticket, result)
    }

    pub async fn fetch_time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        let ticket = self.state.begin();

        let result = async {
            let time_slots = self.backend.list_time_slots().await?;
            tracing::debug!(count = time_slots.len(), "Fetched time slots");

            // services and slots share one version; commit as a delta so a
            // slot fetch never discards a concurrent service fetch
            self.state.commit(ticket, |state| {
                state.time_slots = time_slots.clone();
                Ok::<_, StoreError>(())
            })?;
            Ok::<_, StoreError>(time_slots)
        }
        .await;

        self.state.settle(&self.metrics, "fetch_time_slots", ticket, result)
    }

    /// Pickup/delivery dates on offer, starting today
    pub fn available_dates(&self) -> Vec<NaiveDate> {
        catalog::available_dates(Local::now().date_naive(), DEFAULT_DAYS_AHEAD)
    }

    /// Two-hour windows for `date`, honoring same-day lead time
    pub fn time_slots_for(&self, date: NaiveDate) -> Vec<TimeSlot> {
        catalog::generate_time_slots(date, Local::now().naive_local())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::persistence::{InMemoryBackend, PersistenceError};

    /// Holds its first service listing until released; later calls answer at once
    struct HeldCatalog {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
        first: Vec<Service>,
        later: Vec<Service>,
    }

    #[async_trait]
    impl CatalogRepository for HeldCatalog {
        async fn list_services(&self) -> Result<Vec<Service>, PersistenceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
                return Ok(self.first.clone());
            }
            Ok(self.later.clone())
        }

        async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    fn wash_and_fold() -> Service {
        Service {
            id: Uuid::new_v4(),
            name: "Wash & Fold".to_string(),
            description: "Everyday laundry, washed and folded".to_string(),
            icon: "shirt".to_string(),
            price_per_unit: 100.0,
            unit: "kg".to_string(),
            estimated_hours: 24,
        }
    }

    #[tokio::test]
    async fn test_fetch_services_without_session() {
        let service = wash_and_fold();
        let backend = Arc::new(InMemoryBackend::with_catalog(vec![service.clone()], Vec::new()));
        let store = CatalogStore::new(backend, Arc::new(Metrics::new().unwrap()));

        let services = store.fetch_services().await.unwrap();
        assert_eq!(services, vec![service.clone()]);
        assert_eq!(store.service(service.id).unwrap().name, "Wash & Fold");
    }

    #[tokio::test]
    async fn test_stale_service_fetch_returns_current_services() {
        let old_menu = wash_and_fold();
        let new_menu = Service {
            name: "Steam Press".to_string(),
            ..wash_and_fold()
        };
        let backend = Arc::new(HeldCatalog {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
            first: vec![old_menu],
            later: vec![new_menu.clone()],
        });
        let store = Arc::new(CatalogStore::new(backend.clone(), Arc::new(Metrics::new().unwrap())));

        let slow = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_services().await }
        });
        backend.entered.notified().await;

        assert_eq!(store.fetch_services().await.unwrap(), vec![new_menu.clone()]);

        backend.release.notify_one();
        let stale = slow.await.unwrap().unwrap();
        assert_eq!(stale, vec![new_menu.clone()]);
        assert_eq!(store.services(), vec![new_menu]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recorded() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_next("catalog.time_slots", "service unavailable").await;
        let store = CatalogStore::new(backend, Arc::new(Metrics::new().unwrap()));

        let err = store.fetch_time_slots().await.unwrap_err();
        assert_eq!(err.to_string(), "service unavailable");
        assert_eq!(store.snapshot().error.as_deref(), Some("service unavailable"));
    }

    #[test]
    fn test_available_dates_start_today() {
        let store = CatalogStore::new(Arc::new(InMemoryBackend::new()), Arc::new(Metrics::new().unwrap()));
        let dates = store.available_dates();
        assert_eq!(dates.len(), DEFAULT_DAYS_AHEAD as usize);
        assert_eq!(dates[0], Local::now().date_naive());
    }
}
