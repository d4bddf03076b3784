use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::resource::{Address, PaymentMethod, Resource, ResourceCollection, ResourceCommand, ResourceError};
use crate::kernel::Aggregate;
use crate::metrics::Metrics;
use crate::persistence::ResourceRepository;
use crate::session::SessionHandle;
use super::error::StoreError;
use super::state::{Snapshot, StateCell};

// ============================================================================
// Resource Store - a user's addresses or payment methods
// ============================================================================
//
// Flow of every mutation:
// 1. Session check (NotAuthenticated, no backend call)
// 2. Local existence check for update/delete (NotFound, no backend call)
// 3. Backend call
// 4. The persisted record is fed to the ResourceCollection aggregate, which
//    keeps the single-default invariant for the published snapshot. Deleting
//    the default follows whichever entry the backend promoted.
//
// On any error the snapshot keeps its data and records the message.
//
// ============================================================================

pub type AddressStore = ResourceStore<Address>;
pub type PaymentMethodStore = ResourceStore<PaymentMethod>;

pub struct ResourceStore<R: Resource> {
    backend: Arc<dyn ResourceRepository<R>>,
    session: SessionHandle,
    metrics: Arc<Metrics>,
    state: StateCell<ResourceCollection<R>>,
}

impl<R: Resource> ResourceStore<R> {
    pub fn new(backend: Arc<dyn ResourceRepository<R>>, session: SessionHandle, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            session,
            metrics,
            state: StateCell::new(R::KIND),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<ResourceCollection<R>>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<ResourceCollection<R>> {
        self.state.snapshot()
    }

    pub fn items(&self) -> Vec<R> {
        self.state.read(|c| c.items().to_vec())
    }

    pub fn get(&self, id: Uuid) -> Option<R> {
        self.state.read(|c| c.get(id).cloned())
    }

    /// The default entry, or the first one if none is flagged
    pub fn default(&self) -> Option<R> {
        self.state.read(|c| c.default_entry().cloned())
    }

    pub fn restore(&self, saved: Snapshot<ResourceCollection<R>>) -> bool {
        self.state.restore(saved)
    }

    pub fn clear(&self) {
        self.state.clear();
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn fetch_all(&self) -> Result<Vec<R>, StoreError> {
        let user_id = self.require_user("fetch_all")?;
        let ticket = self.state.begin();

        let result = async {
            let resources = self.backend.list(user_id).await?;
            let count = resources.len();

            let applied = self.state.commit_if_current(ticket, |collection| {
                collection
                    .execute(&ResourceCommand::ReplaceAll { resources })
                    .map(|_| ())
            })?;
            if !applied {
                self.metrics.record_stale_response(R::KIND);
            }

            tracing::debug!(kind = R::KIND, %user_id, count, applied, "Fetched resources");
            Ok::<_, StoreError>(self.items())
        }
        .await;

        self.state.settle(&self.metrics, "fetch_all", ticket, result)
    }

    pub async fn add(&self, draft: R::Draft) -> Result<R, StoreError> {
        let user_id = self.require_user("add")?;
        let ticket = self.state.begin();

        let result = async {
            let inserted = self.backend.insert(user_id, draft).await?;
            let id = inserted.id();

            self.state.commit(ticket, |collection| {
                collection
                    .execute(&ResourceCommand::Insert { resource: inserted.clone() })
                    .map(|_| ())
            })?;

            let stored = self.get(id).unwrap_or(inserted);
            tracing::info!(kind = R::KIND, %user_id, id = %id, is_default = stored.is_default(), "Resource added");
            Ok::<_, StoreError>(stored)
        }
        .await;

        self.state.settle(&self.metrics, "add", ticket, result)
    }

    pub async fn update(&self, id: Uuid, update: R::Update) -> Result<R, StoreError> {
        let user_id = self.require_user("update")?;
        self.require_local(id, "update")?;
        let ticket = self.state.begin();

        let result = async {
            let updated = self.backend.update(user_id, id, &update).await?;

            self.state.commit(ticket, |collection| {
                collection
                    .execute(&ResourceCommand::Update { resource: updated.clone() })
                    .map(|_| ())
            })?;

            tracing::info!(kind = R::KIND, %user_id, id = %id, ?update, "Resource updated");
            Ok::<_, StoreError>(self.get(id).unwrap_or(updated))
        }
        .await;

        self.state.settle(&self.metrics, "update", ticket, result)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let user_id = self.require_user("delete")?;
        self.require_local(id, "delete")?;
        let ticket = self.state.begin();

        let result = async {
            let promoted = self.backend.delete(user_id, id).await?;

            self.state.commit(ticket, |collection| {
                collection.execute(&ResourceCommand::Remove { id, promoted }).map(|_| ())
            })?;

            tracing::info!(kind = R::KIND, %user_id, id = %id, promoted = ?promoted, "Resource deleted");
            Ok::<_, StoreError>(())
        }
        .await;

        self.state.settle(&self.metrics, "delete", ticket, result)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require_user(&self, operation: &str) -> Result<Uuid, StoreError> {
        match self.session.user_id() {
            Some(user_id) => Ok(user_id),
            None => Err(self.state.refuse(&self.metrics, operation, StoreError::NotAuthenticated)),
        }
    }

    fn require_local(&self, id: Uuid, operation: &str) -> Result<(), StoreError> {
        if self.get(id).is_some() {
            return Ok(());
        }
        Err(self.state.refuse(&self.metrics, operation, ResourceError::NotFound { kind: R::KIND, id }.into()))
    }
}
