use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::notification::{NewNotification, Notification, NotificationFeed};
use crate::metrics::Metrics;
use crate::persistence::NotificationRepository;
use crate::session::SessionHandle;
use super::error::StoreError;
use super::state::{Snapshot, StateCell};

const STORE: &str = "notification";

pub struct NotificationStore {
    backend: Arc<dyn NotificationRepository>,
    session: SessionHandle,
    metrics: Arc<Metrics>,
    state: StateCell<NotificationFeed>,
}

impl NotificationStore {
    pub fn new(backend: Arc<dyn NotificationRepository>, session: SessionHandle, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            session,
            metrics,
            state: StateCell::new(STORE),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<NotificationFeed>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<NotificationFeed> {
        self.state.snapshot()
    }

    pub fn items(&self) -> Vec<Notification> {
        self.state.read(|feed| feed.items().to_vec())
    }

    /// Always derived from the feed itself
    pub fn unread_count(&self) -> usize {
        self.state.read(NotificationFeed::unread_count)
    }

    pub fn restore(&self, saved: Snapshot<NotificationFeed>) -> bool {
        self.state.restore(saved)
    }

    pub fn clear(&self) {
        self.state.clear();
    }

    pub async fn fetch_all(&self) -> Result<Vec<Notification>, StoreError> {
        let user_id = self.require_user("fetch_all")?;
        let ticket = self.state.begin();

        let result = async {
            let items = self.backend.list_notifications(user_id).await?;
            let applied = self.state.commit_if_current(ticket, |feed| {
                *feed = NotificationFeed::new(items);
                Ok::<_, StoreError>(())
            })?;
            if !applied {
                self.metrics.record_stale_response(STORE);
            }

            tracing::debug!(%user_id, applied, unread = self.unread_count(), "Fetched notifications");
            Ok::<_, StoreError>(self.items())
        }
        .await;

        self.state.settle(&self.metrics, "fetch_all", ticket, result)
    }

    /// Store a notification for the signed-in user and show it at the top
    pub async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let user_id = self.require_user("create")?;
        self.create_for(user_id, notification).await
    }

    /// Store a notification for `user_id`; it only reaches the feed while that
    /// user is still the one signed in
    pub(crate) async fn create_for(
        &self,
        user_id: Uuid,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        // None when the feed belongs to someone else
        let ticket = (self.session.user_id() == Some(user_id)).then(|| self.state.begin());

        let result = async {
            let stored = self.backend.insert_notification(user_id, notification).await?;
            if let Some(ticket) = ticket {
                self.state.commit(ticket, |feed| {
                    feed.push(stored.clone());
                    Ok::<_, StoreError>(())
                })?;
            }

            tracing::debug!(%user_id, notification_id = %stored.id, title = %stored.title, "Notification created");
            Ok::<_, StoreError>(stored)
        }
        .await;

        match ticket {
            Some(ticket) => self.state.settle(&self.metrics, "create", ticket, result),
            None => result,
        }
    }

    pub async fn mark_as_read(&self, id: Uuid) -> Result<(), StoreError> {
        let user_id = self.require_user("mark_as_read")?;
        let ticket = self.state.begin();

        let result = async {
            self.backend.mark_notification_read(user_id, id).await?;
            self.state.commit(ticket, |feed| {
                feed.mark_read(id);
                Ok::<_, StoreError>(())
            })?;
            Ok::<_, StoreError>(())
        }
        .await;

        self.state.settle(&self.metrics, "mark_as_read", ticket, result)
    }

    pub async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        let user_id = self.require_user("mark_all_as_read")?;
        let ticket = self.state.begin();

        let result = async {
            self.backend.mark_all_notifications_read(user_id).await?;
            self.state.commit(ticket, |feed| {
                feed.mark_all_read();
                Ok::<_, StoreError>(())
            })?;
            tracing::info!(%user_id, "Marked all notifications read");
            Ok::<_, StoreError>(())
        }
        .await;

        self.state.settle(&self.metrics, "mark_all_as_read", ticket, result)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let user_id = self.require_user("delete")?;
        let ticket = self.state.begin();

        let result = async {
            self.backend.delete_notification(user_id, id).await?;
            self.state.commit(ticket, |feed| {
                feed.remove(id);
                Ok::<_, StoreError>(())
            })?;
            Ok::<_, StoreError>(())
        }
        .await;

        self.state.settle(&self.metrics, "delete", ticket, result)
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let user_id = self.require_user("clear_all")?;
        let ticket = self.state.begin();

        let result = async {
            self.backend.clear_notifications(user_id).await?;
            self.state.commit(ticket, |feed| {
                feed.clear();
                Ok::<_, StoreError>(())
            })?;
            tracing::info!(%user_id, "Cleared notifications");
            Ok::<_, StoreError>(())
        }
        .await;

        self.state.settle(&self.metrics, "clear_all", ticket, result)
    }

    fn require_user(&self, operation: &str) -> Result<Uuid, StoreError> {
        self.session
            .user_id()
            .ok_or_else(|| self.state.refuse(&self.metrics, operation, StoreError::NotAuthenticated))
    }
}
