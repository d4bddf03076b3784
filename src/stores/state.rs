use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::metrics::Metrics;
use super::error::StoreError;

// ============================================================================
// Store State - published snapshots
// ============================================================================
//
// Every store owns one StateCell. Subscribers get a watch::Receiver and see an
// immutable Snapshot each time an operation finishes.
//
// Ordering of backend responses:
// - Each operation takes a ticket before awaiting the backend.
// - Deltas (add/update/delete) always apply on top of the current data.
// - Full replacements (fetch) only apply when their ticket is newer than the
//   snapshot's version; otherwise the response is stale and dropped.
// - clear() records its ticket as the cleared epoch. Anything ticketed at or
//   before it (deltas and failures included) belongs to the previous session
//   and is dropped.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub data: T,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Ticket of the last write applied to `data`
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T: Default> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            is_loading: false,
            error: None,
            version: 0,
            updated_at: None,
        }
    }
}

pub struct StateCell<T> {
    name: &'static str,
    tx: watch::Sender<Snapshot<T>>,
    tickets: AtomicU64,
    cleared_at: AtomicU64,
}

impl<T: Clone + Default> StateCell<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self {
            name,
            tx,
            tickets: AtomicU64::new(0),
            cleared_at: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    /// Read from the current data without cloning the whole snapshot
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow().data)
    }

    pub fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn latest_ticket(&self) -> u64 {
        self.tickets.load(Ordering::SeqCst)
    }

    /// Issued before the last clear()
    fn is_cleared(&self, ticket: u64) -> bool {
        ticket <= self.cleared_at.load(Ordering::SeqCst)
    }

    /// Mark an operation as in flight and hand out its ticket
    pub fn begin(&self) -> u64 {
        let ticket = self.ticket();
        self.tx.send_modify(|snapshot| {
            snapshot.is_loading = true;
            snapshot.error = None;
        });
        ticket
    }

    /// Record a failed operation. Data is left as it was.
    pub fn fail(&self, ticket: u64, message: impl Into<String>) {
        if self.is_cleared(ticket) {
            return;
        }
        let message = message.into();
        let loading = ticket < self.latest_ticket();
        self.tx.send_modify(|snapshot| {
            snapshot.is_loading = loading;
            snapshot.error = Some(message);
        });
    }

    /// Record an error that happened before any backend call
    pub fn reject(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|snapshot| snapshot.error = Some(message));
    }

    /// Apply a delta on top of the current data
    ///
    /// `apply` runs against a copy; on error nothing is published. Returns
    /// false when the ticket predates the last clear and the delta was dropped.
    pub fn commit<E>(&self, ticket: u64, apply: impl FnOnce(&mut T) -> Result<(), E>) -> Result<bool, E> {
        let loading = ticket < self.latest_ticket();
        let mut outcome = Ok(false);

        self.tx.send_if_modified(|snapshot| {
            if self.is_cleared(ticket) {
                return false;
            }
            let mut data = snapshot.data.clone();
            if let Err(err) = apply(&mut data) {
                outcome = Err(err);
                return false;
            }
            snapshot.data = data;
            snapshot.version = snapshot.version.max(ticket);
            snapshot.updated_at = Some(Utc::now());
            snapshot.is_loading = loading;
            snapshot.error = None;
            outcome = Ok(true);
            true
        });

        if let Ok(false) = outcome {
            tracing::debug!(store = self.name, ticket, "Dropping delta from before clear");
        }
        outcome
    }

    /// Apply a full replacement unless a newer write already landed
    ///
    /// Returns false when the response was stale and dropped.
    pub fn commit_if_current<E>(
        &self,
        ticket: u64,
        apply: impl FnOnce(&mut T) -> Result<(), E>,
    ) -> Result<bool, E> {
        let loading = ticket < self.latest_ticket();
        let mut outcome = Ok(false);

        self.tx.send_if_modified(|snapshot| {
            if ticket <= snapshot.version {
                return false;
            }
            let mut data = snapshot.data.clone();
            if let Err(err) = apply(&mut data) {
                outcome = Err(err);
                return false;
            }
            snapshot.data = data;
            snapshot.version = ticket;
            snapshot.updated_at = Some(Utc::now());
            snapshot.is_loading = loading;
            snapshot.error = None;
            outcome = Ok(true);
            true
        });

        if let Ok(false) = outcome {
            tracing::debug!(store = self.name, ticket, "Discarding stale response");
        }
        outcome
    }

    /// Local-only change; leaves version and loading flag alone
    pub fn edit<E>(&self, apply: impl FnOnce(&mut T) -> Result<(), E>) -> Result<(), E> {
        let mut outcome = Ok(());

        self.tx.send_if_modified(|snapshot| {
            let mut data = snapshot.data.clone();
            if let Err(err) = apply(&mut data) {
                outcome = Err(err);
                return false;
            }
            snapshot.data = data;
            snapshot.updated_at = Some(Utc::now());
            snapshot.error = None;
            true
        });

        outcome
    }

    /// Seed from a previously saved snapshot unless current data is newer
    pub fn restore(&self, saved: Snapshot<T>) -> bool {
        self.tx.send_if_modified(|snapshot| {
            let newer = match (saved.updated_at, snapshot.updated_at) {
                (Some(saved_at), Some(current_at)) => saved_at > current_at,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !newer {
                return false;
            }
            snapshot.data = saved.data;
            snapshot.updated_at = saved.updated_at;
            snapshot.is_loading = false;
            snapshot.error = None;
            true
        })
    }

    /// Drop all data; responses to requests issued before this are stale
    pub fn clear(&self) {
        let version = self.ticket();
        self.cleared_at.fetch_max(version, Ordering::SeqCst);
        self.tx.send_replace(Snapshot {
            version,
            ..Snapshot::default()
        });
    }
}

// ============================================================================
// Operation Bookkeeping
// ============================================================================

impl<T: Clone + Default> StateCell<T> {
    /// Record an error raised before any backend call
    pub(crate) fn refuse(&self, metrics: &Metrics, operation: &str, err: StoreError) -> StoreError {
        tracing::warn!(store = self.name, operation, error = %err, "Rejected before backend call");
        metrics.record_operation(self.name, operation, false);
        self.reject(err.to_string());
        err
    }

    /// Count the outcome and record a failure message in the snapshot
    pub(crate) fn settle<R>(
        &self,
        metrics: &Metrics,
        operation: &str,
        ticket: u64,
        result: Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        match &result {
            Ok(_) => metrics.record_operation(self.name, operation, true),
            Err(err) => {
                tracing::error!(store = self.name, operation, error = %err, "Store operation failed");
                metrics.record_operation(self.name, operation, false);
                self.fail(ticket, err.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_stale_fetch_is_discarded() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");

        let slow_fetch = cell.begin();
        let fast_fetch = cell.begin();

        let applied = cell
            .commit_if_current(fast_fetch, |data| {
                *data = vec![2];
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert!(applied);
        assert!(!cell.snapshot().is_loading);

        let applied = cell
            .commit_if_current(slow_fetch, |data| {
                *data = vec![1];
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert!(!applied);
        assert_eq!(cell.snapshot().data, vec![2]);
        assert_eq!(cell.snapshot().version, fast_fetch);
    }

    #[test]
    fn test_fetch_issued_before_mutation_is_stale() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");

        let fetch = cell.begin();
        let insert = cell.begin();
        cell.commit(insert, |data| {
            data.push(7);
            Ok::<_, Infallible>(())
        })
        .unwrap();

        let applied = cell
            .commit_if_current(fetch, |data| {
                data.clear();
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert!(!applied);
        assert_eq!(cell.snapshot().data, vec![7]);
    }

    #[test]
    fn test_failed_apply_publishes_nothing() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");
        let rx = cell.subscribe();

        let ticket = cell.ticket();
        let result = cell.commit(ticket, |data| {
            data.push(1);
            Err("nope")
        });

        assert_eq!(result, Err("nope"));
        assert!(cell.snapshot().data.is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_fail_keeps_data_and_records_message() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");
        let ticket = cell.begin();
        cell.commit(ticket, |data| {
            data.push(3);
            Ok::<_, Infallible>(())
        })
        .unwrap();

        let ticket = cell.begin();
        cell.fail(ticket, "connection refused");

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.data, vec![3]);
        assert_eq!(snapshot.error.as_deref(), Some("connection refused"));
        assert!(!snapshot.is_loading);
    }

    #[test]
    fn test_clear_invalidates_in_flight_fetch() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");
        let fetch = cell.begin();
        cell.clear();

        let applied = cell
            .commit_if_current(fetch, |data| {
                data.push(9);
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert!(!applied);
        assert!(cell.snapshot().data.is_empty());
    }

    #[test]
    fn test_clear_drops_in_flight_delta_and_failure() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");
        let insert = cell.begin();
        let update = cell.begin();
        cell.clear();

        let applied = cell
            .commit(insert, |data| {
                data.push(4);
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert!(!applied);
        cell.fail(update, "connection reset");

        let snapshot = cell.snapshot();
        assert!(snapshot.data.is_empty());
        assert!(snapshot.error.is_none());

        let after = cell.begin();
        assert!(cell
            .commit(after, |data| {
                data.push(5);
                Ok::<_, Infallible>(())
            })
            .unwrap());
        assert_eq!(cell.snapshot().data, vec![5]);
    }

    #[test]
    fn test_restore_only_when_newer() {
        let cell: StateCell<Vec<u32>> = StateCell::new("test");
        let ticket = cell.ticket();
        cell.commit(ticket, |data| {
            data.push(1);
            Ok::<_, Infallible>(())
        })
        .unwrap();

        let older = Snapshot {
            data: vec![0],
            updated_at: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Snapshot::default()
        };
        assert!(!cell.restore(older));
        assert_eq!(cell.snapshot().data, vec![1]);

        let newer = Snapshot {
            data: vec![5],
            updated_at: Some(Utc::now() + chrono::Duration::hours(1)),
            ..Snapshot::default()
        };
        assert!(cell.restore(newer));
        assert_eq!(cell.snapshot().data, vec![5]);
    }
}
