//! Typed change notification for the repositories
//!
//! Repositories publish to registered observers after every persisted
//! mutation. Observers carry no payload channel back into the core: the
//! configuration notification is deliberately zero-argument (subscribers
//! re-read the repository), the reporting notification is scoped so table
//! views can refresh only the affected rows.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Receives a notification whenever the configuration list changes
pub trait ConfigObserver: Send + Sync {
    /// A configuration was added, updated or deleted
    fn configurations_changed(&self);
}

/// Receives scoped notifications about report mutations
pub trait ReportObserver: Send + Sync {
    /// Events under `report_id` changed; `sources` lists the affected
    /// event source paths (empty for report creation)
    fn reports_changed(&self, config_id: Uuid, report_id: Uuid, sources: &[String]);
}

/// A registry of observers of one kind
///
/// Callbacks run outside the registry lock, so an observer may re-enter the
/// repository that notified it.
pub struct ObserverSet<T: ?Sized> {
    observers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for ObserverSet<T> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> ObserverSet<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer for the lifetime of the repository
    pub fn register(&self, observer: Arc<T>) {
        self.observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(observer);
    }

    /// Invoke `notify` on every registered observer
    pub fn for_each<F: FnMut(&T)>(&self, mut notify: F) {
        let snapshot = self
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for observer in &snapshot {
            notify(observer);
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for ObserverSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len();
        f.debug_struct("ObserverSet").field("count", &count).finish()
    }
}
