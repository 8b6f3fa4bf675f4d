// ── Poll observers ──
//
// Callback registry notified after every poll attempt. Delivery is
// synchronous, in registration order, and isolated: an observer that
// errors or panics is logged and skipped.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::error::PollError;
use crate::model::StateSnapshot;

/// Outcome of one poll attempt, as delivered to observers.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A new snapshot replaced the previous one.
    Updated(Arc<StateSnapshot>),
    /// The poll failed; the previous snapshot is still current.
    Failed(PollError),
}

impl PollEvent {
    pub fn snapshot(&self) -> Option<&Arc<StateSnapshot>> {
        match self {
            Self::Updated(snapshot) => Some(snapshot),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives [`PollEvent`]s from a coordinator.
///
/// Implemented for any `Fn(&PollEvent) -> Result<(), ObserverError>`.
pub trait SnapshotObserver: Send + Sync {
    fn on_poll(&self, event: &PollEvent) -> Result<(), ObserverError>;
}

impl<F> SnapshotObserver for F
where
    F: Fn(&PollEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_poll(&self, event: &PollEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Entry = (SubscriptionId, Arc<dyn SnapshotObserver>);

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl ObserverRegistry {
    pub(crate) fn subscribe(&self, observer: Arc<dyn SnapshotObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Returns `false` if `id` was not (or no longer) registered.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every registered observer.
    ///
    /// Works on a copy of the list, so observers may (un)subscribe from
    /// inside their callback; such changes apply from the next event.
    pub(crate) fn notify(&self, event: &PollEvent) {
        let entries: Vec<Entry> = self.lock().clone();

        for (id, observer) in entries {
            match catch_unwind(AssertUnwindSafe(|| observer.on_poll(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription = %id, error = %e, "observer failed to handle poll event");
                }
                Err(_) => {
                    warn!(subscription = %id, "observer panicked while handling poll event");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PduError;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn SnapshotObserver> {
        let log = Arc::clone(log);
        Arc::new(move |_: &PollEvent| -> Result<(), ObserverError> {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(name);
            Ok(())
        })
    }

    fn failed() -> PollEvent {
        PollEvent::Failed(PollError::new(PduError::Timeout))
    }

    #[test]
    fn observers_run_in_registration_order() {
        let registry = ObserverRegistry::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(recorder(&log, "first"));
        registry.subscribe(recorder(&log, "second"));
        registry.subscribe(recorder(&log, "third"));

        registry.notify(&failed());

        assert_eq!(*log.lock().unwrap_or_else(PoisonError::into_inner), vec![
            "first", "second", "third"
        ]);
    }

    #[test]
    fn failing_and_panicking_observers_do_not_block_delivery() {
        let registry = ObserverRegistry::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(Arc::new(|_: &PollEvent| -> Result<(), ObserverError> {
            Err("render failed".into())
        }));
        registry.subscribe(Arc::new(|_: &PollEvent| -> Result<(), ObserverError> {
            panic!("observer bug")
        }));
        registry.subscribe(recorder(&log, "survivor"));

        registry.notify(&failed());

        assert_eq!(*log.lock().unwrap_or_else(PoisonError::into_inner), vec!["survivor"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let registry = ObserverRegistry::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = registry.subscribe(recorder(&log, "first"));
        registry.subscribe(recorder(&log, "second"));

        assert!(registry.unsubscribe(first));
        assert!(!registry.unsubscribe(first));
        assert_eq!(registry.len(), 1);

        registry.notify(&failed());
        assert_eq!(*log.lock().unwrap_or_else(PoisonError::into_inner), vec!["second"]);
    }
}
