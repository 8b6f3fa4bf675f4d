// ── Poll coordinator ──
//
// Owns the device client and the authoritative view of device state.
// Fetches run as spawned tasks; every caller that arrives while one is
// running attaches to its shared outcome instead of starting another.

mod observers;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DeviceClient, OutletConfigMap, RawStatus};
use crate::error::{PduError, PollError};
use crate::model::StateSnapshot;
use crate::stream::PollEventStream;

pub use observers::{ObserverError, PollEvent, SnapshotObserver, SubscriptionId};
use observers::ObserverRegistry;

type PollOutcome = Result<Arc<StateSnapshot>, PollError>;

/// Poll events buffered per [`PollEventStream`] before it lags.
const EVENT_BUFFER: usize = 16;

// ── In-flight bookkeeping ────────────────────────────────────────

/// The fetch currently running, if any. `ticket` orders fetches by
/// start time.
#[derive(Clone)]
struct InFlight {
    ticket: u64,
    outcome: Shared<BoxFuture<'static, PollOutcome>>,
}

#[derive(Default)]
struct FlightSlot {
    next_ticket: u64,
    current: Option<InFlight>,
}

// ── PollCoordinator ──────────────────────────────────────────────

/// Single-flight poller for one PDU.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Publishes each new
/// [`StateSnapshot`] to `latest()`, and every poll outcome to subscribed
/// [`SnapshotObserver`]s and [`PollEventStream`]s.
///
/// The scheduled poll only holds a weak reference: dropping the last
/// clone stops polling.
pub struct PollCoordinator<C> {
    inner: Arc<CoordinatorInner<C>>,
}

impl<C> Clone for PollCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<C> {
    client: Arc<C>,
    interval: Duration,
    latest: ArcSwapOption<StateSnapshot>,
    last_failure: ArcSwapOption<PollError>,
    events: broadcast::Sender<PollEvent>,
    /// Bumped when any fetch completes; the schedule restarts from it.
    completions: watch::Sender<u64>,
    flight: Mutex<FlightSlot>,
    /// Held while a fetch result is published; shutdown waits on it.
    publish: tokio::sync::Mutex<()>,
    observers: ObserverRegistry,
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<C: DeviceClient> PollCoordinator<C> {
    /// Create a coordinator. Does NOT poll -- call [`refresh()`](Self::refresh)
    /// for an immediate fetch and [`start()`](Self::start) for the schedule.
    pub fn new(client: Arc<C>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (completions, _) = watch::channel(0);

        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                interval,
                latest: ArcSwapOption::empty(),
                last_failure: ArcSwapOption::empty(),
                events,
                completions,
                flight: Mutex::new(FlightSlot::default()),
                publish: tokio::sync::Mutex::new(()),
                observers: ObserverRegistry::default(),
                cancel: CancellationToken::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    /// The device client shared with the switch command path.
    pub fn client(&self) -> &Arc<C> {
        &self.inner.client
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Fetch device state, coalescing with any fetch already running.
    ///
    /// Without `force`, a caller that finds a fetch in flight waits for it
    /// and returns its outcome. With `force`, the caller also waits for
    /// the in-flight fetch but only returns once a fetch that started
    /// after this call has completed. Forced callers that overlap share
    /// that follow-up fetch; two fetches never run at once.
    pub async fn refresh(&self, force: bool) -> Result<Arc<StateSnapshot>, PollError> {
        let mut not_before: Option<u64> = None;

        loop {
            let flight = {
                let mut slot = self.inner.lock_flight();
                if self.inner.cancel.is_cancelled() {
                    return Err(PollError::new(PduError::Shutdown));
                }
                if force && not_before.is_none() {
                    not_before = Some(slot.next_ticket);
                }
                match slot.current.clone() {
                    Some(flight) => flight,
                    None => self.begin_fetch(&mut slot),
                }
            };

            let outcome = flight.outcome.await;

            match not_before {
                Some(ticket) if flight.ticket < ticket => {
                    debug!(
                        joined = flight.ticket,
                        "joined fetch predates forced refresh, polling again"
                    );
                }
                _ => return outcome,
            }
        }
    }

    /// Spawn a fetch and record it as in flight. Caller holds the slot lock.
    fn begin_fetch(&self, slot: &mut FlightSlot) -> InFlight {
        let ticket = slot.next_ticket;
        slot.next_ticket += 1;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_fetch(ticket).await });

        let outcome = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(PollError::new(PduError::Internal(format!(
                    "fetch task failed: {e}"
                )))),
            }
        }
        .boxed()
        .shared();

        let flight = InFlight { ticket, outcome };
        slot.current = Some(flight.clone());
        flight
    }

    // ── Scheduled polling ────────────────────────────────────────

    /// Spawn the scheduled poll loop. Idempotent.
    ///
    /// Each poll starts `interval` after the previous one finished,
    /// whoever requested it, so a slow device stretches the schedule
    /// instead of stacking polls.
    pub fn start(&self) {
        let mut poller = self.inner.lock_poller();
        if poller.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }
        let task = poll_task(
            Arc::downgrade(&self.inner),
            self.inner.interval,
            self.inner.completions.subscribe(),
            self.inner.cancel.clone(),
        );
        *poller = Some(tokio::spawn(task));
        debug!(interval_secs = self.inner.interval.as_secs(), "scheduled polling started");
    }

    /// Stop polling and detach from the device.
    ///
    /// The scheduled poll is abandoned. A fetch still running is allowed
    /// to finish, but its result is discarded and observers are not
    /// called. A result already being published when this is called
    /// finishes publishing before `shutdown()` returns; nothing is
    /// published after. Subsequent `refresh()` calls fail with
    /// [`PduError::Shutdown`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        drop(self.inner.publish.lock().await);

        let handle = self.inner.lock_poller().take();
        if let Some(handle) = handle {
            handle.abort();
            match handle.await {
                Err(e) if !e.is_cancelled() => warn!(error = %e, "poll task ended abnormally"),
                _ => {}
            }
        }

        info!("poll coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── State observation ────────────────────────────────────────

    /// Most recent successful snapshot. `None` only before the first
    /// successful poll. Never blocks.
    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.inner.latest.load_full()
    }

    /// Failure marker of the most recent attempt, cleared by the next
    /// successful poll.
    pub fn last_failure(&self) -> Option<PollError> {
        self.inner.last_failure.load_full().map(|e| (*e).clone())
    }

    /// `true` unless the most recent poll attempt failed.
    pub fn last_update_success(&self) -> bool {
        self.inner.last_failure.load().is_none()
    }

    /// Register an observer for every subsequent poll outcome.
    pub fn subscribe(&self, observer: Arc<dyn SnapshotObserver>) -> SubscriptionId {
        self.inner.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Stream every subsequent poll outcome, failures included.
    ///
    /// Ends when the coordinator is dropped.
    pub fn events(&self) -> PollEventStream {
        PollEventStream::new(self.inner.events.subscribe())
    }
}

impl<C: DeviceClient> CoordinatorInner<C> {
    /// Body of one spawned fetch: read the device, publish, notify.
    async fn run_fetch(self: Arc<Self>, ticket: u64) -> PollOutcome {
        let _slot = FlightRelease {
            flight: &self.flight,
            ticket,
        };

        debug!(ticket, "polling PDU");
        let result = self.fetch().await;

        let _publishing = self.publish.lock().await;
        if self.cancel.is_cancelled() {
            debug!(ticket, "discarding poll result after shutdown");
            return Err(PollError::new(PduError::Shutdown));
        }

        match result {
            Ok((status, outlets)) => {
                let previous = self.latest.load_full();
                let fetched_at = next_fetch_time(previous.as_deref());
                let sequence = previous.as_ref().map_or(1, |p| p.sequence() + 1);
                let snapshot = Arc::new(StateSnapshot::from_raw(
                    status, outlets, fetched_at, sequence,
                ));

                self.latest.store(Some(Arc::clone(&snapshot)));
                self.last_failure.store(None);
                debug!(ticket, sequence, "poll complete");

                self.announce(PollEvent::Updated(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            Err(e) => {
                let failure = PollError::new(e);
                warn!(ticket, error = %failure, "poll failed, keeping last snapshot");

                self.last_failure.store(Some(Arc::new(failure.clone())));
                self.announce(PollEvent::Failed(failure.clone()));
                Err(failure)
            }
        }
    }

    /// Observers first, then streams, then the schedule.
    fn announce(&self, event: PollEvent) {
        self.observers.notify(&event);
        // No live stream is fine.
        self.events.send(event).ok();
        self.completions.send_modify(|n| *n += 1);
    }

    /// Status first, then outlet names. Either failing fails the poll.
    async fn fetch(&self) -> Result<(RawStatus, OutletConfigMap), PduError> {
        let status = self.client.fetch_status().await?;
        let outlets = self.client.fetch_outlet_config().await?;
        Ok((status, outlets))
    }

    fn lock_flight(&self) -> MutexGuard<'_, FlightSlot> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight slot when a fetch task ends, including by panic.
struct FlightRelease<'a> {
    flight: &'a Mutex<FlightSlot>,
    ticket: u64,
}

impl Drop for FlightRelease<'_> {
    fn drop(&mut self) {
        let mut slot = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.current.as_ref().is_some_and(|f| f.ticket == self.ticket) {
            slot.current = None;
        }
    }
}

/// Wall-clock time, nudged forward if the clock has not advanced past
/// the previous snapshot.
fn next_fetch_time(previous: Option<&StateSnapshot>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev.fetched_at() => {
            prev.fetched_at() + chrono::Duration::microseconds(1)
        }
        _ => now,
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Poll every `interval`, measured from the end of the previous poll.
///
/// Stops on cancellation or once every coordinator handle is gone.
async fn poll_task<C: DeviceClient>(
    inner: Weak<CoordinatorInner<C>>,
    interval: Duration,
    mut completions: watch::Receiver<u64>,
    cancel: CancellationToken,
) {
    loop {
        completions.borrow_and_update();

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = completions.changed() => {
                if changed.is_err() {
                    break;
                }
                // Someone else polled; restart the wait from now.
                continue;
            }
            () = tokio::time::sleep(interval) => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = PollCoordinator { inner };

        // Failures already reached observers.
        if let Err(e) = coordinator.refresh(false).await {
            debug!(error = %e, "scheduled poll failed");
        }
    }

    debug!("scheduled polling stopped");
}
