//! Polling change detection with subscriber fan-out
//!
//! A [`ChangePoller`] owns one subscriber registry, one cached snapshot and at
//! most one timer task. Registering the first subscriber starts the timer;
//! removing the last one cancels it and forgets the cached snapshot.
//!
//! Every tick reads a fresh snapshot from its [`SnapshotSource`] and compares
//! it to the cached one with `PartialEq`. Subscribers only hear about
//! snapshots that differ from the previous tick's, so changes that happen and
//! revert between two ticks are never observed, and detection lags a change
//! by up to one poll interval.
//!
//! Failures stay inside the poller: a failed read is logged and the next tick
//! runs on schedule; a subscriber that errors or panics is logged and its
//! siblings still run.

use crate::error::{CallbackError, Result, SdkError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Default poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Callback invoked with every changed snapshot.
///
/// Identity is the `Arc` allocation: registering a clone of the same handle
/// twice keeps a single entry, and [`ChangePoller::off_update`] removes by
/// pointer, not by behaviour.
pub type Subscriber<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure into a [`Subscriber`] handle
pub fn subscriber<T, F>(f: F) -> Subscriber<T>
where
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Produces snapshots for the poller
#[async_trait]
pub trait SnapshotSource<T>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
}

/// Result of one poll tick
#[derive(Debug)]
pub(crate) enum TickOutcome {
    /// The read failed; nothing was dispatched
    ReadFailed(SdkError),
    /// The snapshot equals the cached one
    Unchanged,
    /// The snapshot was new; one entry per subscriber, in registry order
    Dispatched(Vec<std::result::Result<(), CallbackError>>),
    /// The poller was stopped while the read was in flight
    Cancelled,
}

struct PollerState<T> {
    subscribers: Vec<Subscriber<T>>,
    last_seen: Option<T>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever a timer starts or stops, so a tick that raced a
    /// cancellation cannot write into the next session's cache.
    generation: u64,
    destroyed: bool,
}

impl<T> PollerState<T> {
    /// A task that died from a panicking source counts as stopped
    fn timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.last_seen = None;
        self.generation += 1;
    }
}

/// Interval-driven change detector with a subscriber registry
pub struct ChangePoller<T> {
    source: Arc<dyn SnapshotSource<T>>,
    interval: Duration,
    state: Arc<Mutex<PollerState<T>>>,
}

impl<T> ChangePoller<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn SnapshotSource<T>>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            state: Arc::new(Mutex::new(PollerState {
                subscribers: Vec::new(),
                last_seen: None,
                timer: None,
                generation: 0,
                destroyed: false,
            })),
        }
    }

    /// Period between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a subscriber, starting the timer if it is not running.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`SdkError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn on_update(&self, callback: Subscriber<T>) -> Result<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SdkError::Destroyed);
        }

        let runtime = if state.timer_running() {
            None
        } else {
            Some(tokio::runtime::Handle::try_current().map_err(|_| SdkError::NoRuntime)?)
        };

        if !state.subscribers.iter().any(|s| Arc::ptr_eq(s, &callback)) {
            state.subscribers.push(callback);
        }

        if let Some(runtime) = runtime {
            if state.timer.take().is_some() {
                warn!("poll task exited unexpectedly, restarting");
            }
            state.last_seen = None;
            state.generation += 1;
            let generation = state.generation;
            let source = Arc::clone(&self.source);
            let shared = Arc::clone(&self.state);
            let period = self.interval.max(Duration::from_millis(1));
            let first_tick = Instant::now() + period;

            state.timer = Some(runtime.spawn(async move {
                let mut ticker = interval_at(first_tick, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    match poll_once(source.as_ref(), &shared, generation).await {
                        TickOutcome::ReadFailed(e) => warn!(error = %e, "error polling oracle"),
                        TickOutcome::Dispatched(results) => {
                            debug!(notified = results.len(), "tick dispatched")
                        }
                        TickOutcome::Unchanged => {}
                        TickOutcome::Cancelled => break,
                    }
                }
            }));

            info!(
                interval_ms = period.as_millis() as u64,
                subscribers = state.subscribers.len(),
                "polling started"
            );
        }

        Ok(())
    }

    /// Remove a subscriber; stop polling when none are left
    pub fn off_update(&self, callback: &Subscriber<T>) {
        let mut state = self.state.lock();
        state.subscribers.retain(|s| !Arc::ptr_eq(s, callback));

        if state.subscribers.is_empty() && state.timer.is_some() {
            state.stop_timer();
            info!("polling stopped, no subscribers left");
        }
    }

    /// Cancel the timer and clear the registry.
    ///
    /// Terminal: later calls to [`on_update`](Self::on_update) are rejected.
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.stop_timer();
        state.subscribers.clear();
        state.destroyed = true;
        debug!("poller destroyed");
    }

    /// Whether the timer task is currently scheduled
    pub fn is_polling(&self) -> bool {
        self.state.lock().timer_running()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Last snapshot dispatched to subscribers, if any
    #[cfg(test)]
    pub(crate) fn last_seen(&self) -> Option<T> {
        self.state.lock().last_seen.clone()
    }

    /// Run one tick immediately, outside the timer schedule
    #[cfg(test)]
    pub(crate) async fn poll_now(&self) -> TickOutcome {
        let generation = self.state.lock().generation;
        poll_once(self.source.as_ref(), &self.state, generation).await
    }
}

impl<T> Drop for ChangePoller<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
        }
    }
}

async fn poll_once<T>(
    source: &dyn SnapshotSource<T>,
    state: &Mutex<PollerState<T>>,
    generation: u64,
) -> TickOutcome
where
    T: Clone + PartialEq,
{
    let snapshot = match source.fetch().await {
        Ok(snapshot) => snapshot,
        Err(e) => return TickOutcome::ReadFailed(SdkError::PollTick(e.to_string())),
    };

    let subscribers = {
        let mut state = state.lock();
        if state.generation != generation || state.destroyed {
            return TickOutcome::Cancelled;
        }
        if state.last_seen.as_ref() == Some(&snapshot) {
            return TickOutcome::Unchanged;
        }
        state.last_seen = Some(snapshot.clone());
        state.subscribers.clone()
    };

    debug!(subscribers = subscribers.len(), "snapshot changed, notifying");
    let results = dispatch(&subscribers, &snapshot);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        error!(error = %err, "error in update callback");
    }
    TickOutcome::Dispatched(results)
}

/// Invoke each subscriber once, capturing its outcome separately
fn dispatch<T>(
    subscribers: &[Subscriber<T>],
    snapshot: &T,
) -> Vec<std::result::Result<(), CallbackError>> {
    subscribers
        .iter()
        .enumerate()
        .map(
            |(index, callback)| match catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(CallbackError::Failed {
                    index,
                    message: format!("{e:#}"),
                }),
                Err(payload) => Err(CallbackError::Panicked {
                    index,
                    message: panic_message(payload.as_ref()),
                }),
            },
        )
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl SnapshotSource<u64> for Counter {
        async fn fetch(&self) -> Result<u64> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) as u64)
        }
    }

    fn counting_poller() -> ChangePoller<u64> {
        ChangePoller::new(
            Arc::new(Counter(Arc::new(AtomicUsize::new(0)))),
            DEFAULT_POLL_INTERVAL,
        )
    }

    #[test]
    fn test_dispatch_isolates_failures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let ok = {
            let hits = hits.clone();
            subscriber(move |_: &u64| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let failing = subscriber(|_: &u64| Err(anyhow::anyhow!("boom")));
        let panicking = subscriber(|_: &u64| panic!("kaboom"));

        let results = dispatch(&[failing, panicking, ok.clone(), ok], &7);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(matches!(
            &results[0],
            Err(CallbackError::Failed { index: 0, message }) if message == "boom"
        ));
        assert!(matches!(
            &results[1],
            Err(CallbackError::Panicked { index: 1, message }) if message == "kaboom"
        ));
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_on_update_requires_runtime() {
        let poller = counting_poller();
        let err = poller.on_update(subscriber(|_: &u64| Ok(()))).unwrap_err();
        assert!(matches!(err, SdkError::NoRuntime));
        assert!(!poller.is_polling());
        assert_eq!(poller.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_same_handle_registered_once() {
        let poller = counting_poller();
        let handle = subscriber(|_: &u64| Ok(()));

        poller.on_update(handle.clone()).unwrap();
        poller.on_update(handle.clone()).unwrap();
        assert_eq!(poller.subscriber_count(), 1);

        // Equal behaviour, different allocation
        poller.on_update(subscriber(|_: &u64| Ok(()))).unwrap();
        assert_eq!(poller.subscriber_count(), 2);

        poller.destroy();
    }

    #[tokio::test]
    async fn test_poll_now_dispatches_only_changes() {
        let poller = ChangePoller::new(Arc::new(Fixed(9)), DEFAULT_POLL_INTERVAL);

        let first = poller.poll_now().await;
        assert!(matches!(first, TickOutcome::Dispatched(ref r) if r.is_empty()));
        assert_eq!(poller.last_seen(), Some(9));

        assert!(matches!(poller.poll_now().await, TickOutcome::Unchanged));
    }

    struct Fixed(u64);

    #[async_trait]
    impl SnapshotSource<u64> for Fixed {
        async fn fetch(&self) -> Result<u64> {
            Ok(self.0)
        }
    }

    async fn run_ticks(period: Duration, ticks: usize) {
        for _ in 0..ticks {
            tokio::time::advance(period).await;
            for _ in 0..16 {
                tokio::task::yield_now().await;
            }
        }
    }

    fn counting_subscriber(hits: &Arc<AtomicUsize>) -> Subscriber<u64> {
        let hits = hits.clone();
        subscriber(move |_: &u64| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_poll_does_not_suppress_first_dispatch() {
        let poller = ChangePoller::new(Arc::new(Fixed(9)), DEFAULT_POLL_INTERVAL);
        assert!(matches!(poller.poll_now().await, TickOutcome::Dispatched(_)));
        assert_eq!(poller.last_seen(), Some(9));

        let hits = Arc::new(AtomicUsize::new(0));
        poller.on_update(counting_subscriber(&hits)).unwrap();
        assert_eq!(poller.last_seen(), None);

        run_ticks(DEFAULT_POLL_INTERVAL, 3).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        poller.destroy();
    }

    /// Panics on its first read, then counts reads
    struct FlakySource(AtomicUsize);

    #[async_trait]
    impl SnapshotSource<u64> for FlakySource {
        async fn fetch(&self) -> Result<u64> {
            let call = self.0.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                panic!("source blew up");
            }
            Ok(call as u64)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_poll_task_is_reported_and_restarted() {
        let poller = ChangePoller::new(
            Arc::new(FlakySource(AtomicUsize::new(0))),
            DEFAULT_POLL_INTERVAL,
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = counting_subscriber(&hits);

        poller.on_update(handle.clone()).unwrap();
        run_ticks(DEFAULT_POLL_INTERVAL, 1).await;
        assert!(!poller.is_polling());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        poller.on_update(handle).unwrap();
        assert!(poller.is_polling());
        assert_eq!(poller.subscriber_count(), 1);

        run_ticks(DEFAULT_POLL_INTERVAL, 1).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        poller.destroy();
    }

    #[tokio::test]
    async fn test_destroy_rejects_late_subscribers() {
        let poller = counting_poller();
        poller.on_update(subscriber(|_: &u64| Ok(()))).unwrap();
        assert!(poller.is_polling());

        poller.destroy();
        assert!(!poller.is_polling());
        assert_eq!(poller.subscriber_count(), 0);

        let err = poller.on_update(subscriber(|_: &u64| Ok(()))).unwrap_err();
        assert!(matches!(err, SdkError::Destroyed));
        assert!(!poller.is_polling());
    }
}
