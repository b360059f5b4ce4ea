//! Live feed engine — drives a [`FeedCore`] on tokio time.
//!
//! A single driver task sleeps until the next due event, applies it, and
//! publishes an immutable [`FeedSnapshot`]. Readers never touch the core:
//! `snapshot`/`stats` read the last published `Arc` from a `watch` channel,
//! so they observe either the state before a change or after it, never a
//! partial one.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::feed::FeedCore;
use super::sampler::{RandomSampler, Sampler};
use super::stats::FeedStats;
use crate::config::FeedConfig;
use crate::types::{FeedError, FeedFilter, Transaction};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable view of the feed at one revision.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub revision: u64,
    pub running: bool,
    pub paused: bool,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}

impl FeedSnapshot {
    fn capture(core: &FeedCore) -> Self {
        Self {
            revision: core.revision(),
            running: core.is_running(),
            paused: core.is_paused(),
            transactions: core.snapshot(FeedFilter::All),
        }
    }

    pub fn filtered(&self, filter: FeedFilter) -> Vec<Transaction> {
        filter.apply(&self.transactions)
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats::from_transactions(&self.transactions)
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

type Listener = Arc<dyn Fn(&FeedSnapshot) + Send + Sync>;

struct Shared {
    core: Mutex<FeedCore>,
    /// Tokio instant of virtual millisecond zero.
    origin: Instant,
    published: watch::Sender<Arc<FeedSnapshot>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    dispatch: Mutex<Dispatch>,
    /// Wakes the driver after pause/resume/start.
    wake: Notify,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Listener delivery state. One caller at a time delivers, always the
/// latest published snapshot, so listeners see strictly increasing revisions.
#[derive(Debug, Default)]
struct Dispatch {
    delivering: bool,
    delivered: u64,
}

/// Lock ignoring poison; the guarded state stays consistent between calls.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Swap in a newer snapshot and notify listeners. Older revisions that
    /// lost a race are dropped.
    fn publish(&self, snapshot: FeedSnapshot) {
        let snapshot = Arc::new(snapshot);
        let fresh = self.published.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = Arc::clone(&snapshot);
                true
            } else {
                false
            }
        });
        if fresh {
            self.dispatch();
        }
    }

    /// Deliver the latest snapshot until listeners are caught up.
    ///
    /// If another caller is already delivering, it picks up the newer
    /// snapshot before it stops, so this returns at once. That also makes
    /// re-entrant calls from inside a listener safe.
    fn dispatch(&self) {
        {
            let mut state = lock(&self.dispatch);
            if state.delivering {
                return;
            }
            state.delivering = true;
        }

        loop {
            let latest = {
                let mut state = lock(&self.dispatch);
                // Read under the dispatch lock so a publish racing with the
                // final check either is seen here or finds `delivering` unset.
                let latest = Arc::clone(&*self.published.borrow());
                if latest.revision <= state.delivered {
                    state.delivering = false;
                    return;
                }
                state.delivered = latest.revision;
                latest
            };

            // Listeners run without any lock so they may call back into the engine.
            let listeners: Vec<Listener> = lock(&self.listeners)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&latest);
            }
        }
    }

    /// Apply and publish every change due by now, one at a time.
    fn run_due(&self) {
        let now_ms = self.now_ms();
        loop {
            let (event, snapshot) = {
                let mut core = lock(&self.core);
                let Some(event) = core.step(now_ms) else {
                    break;
                };
                (event, FeedSnapshot::capture(&core))
            };
            trace!(?event, now_ms, "Publishing feed change");
            self.publish(snapshot);
        }
    }
}

/// Driver loop: sleep until the next due event or a control wake-up.
async fn drive(shared: Arc<Shared>) {
    loop {
        let wakeup = {
            let mut core = lock(&shared.core);
            if !core.is_running() {
                break;
            }
            core.next_wakeup()
        };

        match wakeup {
            Some(at_ms) => {
                let deadline = shared.origin + Duration::from_millis(at_ms);
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = shared.wake.notified() => continue,
                }
            }
            None => {
                shared.wake.notified().await;
                continue;
            }
        }

        shared.run_due();
    }
    debug!("Feed driver exited");
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Handle to the live feed. Cheap to clone; all clones drive the same feed.
#[derive(Clone)]
pub struct LiveFeedEngine {
    shared: Arc<Shared>,
}

impl LiveFeedEngine {
    /// Engine with a [`RandomSampler`] over `config`.
    ///
    /// Fails when `config` has a range the sampler cannot draw from.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let engine = Self::with_sampler(config.capacity, Box::new(RandomSampler::new(config)));
        if config.start_paused {
            engine.pause();
        }
        Ok(engine)
    }

    pub fn with_sampler(capacity: usize, sampler: Box<dyn Sampler>) -> Self {
        let core = FeedCore::new(capacity, sampler, chrono::Utc::now());
        let (published, _) = watch::channel(Arc::new(FeedSnapshot::capture(&core)));
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                origin: Instant::now(),
                published,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                dispatch: Mutex::new(Dispatch::default()),
                wake: Notify::new(),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Begin the submission cadence and spawn the driver. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), FeedError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        let mut driver = lock(&self.shared.driver);
        let started = {
            let mut core = lock(&self.shared.core);
            core.start(self.shared.now_ms())
                .then(|| FeedSnapshot::capture(&core))
        };
        let driver_alive = driver.as_ref().is_some_and(|handle| !handle.is_finished());
        if started.is_none() && driver_alive {
            return Ok(());
        }
        if !driver_alive {
            *driver = Some(runtime.spawn(drive(Arc::clone(&self.shared))));
        }
        drop(driver);

        if let Some(snapshot) = started {
            info!(paused = snapshot.paused, "Live feed started");
            self.shared.publish(snapshot);
        } else {
            warn!("Feed driver was not running; respawned");
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Stop scheduling new submissions. In-flight transitions continue.
    pub fn pause(&self) {
        let snapshot = {
            let mut core = lock(&self.shared.core);
            if !core.pause() {
                return;
            }
            FeedSnapshot::capture(&core)
        };
        info!(in_feed = snapshot.transactions.len(), "Live feed paused");
        self.shared.publish(snapshot);
        self.shared.wake.notify_one();
    }

    /// Restart submissions after a fresh random interval.
    pub fn resume(&self) {
        let snapshot = {
            let mut core = lock(&self.shared.core);
            if !core.resume(self.shared.now_ms()) {
                return;
            }
            FeedSnapshot::capture(&core)
        };
        info!("Live feed resumed");
        self.shared.publish(snapshot);
        self.shared.wake.notify_one();
    }

    /// Cancel every pending event, release the feed and stop the driver.
    /// Safe to call any number of times; `start` may be called again after.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.shared.driver).take() {
            handle.abort();
        }
        let snapshot = {
            let mut core = lock(&self.shared.core);
            if !core.stop() {
                return;
            }
            FeedSnapshot::capture(&core)
        };
        info!("Live feed stopped");
        self.shared.publish(snapshot);
    }

    /// Register a listener called with every new snapshot.
    ///
    /// The listener stays registered until the returned [`Subscription`]
    /// is dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Async alternative to [`subscribe`](Self::subscribe).
    pub fn watch(&self) -> watch::Receiver<Arc<FeedSnapshot>> {
        self.shared.published.subscribe()
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<FeedSnapshot> {
        Arc::clone(&self.shared.published.borrow())
    }

    /// Filtered, newest-first transactions from the latest snapshot.
    pub fn snapshot(&self, filter: FeedFilter) -> Vec<Transaction> {
        self.latest().filtered(filter)
    }

    pub fn stats(&self) -> FeedStats {
        self.latest().stats()
    }

    pub fn is_paused(&self) -> bool {
        self.latest().paused
    }

    pub fn is_running(&self) -> bool {
        self.latest().running
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
