//! Query result cache.
//!
//! A `QueryCache` owns one query's current result and the subscribers sharing
//! it. Change events call [`QueryCache::invalidate`]; the cache decides whether
//! to re-execute now, after the throttle interval, or after the execution
//! already in flight, and broadcasts the diff of each new result.
//!
//! # Phases
//!
//! ```text
//!            invalidate (interval elapsed)
//!   Idle ───────────────────────────────▶ Updating{pending: false}
//!    │  ▲                                   │        ▲
//!    │  │ completion, pending == false      │        │ invalidate
//!    │  └───────────────────────────────────┤        ▼
//!    │                                      │  Updating{pending: true}
//!    │ invalidate (within interval)         │        │ completion:
//!    ▼                                      │        │ re-run the decision
//!   TimerArmed ── timer expires ────────────┘        ▼
//! ```
//!
//! At most one execution per cache is in flight; invalidations arriving
//! meanwhile are folded into a single follow-up execution.

use crate::key::{KeyIdentity, KeyStrategy};
use crate::session::QueryExecutor;
use crate::subscription::{Subscriber, SubscriberList, SubscriptionEvent, SubscriptionId};
use livesel_core::{ChangeEvent, Params, Result, Row};
use livesel_diff::{make_diff, Diff, Snapshot};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Externally visible phase of a query cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Idle,
    Updating,
    /// Updating, and at least one invalidation arrived meanwhile.
    UpdatingPending,
    /// Waiting for the throttle interval to pass.
    TimerArmed,
}

enum Phase {
    Idle,
    Updating { pending: bool },
    TimerArmed(JoinHandle<()>),
}

impl Phase {
    fn status(&self) -> CacheStatus {
        match self {
            Phase::Idle => CacheStatus::Idle,
            Phase::Updating { pending: false } => CacheStatus::Updating,
            Phase::Updating { pending: true } => CacheStatus::UpdatingPending,
            Phase::TimerArmed(_) => CacheStatus::TimerArmed,
        }
    }
}

struct CacheState {
    phase: Phase,
    snapshot: Arc<Snapshot>,
    initialized: bool,
    last_update: Option<Instant>,
    subscribers: SubscriberList,
    executions: u64,
    destroyed: bool,
}

/// The shared, incrementally maintained result of one query.
pub struct QueryCache {
    fingerprint: String,
    query: String,
    params: Option<Params>,
    key: KeyStrategy,
    identity: KeyIdentity,
    min_interval: Option<Duration>,
    executor: Arc<dyn QueryExecutor>,
    runtime: Handle,
    state: Mutex<CacheState>,
}

impl QueryCache {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fingerprint: String,
        query: String,
        params: Option<Params>,
        key: KeyStrategy,
        identity: KeyIdentity,
        min_interval: Option<Duration>,
        executor: Arc<dyn QueryExecutor>,
        runtime: Handle,
    ) -> Self {
        Self {
            fingerprint,
            query,
            params,
            key,
            identity,
            min_interval,
            executor,
            runtime,
            state: Mutex::new(CacheState {
                phase: Phase::Idle,
                snapshot: Arc::new(Snapshot::new()),
                initialized: false,
                last_update: None,
                subscribers: SubscriberList::new(),
                executions: 0,
                destroyed: false,
            }),
        }
    }

    /// Returns the cache fingerprint.
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the query text.
    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the bound parameters.
    #[inline]
    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// Returns the key identity the fingerprint was computed from.
    #[inline]
    pub fn key_identity(&self) -> &KeyIdentity {
        &self.identity
    }

    /// Returns the current result.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.lock().snapshot)
    }

    /// Returns true once an execution has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Returns the current phase.
    pub fn status(&self) -> CacheStatus {
        self.state.lock().phase.status()
    }

    /// Returns true while the throttle timer is armed.
    pub fn is_timer_armed(&self) -> bool {
        matches!(self.state.lock().phase, Phase::TimerArmed(_))
    }

    /// Returns the number of executions started so far.
    pub fn execution_count(&self) -> u64 {
        self.state.lock().executions
    }

    /// Returns the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Returns true if any subscriber's triggers match the event.
    pub fn matches_event(&self, event: &ChangeEvent) -> bool {
        self.state.lock().subscribers.matches_any(event)
    }

    /// Requests a re-execution.
    pub fn invalidate(self: &Arc<Self>) {
        let mut state = self.state.lock();
        self.schedule(&mut state);
    }

    /// Adds a subscriber.
    ///
    /// A subscriber joining an initialized cache immediately receives the whole
    /// current result. Joining an idle, uninitialized cache starts the first
    /// execution; joining during an execution waits for its result.
    pub(crate) fn attach(self: &Arc<Self>, subscriber: Subscriber) {
        let mut state = self.state.lock();
        let id = subscriber.id();
        state.subscribers.add(subscriber);

        if state.initialized {
            let catch_up = SubscriptionEvent::Update {
                diff: Arc::new(Diff::initial(&state.snapshot)),
                snapshot: Arc::clone(&state.snapshot),
            };
            state.subscribers.notify(id, catch_up);
        } else if matches!(state.phase, Phase::Idle) {
            self.schedule(&mut state);
        }
    }

    /// Removes a subscriber. Returns true if no subscribers remain.
    pub(crate) fn detach(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        state.subscribers.remove(id);
        state.subscribers.is_empty()
    }

    /// Cancels the armed timer, drops the result and disconnects subscribers.
    /// An execution still in flight completes without effect.
    pub(crate) fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        if let Phase::TimerArmed(timer) = std::mem::replace(&mut state.phase, Phase::Idle) {
            timer.abort();
        }
        state.snapshot = Arc::new(Snapshot::new());
        state.subscribers.clear();
        debug!("Destroyed query cache {}", self.fingerprint);
    }

    fn schedule(self: &Arc<Self>, state: &mut CacheState) {
        if state.destroyed {
            return;
        }
        match &mut state.phase {
            Phase::Updating { pending } => {
                *pending = true;
                return;
            }
            Phase::TimerArmed(_) => return,
            Phase::Idle => {}
        }

        match self.throttle_delay(state.last_update) {
            None => self.begin_update(state),
            Some(delay) => {
                trace!("Throttling {} for {:?}", self.fingerprint, delay);
                let cache = Arc::downgrade(self);
                let timer = self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(cache) = cache.upgrade() {
                        cache.on_timer();
                    }
                });
                state.phase = Phase::TimerArmed(timer);
            }
        }
    }

    /// Time left before the next execution may start, if any.
    fn throttle_delay(&self, last_update: Option<Instant>) -> Option<Duration> {
        let min_interval = self.min_interval?;
        let elapsed = last_update?.elapsed();
        if elapsed >= min_interval {
            None
        } else {
            Some(min_interval - elapsed)
        }
    }

    fn on_timer(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.destroyed || !matches!(state.phase, Phase::TimerArmed(_)) {
            return;
        }
        state.phase = Phase::Idle;
        self.begin_update(&mut state);
    }

    fn begin_update(self: &Arc<Self>, state: &mut CacheState) {
        state.phase = Phase::Updating { pending: false };
        state.last_update = Some(Instant::now());
        state.executions += 1;
        debug!("Executing {} (run {})", self.fingerprint, state.executions);

        let cache = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = cache
                .executor
                .execute(&cache.query, cache.params.as_ref())
                .await;
            cache.complete(result);
        });
    }

    fn complete(self: &Arc<Self>, result: Result<Vec<Row>>) {
        let mut state = self.state.lock();
        let pending = matches!(state.phase, Phase::Updating { pending: true });
        state.phase = Phase::Idle;
        if state.destroyed {
            return;
        }

        match result {
            Err(err) => {
                warn!("Query {} failed: {}", self.fingerprint, err);
                state
                    .subscribers
                    .notify_all(&SubscriptionEvent::Error(Arc::new(err)));
            }
            Ok(rows) => {
                let first_empty = rows.is_empty() && !state.initialized;
                let snapshot = Arc::new(self.key.snapshot(rows));
                let diff = if first_empty {
                    Diff::initialized_empty()
                } else {
                    make_diff(&state.snapshot, &snapshot)
                };
                trace!(
                    "Query {} produced {} rows, {} changed",
                    self.fingerprint,
                    snapshot.len(),
                    diff.len()
                );
                state.subscribers.notify_all(&SubscriptionEvent::Update {
                    diff: Arc::new(diff),
                    snapshot: Arc::clone(&snapshot),
                });
                state.snapshot = snapshot;
                state.initialized = true;
            }
        }

        if pending {
            self.schedule(&mut state);
        }
    }
}

// Never blocks: formatting may happen while the state lock is held.
impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("QueryCache");
        out.field("fingerprint", &self.fingerprint);
        match self.state.try_lock() {
            Some(state) => out.field("status", &state.phase.status()),
            None => out.field("status", &format_args!("<locked>")),
        };
        out.finish()
    }
}
