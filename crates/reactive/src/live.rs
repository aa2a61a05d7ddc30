//! LiveSelect - the live query orchestrator.
//!
//! `LiveSelect` owns the cache registry and the schema registry, drives the
//! change-stream session and routes each row event to the caches whose
//! triggers it touches.
//!
//! Lock order is registry then cache: the registry mutex may be held while a
//! cache is locked, never the other way round.

use crate::cache::QueryCache;
use crate::config::LiveConfig;
use crate::key::{fingerprint, KeyStrategy};
use crate::schema::{ResolvedTrigger, SchemaFilter, SchemaRegistry, Trigger};
use crate::session::{ChangeStream, QueryExecutor, SessionSignal, StreamMessage, StreamOptions};
use crate::subscription::{Subscriber, Subscription, SubscriptionId};
use hashbrown::HashMap;
use livesel_core::{ChangeEvent, Error, Params, Result};
use log::{debug, error, info, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const SIGNAL_CAPACITY: usize = 16;

/// Registration of one subscription.
struct Registration {
    fingerprint: String,
    triggers: Arc<[ResolvedTrigger]>,
}

struct RegistryState {
    caches: HashMap<String, Arc<QueryCache>>,
    subscriptions: HashMap<SubscriptionId, Registration>,
    schema: SchemaRegistry,
    paused: bool,
}

impl RegistryState {
    fn effective_filter(&self) -> SchemaFilter {
        if self.paused {
            SchemaFilter::new()
        } else {
            self.schema.filter().clone()
        }
    }
}

/// State shared between the `LiveSelect` handle, its subscriptions and the
/// routing task.
pub(crate) struct Shared {
    config: LiveConfig,
    executor: Arc<dyn QueryExecutor>,
    stream: Arc<dyn ChangeStream>,
    runtime: Handle,
    registry: Mutex<RegistryState>,
    signals: broadcast::Sender<SessionSignal>,
    router: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    /// First session error; the session is unusable once set.
    failure: Mutex<Option<Error>>,
    closed: AtomicBool,
}

impl Shared {
    /// Removes a subscription, destroying its cache if it was the last one.
    ///
    /// Returns true if the subscription was registered.
    pub(crate) fn remove_subscription(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let Some(registration) = registry.subscriptions.remove(&id) else {
            return false;
        };

        let emptied = registry
            .caches
            .get(&registration.fingerprint)
            .map_or(false, |cache| cache.detach(id));
        if emptied {
            if let Some(cache) = registry.caches.remove(&registration.fingerprint) {
                cache.destroy();
            }
        }

        let RegistryState {
            subscriptions,
            schema,
            paused,
            ..
        } = &mut *registry;
        let narrowed = schema.rebuild(subscriptions.values().flat_map(|r| r.triggers.iter()));
        if narrowed && !*paused {
            self.stream.set_filter(schema.filter());
        }
        debug!("Unregistered subscription {}", id);
        true
    }

    /// Invalidates every cache with a subscriber interested in `event`.
    ///
    /// Returns the number of caches invalidated.
    fn process_event(&self, event: &ChangeEvent) -> usize {
        if !event.kind.is_row_event() {
            trace!("Ignoring {:?} event for {}.{}", event.kind, event.database, event.table);
            return 0;
        }

        let registry = self.registry.lock();
        if registry.paused {
            trace!("Paused, dropping event for {}.{}", event.database, event.table);
            return 0;
        }

        let check_queued = self.config.check_condition_when_queued;
        let mut invalidated = 0;
        for cache in registry.caches.values() {
            if (check_queued || !cache.is_timer_armed()) && cache.matches_event(event) {
                cache.invalidate();
                invalidated += 1;
            }
        }
        trace!(
            "Event on {}.{} invalidated {} caches",
            event.database,
            event.table,
            invalidated
        );
        invalidated
    }

    /// Records and publishes a session error, at most once per `LiveSelect`.
    fn fail(&self, err: Error) -> Error {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            error!("Live select session failed: {}", err);
            *failure = Some(err.clone());
            let _ = self.signals.send(SessionSignal::Error(Arc::new(err.clone())));
        }
        err
    }

    fn failure(&self) -> Option<Error> {
        self.failure.lock().clone()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(router) = self.router.get_mut().take() {
            router.abort();
        }
    }
}

async fn route(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<StreamMessage>) {
    while let Some(message) = rx.recv().await {
        let Some(owner) = shared.upgrade() else {
            break;
        };
        match message {
            StreamMessage::Event(event) => {
                owner.process_event(&event);
            }
            StreamMessage::Error(err) => {
                let err = match err {
                    err if err.is_session() => err,
                    other => Error::stream(other.to_string()),
                };
                owner.fail(err);
            }
        }
    }
}

/// A live query session.
///
/// # Example
///
/// ```ignore
/// let live = LiveSelect::new(config, executor, stream)?;
/// live.start().await?;
///
/// let mut players = live.select(
///     "SELECT * FROM players ORDER BY score DESC",
///     None,
///     KeyStrategy::columns(["id"]),
///     vec![Trigger::table("players")],
/// )?;
///
/// while let Some(event) = players.recv().await {
///     if let Some(diff) = event.diff() {
///         apply_diff(&mut mirror, diff);
///     }
/// }
/// ```
pub struct LiveSelect {
    shared: Arc<Shared>,
}

impl LiveSelect {
    /// Creates a session. Must be called from within a Tokio runtime; caches
    /// spawn their executions on it.
    pub fn new(
        config: LiveConfig,
        executor: Arc<dyn QueryExecutor>,
        stream: Arc<dyn ChangeStream>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            Error::invalid_config(format!("LiveSelect requires a Tokio runtime: {}", e))
        })?;
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                executor,
                stream,
                runtime,
                registry: Mutex::new(RegistryState {
                    caches: HashMap::new(),
                    subscriptions: HashMap::new(),
                    schema: SchemaRegistry::new(),
                    paused: false,
                }),
                signals,
                router: Mutex::new(None),
                next_id: AtomicU64::new(1),
                failure: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LiveConfig {
        &self.shared.config
    }

    /// Subscribes to session signals. Subscribe before calling `start` to
    /// observe `Ready`.
    pub fn signals(&self) -> broadcast::Receiver<SessionSignal> {
        self.shared.signals.subscribe()
    }

    /// Connects the executor, starts the change stream and waits until it is
    /// ready.
    ///
    /// Any failure is also published once as `SessionSignal::Error`. A stream
    /// error reported while waiting for readiness ends the wait, and `Ready` is
    /// never sent after an error.
    pub async fn start(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if let Some(err) = shared.failure() {
            return Err(err);
        }

        shared
            .executor
            .connect(&shared.config.connection)
            .await
            .map_err(|e| {
                let e = if e.is_session() { e } else { Error::connect(e.to_string()) };
                shared.fail(e)
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let router = shared.runtime.spawn(route(Arc::downgrade(shared), rx));
        if let Some(previous) = shared.router.lock().replace(router) {
            previous.abort();
        }

        let filter = shared.registry.lock().effective_filter();
        let options = StreamOptions::live(shared.config.server_id, filter);
        shared.stream.start(&options, tx).await.map_err(|e| {
            let e = if e.is_session() { e } else { Error::stream(e.to_string()) };
            shared.fail(e)
        })?;

        self.wait_ready().await?;
        if let Some(err) = shared.failure() {
            return Err(err);
        }
        info!("Live select session ready (server_id {})", shared.config.server_id);
        let _ = shared.signals.send(SessionSignal::Ready);
        Ok(())
    }

    async fn wait_ready(&self) -> Result<()> {
        let config = &self.shared.config;
        let deadline = Instant::now() + config.ready_timeout();
        loop {
            if let Some(err) = self.shared.failure() {
                return Err(err);
            }
            if self.shared.stream.is_ready() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(self.shared.fail(Error::ReadyTimeout(config.ready_timeout())));
            }
            tokio::time::sleep(config.ready_poll_interval()).await;
        }
    }

    /// Registers a live query.
    ///
    /// Selects with equal query text, parameters and a shareable key strategy
    /// share one cache. The first result arrives through the subscription once
    /// the query has executed.
    pub fn select(
        &self,
        query: &str,
        params: Option<Params>,
        key: KeyStrategy,
        triggers: Vec<Trigger>,
    ) -> Result<Subscription> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        if triggers.is_empty() {
            return Err(Error::EmptyTriggers);
        }
        key.validate()?;

        let default_database = shared.config.default_database();
        let resolved: Arc<[ResolvedTrigger]> = triggers
            .iter()
            .map(|trigger| trigger.resolve(default_database))
            .collect::<Result<Vec<_>>>()?
            .into();

        let identity = key.identity();
        let fingerprint = fingerprint(query, params.as_ref(), &identity);

        let mut registry = shared.registry.lock();
        if registry.schema.merge(resolved.iter()) && !registry.paused {
            shared.stream.set_filter(registry.schema.filter());
        }

        let cache = Arc::clone(
            registry
                .caches
                .entry(fingerprint.clone())
                .or_insert_with(|| {
                    debug!("Creating query cache {}", fingerprint);
                    Arc::new(QueryCache::new(
                        fingerprint.clone(),
                        query.to_string(),
                        params,
                        key,
                        identity,
                        shared.config.min_interval(),
                        Arc::clone(&shared.executor),
                        shared.runtime.clone(),
                    ))
                }),
        );

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        registry.subscriptions.insert(
            id,
            Registration {
                fingerprint,
                triggers: Arc::clone(&resolved),
            },
        );

        let (tx, rx) = mpsc::unbounded_channel();
        cache.attach(Subscriber::new(id, Arc::clone(&resolved), tx));
        drop(registry);

        Ok(Subscription::new(
            id,
            resolved,
            cache,
            rx,
            Arc::downgrade(shared),
        ))
    }

    /// Unregisters a subscription. Same as `Subscription::unregister`.
    pub fn unregister(&self, subscription: Subscription) -> bool {
        subscription.unregister()
    }

    /// Stops receiving change events. Caches keep their results.
    pub fn pause(&self) {
        let mut registry = self.shared.registry.lock();
        if registry.paused {
            return;
        }
        registry.paused = true;
        self.shared.stream.set_filter(&SchemaFilter::new());
        debug!("Live select paused");
    }

    /// Resumes receiving change events and refreshes every cache once, since
    /// changes made while paused were not seen.
    pub fn resume(&self) {
        let mut registry = self.shared.registry.lock();
        if !registry.paused {
            return;
        }
        registry.paused = false;
        self.shared.stream.set_filter(registry.schema.filter());
        for cache in registry.caches.values() {
            cache.invalidate();
        }
        debug!("Live select resumed, refreshing {} caches", registry.caches.len());
    }

    /// Routes one change event as if it came from the change stream.
    ///
    /// Returns the number of caches invalidated.
    pub fn process_event(&self, event: &ChangeEvent) -> usize {
        self.shared.process_event(event)
    }

    /// Ends the session: stops the stream and routing, destroys every cache
    /// and closes the executor. Outstanding subscriptions receive no further
    /// events.
    pub async fn end(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        shared.stream.stop().await;
        if let Some(router) = shared.router.lock().take() {
            router.abort();
        }

        {
            let mut registry = shared.registry.lock();
            for (_, cache) in registry.caches.drain() {
                cache.destroy();
            }
            registry.subscriptions.clear();
            registry.schema = SchemaRegistry::new();
        }

        shared.executor.close().await;
        info!("Live select session ended");
    }

    /// Returns true once `end` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Returns the session error, if the session has failed.
    pub fn session_error(&self) -> Option<Error> {
        self.shared.failure()
    }

    /// Returns true while paused.
    pub fn is_paused(&self) -> bool {
        self.shared.registry.lock().paused
    }

    /// Returns the number of live query caches.
    pub fn cache_count(&self) -> usize {
        self.shared.registry.lock().caches.len()
    }

    /// Returns the number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.lock().subscriptions.len()
    }

    /// Returns the cache with the given fingerprint.
    pub fn cache(&self, fingerprint: &str) -> Option<Arc<QueryCache>> {
        self.shared.registry.lock().caches.get(fingerprint).cloned()
    }

    /// Returns the union of all subscriptions' triggers.
    pub fn registered_schema(&self) -> SchemaFilter {
        self.shared.registry.lock().schema.filter().clone()
    }

    /// Returns the filter the change stream currently has: empty while
    /// paused, the registered schema otherwise.
    pub fn effective_filter(&self) -> SchemaFilter {
        self.shared.registry.lock().effective_filter()
    }
}

impl std::fmt::Debug for LiveSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.shared.registry.lock();
        f.debug_struct("LiveSelect")
            .field("caches", &registry.caches.len())
            .field("subscriptions", &registry.subscriptions.len())
            .field("paused", &registry.paused)
            .finish()
    }
}
