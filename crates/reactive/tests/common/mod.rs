//! In-memory collaborators for driving a `LiveSelect` in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use livesel_reactive::{
    ChangeEvent, ChangeStream, ConnectionSettings, Error, LiveConfig, LiveSelect, Params,
    QueryExecutor, Result, Row, SchemaFilter, StreamMessage, StreamOptions, Value,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Executor answering every query with the same table contents.
#[derive(Default)]
pub struct MockExecutor {
    rows: Mutex<Vec<Row>>,
    delay: Mutex<Option<Duration>>,
    failures: Mutex<VecDeque<String>>,
    connect_error: Mutex<Option<Error>>,
    started: Mutex<Vec<Instant>>,
    queries: Mutex<Vec<(String, Option<Params>)>>,
    completed: AtomicUsize,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl MockExecutor {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        let executor = Self::default();
        *executor.rows.lock() = rows;
        Arc::new(executor)
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    /// Every execution takes `delay` before returning.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// The next execution fails with a query error.
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    pub fn fail_connect(&self, err: Error) {
        *self.connect_error.lock() = Some(err);
    }

    pub fn executions(&self) -> usize {
        self.started.lock().len()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn started_at(&self) -> Vec<Instant> {
        self.started.lock().clone()
    }

    pub fn queries(&self) -> Vec<(String, Option<Params>)> {
        self.queries.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn connect(&self, _settings: &ConnectionSettings) -> Result<()> {
        if let Some(err) = self.connect_error.lock().take() {
            return Err(err);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, query: &str, params: Option<&Params>) -> Result<Vec<Row>> {
        self.started.lock().push(Instant::now());
        self.queries
            .lock()
            .push((query.to_string(), params.cloned()));

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.lock().pop_front() {
            return Err(Error::query(message));
        }
        Ok(self.rows.lock().clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Change stream whose events are pushed by the test.
pub struct MockStream {
    ready: AtomicBool,
    stopped: AtomicBool,
    start_error: Mutex<Option<Error>>,
    startup_error: Mutex<Option<Error>>,
    options: Mutex<Option<StreamOptions>>,
    filters: Mutex<Vec<SchemaFilter>>,
    sink: Mutex<Option<mpsc::UnboundedSender<StreamMessage>>>,
}

impl MockStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            start_error: Mutex::new(None),
            startup_error: Mutex::new(None),
            options: Mutex::new(None),
            filters: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
        })
    }

    /// A stream that never reports readiness.
    pub fn never_ready() -> Arc<Self> {
        let stream = Self::new();
        stream.ready.store(false, Ordering::SeqCst);
        stream
    }

    pub fn fail_start(&self, err: Error) {
        *self.start_error.lock() = Some(err);
    }

    /// `start` succeeds but immediately reports `err` through the sink.
    pub fn report_on_start(&self, err: Error) {
        *self.startup_error.lock() = Some(err);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn push(&self, event: ChangeEvent) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(StreamMessage::Event(event));
        }
    }

    pub fn push_error(&self, err: Error) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(StreamMessage::Error(err));
        }
    }

    pub fn options(&self) -> Option<StreamOptions> {
        self.options.lock().clone()
    }

    /// The most recent filter handed to the stream, if any.
    pub fn last_filter(&self) -> Option<SchemaFilter> {
        self.filters.lock().last().cloned()
    }

    pub fn filter_updates(&self) -> usize {
        self.filters.lock().len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeStream for MockStream {
    async fn start(
        &self,
        options: &StreamOptions,
        sink: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<()> {
        if let Some(err) = self.start_error.lock().take() {
            return Err(err);
        }
        *self.options.lock() = Some(options.clone());
        if let Some(err) = self.startup_error.lock().take() {
            let _ = sink.send(StreamMessage::Error(err));
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn set_filter(&self, filter: &SchemaFilter) {
        self.filters.lock().push(filter.clone());
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.lock().take();
    }
}

/// A `LiveSelect` over fresh mocks, not yet started.
pub fn live_select(
    config: LiveConfig,
    rows: Vec<Row>,
) -> (LiveSelect, Arc<MockExecutor>, Arc<MockStream>) {
    let executor = MockExecutor::new(rows);
    let stream = MockStream::new();
    let live = LiveSelect::new(config, executor.clone(), stream.clone()).unwrap();
    (live, executor, stream)
}

pub fn config() -> LiveConfig {
    LiveConfig::default().with_database("shop")
}

pub fn player(id: i64, name: &str, score: i64) -> Row {
    Row::from_pairs([
        ("id", Value::from(id)),
        ("name", Value::from(name)),
        ("score", Value::from(score)),
    ])
}
