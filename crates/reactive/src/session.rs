//! Boundaries to the external collaborators.
//!
//! The engine does not speak any wire protocol itself. Query execution and the
//! replication stream are provided by the host application through the
//! `QueryExecutor` and `ChangeStream` traits.

use crate::config::ConnectionSettings;
use crate::schema::SchemaFilter;
use async_trait::async_trait;
use livesel_core::{ChangeEvent, Error, EventKind, Params, Result, Row};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Executes queries on behalf of the caches.
///
/// One executor is shared by every cache, so `execute` must accept concurrent
/// calls without mixing up their results.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Establishes the execution path: a single connection, or a pool when
    /// `settings.pool` is set.
    async fn connect(&self, settings: &ConnectionSettings) -> Result<()>;

    /// Runs `query` with its bound parameters and returns every row.
    async fn execute(&self, query: &str, params: Option<&Params>) -> Result<Vec<Row>>;

    /// Tears the execution path down.
    async fn close(&self);
}

/// Messages a change stream pushes to the engine, in stream order.
#[derive(Debug)]
pub enum StreamMessage {
    Event(ChangeEvent),
    /// Terminal for the session.
    Error(Error),
}

/// Options handed to the change stream when the session starts.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamOptions {
    /// Replication client identity.
    pub server_id: u32,
    /// Skip history and deliver only changes made after the session starts.
    pub start_at_end: bool,
    pub include_events: Vec<EventKind>,
    pub include_schema: SchemaFilter,
}

impl StreamOptions {
    /// Options for a live session: start at the end of the log and deliver
    /// table metadata plus row events for `include_schema`.
    pub fn live(server_id: u32, include_schema: SchemaFilter) -> Self {
        Self {
            server_id,
            start_at_end: true,
            include_events: vec![
                EventKind::TableMap,
                EventKind::Insert,
                EventKind::Update,
                EventKind::Delete,
            ],
            include_schema,
        }
    }
}

/// A row-level change stream session.
#[async_trait]
pub trait ChangeStream: Send + Sync {
    /// Starts the session. Events and errors are sent to `sink` in order.
    async fn start(
        &self,
        options: &StreamOptions,
        sink: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<()>;

    /// Replaces the schema filter. May be called before `start` and while
    /// the session is running.
    fn set_filter(&self, filter: &SchemaFilter);

    /// Returns true once the session delivers events.
    fn is_ready(&self) -> bool;

    /// Stops the session.
    async fn stop(&self);
}

/// Session-level notifications of a `LiveSelect`.
#[derive(Clone, Debug)]
pub enum SessionSignal {
    Ready,
    /// The session failed; sent at most once.
    Error(Arc<Error>),
}
