//! Livesel Reactive - live query caches driven by a row-level change stream.
//!
//! This crate keeps the results of registered queries current. A change stream
//! reports which tables changed; every query whose triggers name such a table
//! is re-executed, and the difference to its previous result is pushed to its
//! subscriptions.
//!
//! # Core Concepts
//!
//! - `LiveSelect`: Owns the session, the cache registry and the schema registry
//! - `QueryCache`: One query's current result, shared by identical selects
//! - `KeyStrategy`: Decides the identity key of each result row
//! - `Subscription`: A client's handle receiving diffs and errors
//! - `QueryExecutor` / `ChangeStream`: Boundaries to the database
//!
//! # Key Features
//!
//! - Coalescing: invalidations during an execution fold into one follow-up run
//! - Throttling: an optional minimum interval between executions of one query
//! - Pause/resume: stop listening without losing results, refresh on resume
//!
//! # Example
//!
//! ```ignore
//! use livesel_reactive::{apply_diff, KeyStrategy, LiveConfig, LiveSelect, Snapshot, Trigger};
//!
//! let live = LiveSelect::new(LiveConfig::default().with_database("shop"), executor, stream)?;
//! live.start().await?;
//!
//! let mut orders = live.select(
//!     "SELECT id, status FROM orders WHERE customer = ?",
//!     Some(Params::positional(vec![Value::Int64(7)])),
//!     KeyStrategy::columns(["id"]),
//!     vec![Trigger::table("orders")],
//! )?;
//!
//! let mut mirror = Snapshot::new();
//! while let Some(event) = orders.recv().await {
//!     if let Some(diff) = event.diff() {
//!         apply_diff(&mut mirror, diff);
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod key;
pub mod live;
pub mod schema;
pub mod session;
pub mod subscription;

pub use cache::{CacheStatus, QueryCache};
pub use config::{ConnectionSettings, LiveConfig};
pub use key::{fingerprint, KeyFn, KeyIdentity, KeyStrategy};
pub use live::LiveSelect;
pub use schema::{ResolvedTrigger, SchemaFilter, SchemaRegistry, Trigger};
pub use session::{ChangeStream, QueryExecutor, SessionSignal, StreamMessage, StreamOptions};
pub use subscription::{Subscription, SubscriptionEvent, SubscriptionId};

// Re-export commonly used types from dependencies
pub use livesel_core::{ChangeEvent, Error, EventKind, Params, Result, Row, RowChange, Value};
pub use livesel_diff::{applied, apply_diff, make_diff, Diff, FieldChange, FieldChanges, Snapshot};
