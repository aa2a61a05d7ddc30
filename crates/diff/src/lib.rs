//! livesel Diff - Snapshot differ for live query results.
//!
//! A query result is kept as a `Snapshot`: rows keyed by an identity string.
//! When a query is re-executed, `make_diff` computes the minimal change between
//! the previous and the new snapshot, and `apply_diff` replays such a change on
//! any copy of the previous snapshot, including a mirror held by a remote
//! consumer.
//!
//! # Core Concepts
//!
//! - `Snapshot`: identity key -> `Row`
//! - `Diff`: added rows, per-field changes and removed keys
//! - `FieldChange`: a new value for a field, or `Unset` when the field is gone
//!
//! # Example
//!
//! ```rust
//! use livesel_core::Row;
//! use livesel_diff::{apply_diff, make_diff, Snapshot};
//!
//! let mut old = Snapshot::new();
//! old.insert("1".into(), Row::from_pairs([("id", 1i64), ("v", 10i64)]));
//!
//! let mut new = Snapshot::new();
//! new.insert("1".into(), Row::from_pairs([("id", 1i64), ("v", 11i64)]));
//! new.insert("2".into(), Row::from_pairs([("id", 2i64), ("v", 20i64)]));
//!
//! let diff = make_diff(&old, &new);
//! assert_eq!(diff.added.len(), 1);
//!
//! let mut mirror = old.clone();
//! apply_diff(&mut mirror, &diff);
//! assert_eq!(mirror, new);
//! ```

pub mod apply;
pub mod diff;

pub use apply::{applied, apply_diff};
pub use diff::{make_diff, Diff, FieldChange, FieldChanges, Snapshot};
