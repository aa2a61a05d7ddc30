//! livesel Core - Core types shared by the livesel crates.
//!
//! This crate provides the foundational types for live query results:
//!
//! - `Value`: Scalar and structured values returned by query execution
//! - `Row`: An ordered mapping from column name to value
//! - `Params`: Bound parameters of a query
//! - `ChangeEvent`: A row-level notification from the change stream
//! - `Error`: Error types shared by every layer
//!
//! # Example
//!
//! ```rust
//! use livesel_core::{Row, Value};
//!
//! let row = Row::from_pairs([
//!     ("id", Value::Int64(1)),
//!     ("name", Value::String("Alice".into())),
//! ]);
//!
//! assert_eq!(row.len(), 2);
//! assert_eq!(row.get("name"), Some(&Value::String("Alice".into())));
//! ```

mod error;
mod event;
mod params;
mod row;
mod value;

pub use error::{Error, Result};
pub use event::{ChangeEvent, EventKind, RowChange};
pub use params::Params;
pub use row::Row;
pub use value::Value;
