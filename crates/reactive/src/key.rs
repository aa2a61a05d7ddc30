//! Row identity strategies.
//!
//! A `KeyStrategy` turns each row of a result set into the identity key used by
//! the differ. Two rows with the same key in consecutive executions are treated
//! as the same row, so the strategy decides whether a change shows up as a
//! field update or as a remove/add pair.

use livesel_core::{Error, Params, Result, Row, Value};
use livesel_diff::Snapshot;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Caller-supplied identity function: `(row, ordinal) -> key`.
pub type KeyFn = Arc<dyn Fn(&Row, usize) -> String + Send + Sync>;

/// Marker prefixed to structured keys so they never collide with a quoted
/// string key.
const STRUCTURED_MARKER: char = '!';

/// How rows of a result set are identified.
#[derive(Clone)]
pub enum KeyStrategy {
    /// Key is the row's position in the result set.
    ///
    /// Cheap, but if rows shift position between executions the diff shows
    /// replacements instead of moves.
    Ordinal,
    /// Key is derived from these columns (kept sorted).
    Columns(Vec<String>),
    /// Key is whatever the function returns.
    Custom(KeyFn),
}

impl KeyStrategy {
    /// Identifies rows by position.
    pub fn ordinal() -> Self {
        KeyStrategy::Ordinal
    }

    /// Identifies rows by a set of columns. Order of `columns` does not matter.
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        columns.sort();
        KeyStrategy::Columns(columns)
    }

    /// Identifies rows with a custom function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Row, usize) -> String + Send + Sync + 'static,
    {
        KeyStrategy::Custom(Arc::new(f))
    }

    /// Checks that the strategy can produce keys.
    pub fn validate(&self) -> Result<()> {
        match self {
            KeyStrategy::Columns(columns) if columns.is_empty() => Err(
                Error::invalid_key_strategy("column key strategy needs at least one column"),
            ),
            _ => Ok(()),
        }
    }

    /// Returns the identity used for cache fingerprints.
    ///
    /// Each call on a `Custom` strategy yields a fresh uniqueness token: a
    /// function cannot be compared for equality, so a custom-keyed select never
    /// shares its cache.
    pub fn identity(&self) -> KeyIdentity {
        match self {
            KeyStrategy::Ordinal => KeyIdentity::Ordinal,
            KeyStrategy::Columns(columns) => KeyIdentity::Columns(columns.clone()),
            KeyStrategy::Custom(_) => KeyIdentity::Unique(Uuid::new_v4()),
        }
    }

    /// Computes the identity key of a row.
    pub fn key_for(&self, row: &Row, ordinal: usize) -> String {
        match self {
            KeyStrategy::Ordinal => ordinal.to_string(),
            KeyStrategy::Columns(columns) if columns.len() == 1 => {
                single_column_key(row.get(&columns[0]).unwrap_or(&Value::Null))
            }
            KeyStrategy::Columns(columns) => {
                format!("{}{}", STRUCTURED_MARKER, row.pick(columns).to_canonical_json())
            }
            KeyStrategy::Custom(f) => f(row, ordinal),
        }
    }

    /// Keys a result set. A later row with a duplicate key replaces the
    /// earlier one.
    pub fn snapshot(&self, rows: Vec<Row>) -> Snapshot {
        rows.into_iter()
            .enumerate()
            .map(|(ordinal, row)| (self.key_for(&row, ordinal), row))
            .collect()
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::Ordinal => f.write_str("Ordinal"),
            KeyStrategy::Columns(columns) => f.debug_tuple("Columns").field(columns).finish(),
            KeyStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn single_column_key(value: &Value) -> String {
    match value {
        Value::DateTime(ms) => ms.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        v if v.is_structured() => format!("{}{}", STRUCTURED_MARKER, v.to_canonical_json()),
        v => v.to_string(),
    }
}

/// The fingerprint-relevant identity of a key strategy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyIdentity {
    Ordinal,
    Columns(Vec<String>),
    /// Token generated when a custom-keyed select was registered.
    Unique(Uuid),
}

impl KeyIdentity {
    /// Stable textual signature.
    pub fn signature(&self) -> String {
        match self {
            KeyIdentity::Ordinal => "index".to_string(),
            KeyIdentity::Columns(columns) => format!("columns: {}", columns.join(",")),
            KeyIdentity::Unique(token) => format!("func: {}", token),
        }
    }

    /// Returns true if two selects with this identity may share a cache.
    pub fn is_shareable(&self) -> bool {
        !matches!(self, KeyIdentity::Unique(_))
    }
}

/// Canonical fingerprint of (query text, bound parameters, key identity).
///
/// Serialized as JSON with sorted keys, so equal inputs always produce the same
/// text. Parameters are type-tagged so that different bindings never collide.
pub fn fingerprint(query: &str, params: Option<&Params>, identity: &KeyIdentity) -> String {
    let values = params
        .map(Params::to_tagged_json)
        .unwrap_or(serde_json::Value::Null);
    serde_json::json!({
        "keySelector": identity.signature(),
        "query": query,
        "values": values,
    })
    .to_string()
}
