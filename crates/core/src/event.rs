//! Row-level change events delivered by the change stream.

use crate::row::Row;
use serde::{Deserialize, Serialize};

/// Kind of a change-stream event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Table metadata; carries no row data.
    TableMap,
    Insert,
    Update,
    Delete,
}

impl EventKind {
    /// Returns true for insert, update and delete events.
    #[inline]
    pub fn is_row_event(self) -> bool {
        !matches!(self, EventKind::TableMap)
    }
}

/// Before/after images of one changed row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub before: Option<Row>,
    pub after: Option<Row>,
}

/// A notification that rows of `database.table` changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub database: String,
    pub table: String,
    pub kind: EventKind,
    pub rows: Vec<RowChange>,
}

impl ChangeEvent {
    /// Creates an event of the given kind with no row images.
    pub fn new(database: impl Into<String>, table: impl Into<String>, kind: EventKind) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            kind,
            rows: Vec::new(),
        }
    }

    /// Creates a table metadata event.
    pub fn table_map(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(database, table, EventKind::TableMap)
    }

    /// Creates an insert event.
    pub fn insert(database: impl Into<String>, table: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut event = Self::new(database, table, EventKind::Insert);
        event.rows = rows
            .into_iter()
            .map(|after| RowChange {
                before: None,
                after: Some(after),
            })
            .collect();
        event
    }

    /// Creates an update event from `(before, after)` pairs.
    pub fn update(
        database: impl Into<String>,
        table: impl Into<String>,
        rows: Vec<(Row, Row)>,
    ) -> Self {
        let mut event = Self::new(database, table, EventKind::Update);
        event.rows = rows
            .into_iter()
            .map(|(before, after)| RowChange {
                before: Some(before),
                after: Some(after),
            })
            .collect();
        event
    }

    /// Creates a delete event.
    pub fn delete(database: impl Into<String>, table: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut event = Self::new(database, table, EventKind::Delete);
        event.rows = rows
            .into_iter()
            .map(|before| RowChange {
                before: Some(before),
                after: None,
            })
            .collect();
        event
    }

    /// Returns true if this event describes row changes.
    #[inline]
    pub fn is_row_event(&self) -> bool {
        self.kind.is_row_event()
    }
}
