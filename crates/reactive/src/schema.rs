//! Triggers and the schema registry.
//!
//! A trigger names a table whose row changes may affect a query result. The
//! registry is the union of the triggers of every active subscription and is
//! what the change stream is told to deliver.

use livesel_core::{ChangeEvent, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Database name -> table names to receive change events for.
pub type SchemaFilter = BTreeMap<String, BTreeSet<String>>;

/// A table whose changes invalidate a query. Without a database, the
/// connection's default database is used.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub database: Option<String>,
    pub table: String,
}

impl Trigger {
    /// A trigger on a table of the default database.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            database: None,
            table: table.into(),
        }
    }

    /// A trigger on `database.table`.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            table: table.into(),
        }
    }

    /// Resolves the database, falling back to `default_database`.
    pub fn resolve(&self, default_database: Option<&str>) -> Result<ResolvedTrigger> {
        let database = self
            .database
            .as_deref()
            .or(default_database)
            .ok_or_else(|| Error::no_database(self.table.clone()))?;
        Ok(ResolvedTrigger {
            database: database.to_string(),
            table: self.table.clone(),
        })
    }
}

/// A trigger with its database resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedTrigger {
    pub database: String,
    pub table: String,
}

impl ResolvedTrigger {
    /// Returns true if the event touches this trigger's table.
    #[inline]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.database == event.database && self.table == event.table
    }
}

/// The set of `(database, table)` pairs relevant to active subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: SchemaFilter,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds triggers. Returns true if any pair was new.
    pub fn merge<'a, I>(&mut self, triggers: I) -> bool
    where
        I: IntoIterator<Item = &'a ResolvedTrigger>,
    {
        let mut grew = false;
        for trigger in triggers {
            grew |= self
                .tables
                .entry(trigger.database.clone())
                .or_default()
                .insert(trigger.table.clone());
        }
        grew
    }

    /// Replaces the contents with exactly these triggers. Returns true if the
    /// registry changed.
    pub fn rebuild<'a, I>(&mut self, triggers: I) -> bool
    where
        I: IntoIterator<Item = &'a ResolvedTrigger>,
    {
        let mut next = SchemaRegistry::new();
        next.merge(triggers);
        let changed = next.tables != self.tables;
        self.tables = next.tables;
        changed
    }

    /// Returns true if `database.table` is registered.
    pub fn contains(&self, database: &str, table: &str) -> bool {
        self.tables
            .get(database)
            .map_or(false, |tables| tables.contains(table))
    }

    /// Returns the registry as a stream filter.
    pub fn filter(&self) -> &SchemaFilter {
        &self.tables
    }

    /// Returns the number of registered tables.
    pub fn table_count(&self) -> usize {
        self.tables.values().map(BTreeSet::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
