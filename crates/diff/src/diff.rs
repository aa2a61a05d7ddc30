//! Diff type and the snapshot differ.

use livesel_core::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A query result keyed by row identity.
pub type Snapshot = BTreeMap<String, Row>;

/// Field-level changes of one row, keyed by column name.
pub type FieldChanges = BTreeMap<String, FieldChange>;

/// A change to a single field of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChange {
    /// The field now holds this value.
    Set(Value),
    /// The field is no longer present. Distinct from `Set(Value::Null)`.
    Unset,
}

impl FieldChange {
    /// Returns true if this change removes the field.
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldChange::Unset)
    }
}

/// The difference between two snapshots.
///
/// `changed` and `removed` are `None` only for diffs that describe a whole
/// result rather than a transition: the "initialized with zero rows" signal
/// and the catch-up sent to a late subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Rows whose key was not in the old snapshot
    pub added: BTreeMap<String, Row>,
    /// Field changes of rows present in both snapshots
    pub changed: Option<BTreeMap<String, FieldChanges>>,
    /// Keys that are no longer in the result
    pub removed: Option<BTreeSet<String>>,
}

impl Default for Diff {
    fn default() -> Self {
        Self::new()
    }
}

impl Diff {
    /// Creates an empty diff (no change).
    pub fn new() -> Self {
        Self {
            added: BTreeMap::new(),
            changed: Some(BTreeMap::new()),
            removed: Some(BTreeSet::new()),
        }
    }

    /// The signal emitted when a query's first execution returns no rows:
    /// "zero rows, now initialized", as opposed to "nothing changed".
    pub fn initialized_empty() -> Self {
        Self {
            added: BTreeMap::new(),
            changed: None,
            removed: None,
        }
    }

    /// A diff that builds `snapshot` from nothing.
    pub fn initial(snapshot: &Snapshot) -> Self {
        Self {
            added: snapshot.clone(),
            changed: None,
            removed: None,
        }
    }

    /// Returns true if this is the initialized-empty signal.
    pub fn is_initialized_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_none() && self.removed.is_none()
    }

    /// Returns true if applying this diff changes nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.changed.as_ref().map_or(true, BTreeMap::is_empty)
            && self.removed.as_ref().map_or(true, BTreeSet::is_empty)
    }

    /// Returns the number of affected rows.
    pub fn len(&self) -> usize {
        self.added.len()
            + self.changed.as_ref().map_or(0, BTreeMap::len)
            + self.removed.as_ref().map_or(0, BTreeSet::len)
    }

    /// Returns the field changes recorded for a row, if any.
    pub fn changed_fields(&self, key: &str) -> Option<&FieldChanges> {
        self.changed.as_ref().and_then(|changed| changed.get(key))
    }

    /// Returns true if the diff removes the given key.
    pub fn removes(&self, key: &str) -> bool {
        self.removed
            .as_ref()
            .map_or(false, |removed| removed.contains(key))
    }
}

/// Computes the minimal diff turning `old` into `new`.
pub fn make_diff(old: &Snapshot, new: &Snapshot) -> Diff {
    let mut diff = Diff::new();

    let removed = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect::<BTreeSet<_>>();
    diff.removed = Some(removed);

    let mut changed = BTreeMap::new();
    for (key, new_row) in new {
        match old.get(key) {
            None => {
                diff.added.insert(key.clone(), new_row.clone());
            }
            Some(old_row) => {
                let fields = row_changes(old_row, new_row);
                if !fields.is_empty() {
                    changed.insert(key.clone(), fields);
                }
            }
        }
    }
    diff.changed = Some(changed);

    diff
}

/// Field-level delta between two versions of a row.
fn row_changes(old: &Row, new: &Row) -> FieldChanges {
    let mut fields = FieldChanges::new();

    for (column, _) in old.iter() {
        if !new.contains(column) {
            fields.insert(column.to_string(), FieldChange::Unset);
        }
    }

    for (column, new_value) in new.iter() {
        if old.get(column) != Some(new_value) {
            fields.insert(column.to_string(), FieldChange::Set(new_value.clone()));
        }
    }

    fields
}
