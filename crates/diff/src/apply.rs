//! Replaying a diff on a snapshot.
//!
//! `apply_diff` needs nothing but the snapshot and the diff, so it works on a
//! mirror maintained far away from the cache that produced the diff.

use crate::diff::{Diff, FieldChange, Snapshot};
use log::warn;

/// Applies `diff` to `snapshot` in place.
///
/// Removals run first, then additions, then field changes. Missing sections
/// (`None`) are skipped. A field change for a key the snapshot does not hold is
/// skipped with a warning; it means the mirror diverged from the source.
pub fn apply_diff(snapshot: &mut Snapshot, diff: &Diff) {
    if let Some(removed) = &diff.removed {
        for key in removed {
            snapshot.remove(key);
        }
    }

    for (key, row) in &diff.added {
        snapshot.insert(key.clone(), row.clone());
    }

    if let Some(changed) = &diff.changed {
        for (key, fields) in changed {
            let Some(row) = snapshot.get_mut(key) else {
                warn!("Skipping field changes for unknown row key {}", key);
                continue;
            };
            for (column, change) in fields {
                match change {
                    FieldChange::Unset => {
                        row.remove(column);
                    }
                    FieldChange::Set(value) => row.set(column.as_str(), value.clone()),
                }
            }
        }
    }
}

/// Applies `diff` to an owned snapshot and returns the result.
pub fn applied(mut snapshot: Snapshot, diff: &Diff) -> Snapshot {
    apply_diff(&mut snapshot, diff);
    snapshot
}
