//! Review flags: a sparse `path -> true` map persisted next to each document.
use std::collections::BTreeMap;

use crate::path::{FieldPath, Segment};
use crate::tree::{ListState, RowId, TreeIndex};

pub type FlagMap = BTreeMap<String, bool>;

/// Only checked flags are emitted; a missing path means unflagged.
pub fn collect_flags(index: &TreeIndex) -> FlagMap {
    index
        .flags
        .values()
        .filter(|f| f.checked)
        .map(|f| (f.path.to_string(), true))
        .collect()
}

/// Seeds every flag node from `saved`. Paths with no node are ignored.
pub fn apply_flags(index: &mut TreeIndex, saved: &FlagMap) {
    let mut matched = 0usize;
    for flag in index.flags.values_mut() {
        flag.checked = saved.get(&flag.path.to_string()).copied().unwrap_or(false);
        matched += usize::from(flag.checked);
    }
    let stale = saved.values().filter(|on| **on).count().saturating_sub(matched);
    if stale > 0 {
        tracing::debug!(stale, "saved flags without a matching field");
    }
}

/// Checked flags under one list, keyed by the row they belong to rather than
/// by position, so they can be re-applied after rows shift.
#[derive(Debug, Default)]
pub(crate) struct RowFlags(Vec<(RowId, Vec<Segment>)>);

impl RowFlags {
    pub(crate) fn capture(index: &TreeIndex, list_path: &FieldPath, list: &ListState) -> Self {
        let mut out = Vec::new();
        for (i, row) in list.rows.iter().enumerate() {
            let row_path = list_path.index(i);
            for (path, node) in index.flags.range(row_path.clone()..) {
                let Some(tail) = path.strip_prefix(&row_path) else {
                    break;
                };
                if node.checked {
                    out.push((row.id, tail.to_vec()));
                }
            }
        }
        Self(out)
    }

    pub(crate) fn restore(self, index: &mut TreeIndex, list_path: &FieldPath) {
        let Some(list) = index.lists.get(list_path) else {
            return;
        };
        let targets: Vec<FieldPath> = self
            .0
            .iter()
            .filter_map(|(id, tail)| {
                list.position(*id)
                    .map(|pos| list_path.index(pos).join(tail))
            })
            .collect();
        for path in targets {
            if let Some(flag) = index.flags.get_mut(&path) {
                flag.checked = true;
            }
        }
    }
}
