//! Growing and shrinking rendered arrays.
//!
//! Every mutation first copies current editor state back into the list's
//! rows, then changes the rows, then rebuilds only that list's subtree.
//! Flags travel with their row id, so removing a middle row never leaves a
//! flag on the element that slid into its position.
use serde_json::{Map, Value};

use crate::collect::TreeCollector;
use crate::error::{Result, ReviewError};
use crate::flags::RowFlags;
use crate::matcher::PathMatcher;
use crate::path::FieldPath;
use crate::tree::{ListItem, RowId, TreeBuilder, TreeIndex, WidgetNode};

pub struct ListController<'a> {
    matcher: &'a PathMatcher,
}

impl<'a> ListController<'a> {
    pub fn new(matcher: &'a PathMatcher) -> Self {
        Self { matcher }
    }

    /// Appends a blank element: `{}` when the list holds objects, else `null`.
    /// Returns the rebuilt `List` node for `path` and the new row's id.
    pub fn add_item(
        &self,
        index: &mut TreeIndex,
        path: &FieldPath,
    ) -> Result<(WidgetNode, RowId)> {
        let mut rows = self.synced_rows(index, path)?;
        let blank = match rows.first().map(|r| &r.value) {
            Some(Value::Object(_)) => Value::Object(Map::new()),
            _ => Value::Null,
        };
        let id = index.allocate_row();
        rows.push(ListItem { id, value: blank });
        tracing::debug!(path = %path, len = rows.len(), "list item added");
        Ok((self.replace_rows(index, path, rows), id))
    }

    /// Drops the row with identity `id`. The list is replaced as a whole.
    pub fn remove_item(
        &self,
        index: &mut TreeIndex,
        path: &FieldPath,
        id: RowId,
    ) -> Result<WidgetNode> {
        let rows = self.synced_rows(index, path)?;
        let before = rows.len();
        let rows: Vec<ListItem> = rows.into_iter().filter(|r| r.id != id).collect();
        if rows.len() == before {
            return Err(ReviewError::UnknownRow {
                path: path.to_string(),
                row: id,
            });
        }
        tracing::debug!(path = %path, row = id, len = rows.len(), "list item removed");
        Ok(self.replace_rows(index, path, rows))
    }

    /// Rows of the list at `path` with each element re-collected from its editors.
    fn synced_rows(&self, index: &TreeIndex, path: &FieldPath) -> Result<Vec<ListItem>> {
        let list = index
            .list(path)
            .ok_or_else(|| ReviewError::UnboundPath(path.to_string()))?;
        let collector = TreeCollector::new(self.matcher, index);
        list.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Ok(ListItem {
                    id: row.id,
                    value: collector.collect(&row.value, &path.index(i))?,
                })
            })
            .collect()
    }

    fn replace_rows(
        &self,
        index: &mut TreeIndex,
        path: &FieldPath,
        rows: Vec<ListItem>,
    ) -> WidgetNode {
        let flags = match index.list(path) {
            Some(list) => RowFlags::capture(index, path, list),
            None => RowFlags::default(),
        };
        index.prune_below(path);
        if let Some(list) = index.lists.get_mut(path) {
            list.rows = rows;
        }
        let node = TreeBuilder::new(self.matcher).build_list(path, index);
        flags.restore(index, path);
        node
    }
}
