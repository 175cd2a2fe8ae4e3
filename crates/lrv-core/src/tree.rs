//! Editor tree: the widget structure handed to hosts and the path-keyed index
//! of every editor, flag and list backing it.
//!
//! `TreeBuilder` walks a JSON value once and returns both as a [`BuildOutput`].
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::coerce::{from_text, to_text};
use crate::error::{Result, ReviewError};
use crate::matcher::PathMatcher;
use crate::path::FieldPath;
use crate::widget::{ISO_DATE_FORMAT, WidgetDirective, WidgetKind, iso_date_prefix, pick_widget};

/// Stable identity of a list row for the lifetime of a session.
pub type RowId = u64;

/// Current state of one leaf control.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorInput {
    Text(String),
    Checked(bool),
    Date(Option<NaiveDate>),
    Choice(Option<String>),
}

#[derive(Debug, Clone)]
pub struct EditorNode {
    pub path: FieldPath,
    pub widget: WidgetDirective,
    pub input: EditorInput,
    /// Value the editor was built from.
    initial: Value,
    initial_input: EditorInput,
}

impl EditorNode {
    pub fn new(path: FieldPath, widget: WidgetDirective, value: &Value) -> Self {
        let input = match widget.kind {
            WidgetKind::Checkbox => match value {
                Value::Bool(b) => EditorInput::Checked(*b),
                other => EditorInput::Text(to_text(other)),
            },
            WidgetKind::Datepicker => {
                EditorInput::Date(value.as_str().and_then(iso_date_prefix))
            }
            WidgetKind::Dropdown => {
                EditorInput::Choice((!value.is_null()).then(|| to_text(value)))
            }
            WidgetKind::Textbox | WidgetKind::Textarea => EditorInput::Text(to_text(value)),
        };
        Self {
            path,
            widget,
            initial: value.clone(),
            initial_input: input.clone(),
            input,
        }
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    pub fn is_dirty(&self) -> bool {
        self.input != self.initial_input
    }

    /// Replaces the input with text parsed for this editor's kind.
    ///
    /// Plain text is always accepted and coerced on collect. Typed editors
    /// only take what their control could hold: `true`/`false` for a
    /// checkbox, an ISO date or nothing for a datepicker, one of the choices
    /// or nothing for a dropdown. Rejected text leaves the input unchanged.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let t = text.trim();
        let input = match self.widget.kind {
            WidgetKind::Checkbox => match from_text(t) {
                Value::Bool(b) => EditorInput::Checked(b),
                _ => return Err(self.reject(t, "expected true or false")),
            },
            WidgetKind::Datepicker if t.is_empty() => EditorInput::Date(None),
            WidgetKind::Datepicker => match iso_date_prefix(t) {
                Some(d) => EditorInput::Date(Some(d)),
                None => return Err(self.reject(t, "expected a YYYY-MM-DD date")),
            },
            WidgetKind::Dropdown if t.is_empty() => EditorInput::Choice(None),
            WidgetKind::Dropdown => {
                if !self.widget.choices.iter().any(|c| c == t) {
                    return Err(self.reject(t, "is not one of the dropdown choices"));
                }
                EditorInput::Choice(Some(t.to_string()))
            }
            WidgetKind::Textbox | WidgetKind::Textarea => EditorInput::Text(text),
        };
        self.input = input;
        Ok(())
    }

    fn reject(&self, text: &str, reason: &str) -> ReviewError {
        ReviewError::InvalidInput {
            path: self.path.to_string(),
            reason: format!("'{}' {}", text, reason),
        }
    }

    /// Current value. Typed controls win over text coercion, and an untouched
    /// editor hands back exactly the value it was built from.
    pub fn value(&self) -> Value {
        if !self.is_dirty() {
            return self.initial.clone();
        }
        match &self.input {
            EditorInput::Text(t) => from_text(t),
            EditorInput::Checked(b) => Value::Bool(*b),
            EditorInput::Date(Some(d)) => Value::String(d.format(ISO_DATE_FORMAT).to_string()),
            EditorInput::Date(None) => Value::Null,
            EditorInput::Choice(Some(c)) => Value::String(c.clone()),
            EditorInput::Choice(None) => Value::Null,
        }
    }

    /// Display text of the current input.
    pub fn text(&self) -> String {
        match &self.input {
            EditorInput::Text(t) => t.clone(),
            EditorInput::Checked(b) => b.to_string(),
            EditorInput::Date(d) => d
                .map(|d| d.format(ISO_DATE_FORMAT).to_string())
                .unwrap_or_default(),
            EditorInput::Choice(c) => c.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagNode {
    pub path: FieldPath,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub id: RowId,
    /// Backing element. Refreshed from editors before every list mutation.
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub rows: Vec<ListItem>,
}

impl ListState {
    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    pub editors: BTreeMap<FieldPath, EditorNode>,
    pub flags: BTreeMap<FieldPath, FlagNode>,
    pub lists: BTreeMap<FieldPath, ListState>,
    next_row: RowId,
}

impl TreeIndex {
    pub fn editor(&self, path: &FieldPath) -> Option<&EditorNode> {
        self.editors.get(path)
    }

    pub fn editor_mut(&mut self, path: &FieldPath) -> Option<&mut EditorNode> {
        self.editors.get_mut(path)
    }

    pub fn flag_mut(&mut self, path: &FieldPath) -> Option<&mut FlagNode> {
        self.flags.get_mut(path)
    }

    pub fn list(&self, path: &FieldPath) -> Option<&ListState> {
        self.lists.get(path)
    }

    pub(crate) fn allocate_row(&mut self) -> RowId {
        self.next_row += 1;
        self.next_row
    }

    /// Drops every editor, flag and list strictly below `prefix`.
    pub(crate) fn prune_below(&mut self, prefix: &FieldPath) {
        let below = |p: &FieldPath| p.len() > prefix.len() && p.starts_with(prefix);
        self.editors.retain(|p, _| !below(p));
        self.flags.retain(|p, _| !below(p));
        self.lists.retain(|p, _| !below(p));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledNode {
    pub label: String,
    pub node: WidgetNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub id: RowId,
    pub caption: Option<String>,
    /// `None` when the whole row is excluded.
    pub node: Option<WidgetNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetNode {
    Group { fields: Vec<LabeledNode> },
    List { path: FieldPath, rows: Vec<ListRow> },
    Leaf { path: FieldPath },
}

impl WidgetNode {
    /// The `List` node bound to `path`, searched depth first.
    pub fn find_list_mut(&mut self, path: &FieldPath) -> Option<&mut WidgetNode> {
        if matches!(&*self, WidgetNode::List { path: p, .. } if p == path) {
            return Some(self);
        }
        match self {
            WidgetNode::List { rows, .. } => rows
                .iter_mut()
                .filter_map(|r| r.node.as_mut())
                .find_map(|n| n.find_list_mut(path)),
            WidgetNode::Group { fields } => {
                fields.iter_mut().find_map(|f| f.node.find_list_mut(path))
            }
            WidgetNode::Leaf { .. } => None,
        }
    }

    /// Leaf paths in render order.
    pub fn leaf_paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.walk_leaves(&mut out);
        out
    }

    fn walk_leaves<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            WidgetNode::Leaf { path } => out.push(path),
            WidgetNode::Group { fields } => fields.iter().for_each(|f| f.node.walk_leaves(out)),
            WidgetNode::List { rows, .. } => rows
                .iter()
                .filter_map(|r| r.node.as_ref())
                .for_each(|n| n.walk_leaves(out)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// `None` when the root itself is excluded.
    pub root: Option<WidgetNode>,
    pub index: TreeIndex,
}

pub struct TreeBuilder<'a> {
    matcher: &'a PathMatcher,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(matcher: &'a PathMatcher) -> Self {
        Self { matcher }
    }

    pub fn build(&self, value: &Value, path: &FieldPath) -> BuildOutput {
        let mut index = TreeIndex::default();
        let root = self.build_node(value, path, &mut index);
        tracing::debug!(
            editors = index.editors.len(),
            lists = index.lists.len(),
            "built editor tree"
        );
        BuildOutput { root, index }
    }

    pub(crate) fn build_node(
        &self,
        value: &Value,
        path: &FieldPath,
        index: &mut TreeIndex,
    ) -> Option<WidgetNode> {
        if self.matcher.is_excluded(path) {
            return None;
        }
        match value {
            Value::Object(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = path.field(key);
                    if let Some(node) = self.build_node(child, &child_path, index) {
                        fields.push(LabeledNode {
                            label: key.clone(),
                            node,
                        });
                    }
                }
                Some(WidgetNode::Group { fields })
            }
            Value::Array(items) => {
                let rows = items
                    .iter()
                    .map(|item| ListItem {
                        id: index.allocate_row(),
                        value: item.clone(),
                    })
                    .collect();
                index.lists.insert(path.clone(), ListState { rows });
                Some(self.build_list(path, index))
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let widget = pick_widget(self.matcher, path, value);
                index
                    .editors
                    .insert(path.clone(), EditorNode::new(path.clone(), widget, value));
                index.flags.insert(
                    path.clone(),
                    FlagNode {
                        path: path.clone(),
                        checked: false,
                    },
                );
                Some(WidgetNode::Leaf { path: path.clone() })
            }
        }
    }

    /// Renders the rows of the already registered list at `path`.
    pub(crate) fn build_list(&self, path: &FieldPath, index: &mut TreeIndex) -> WidgetNode {
        let items: Vec<ListItem> = index
            .lists
            .get(path)
            .map(|l| l.rows.clone())
            .unwrap_or_default();
        let rows = items
            .iter()
            .enumerate()
            .map(|(i, item)| ListRow {
                id: item.id,
                caption: row_caption(&item.value),
                node: self.build_node(&item.value, &path.index(i), index),
            })
            .collect();
        WidgetNode::List {
            path: path.clone(),
            rows,
        }
    }
}

fn row_caption(item: &Value) -> Option<String> {
    item.get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}
