//! lrv-core: editor tree engine for reviewing extracted lease documents
//!
//! A stored JSON document is turned into a tree of leaf editors, edited by a
//! host (CLI or GUI), and collected back into a structurally identical value:
//! - `path` / `matcher`: `a.b[0].c` paths and rule lookup on `a.b[*].c`
//! - `config`: exclusion list and widget overrides, loaded once
//! - `widget`: editor kind per leaf (rule first, then value shape)
//! - `tree` / `collect`: build and collect passes over the same traversal
//! - `list`: add/remove rows with stable row ids
//! - `flags`: sparse per-field review flags
//! - `store` / `session`: load, edit, save one document
//!
pub mod coerce;
pub mod collect;
pub mod config;
pub mod error;
pub mod flags;
pub mod list;
pub mod matcher;
pub mod path;
pub mod session;
pub mod store;
pub mod tree;
pub mod widget;

pub use collect::TreeCollector;
pub use config::{FieldRules, WidgetRule};
pub use error::{ConfigError, PathError, Result, ReviewError};
pub use flags::{FlagMap, apply_flags, collect_flags};
pub use list::ListController;
pub use matcher::PathMatcher;
pub use path::{FieldPath, Segment};
pub use session::{ReviewSession, Validator, build_tree};
pub use store::{DirStore, DocumentStore, LoadedDocument, SaveReceipt};
pub use tree::{
    BuildOutput, EditorInput, EditorNode, FlagNode, LabeledNode, ListRow, RowId, TreeBuilder,
    TreeIndex, WidgetNode,
};
pub use widget::{WidgetDirective, WidgetKind, pick_widget};
