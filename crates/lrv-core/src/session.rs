//! One open document: its editor tree, index and the save path back to the store.
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::collect::TreeCollector;
use crate::error::{Result, ReviewError};
use crate::flags::{FlagMap, apply_flags, collect_flags};
use crate::list::ListController;
use crate::matcher::PathMatcher;
use crate::path::FieldPath;
use crate::store::{DocumentStore, SaveReceipt};
use crate::tree::{BuildOutput, EditorNode, FlagNode, RowId, TreeBuilder, TreeIndex, WidgetNode};

/// External check run on the patched document before it is saved.
pub type Validator = Box<dyn Fn(&Value) -> std::result::Result<(), String>>;

/// Builds the editor tree for `value` and seeds its flags from `saved_flags`.
pub fn build_tree(matcher: &PathMatcher, value: &Value, saved_flags: &FlagMap) -> BuildOutput {
    let mut out = TreeBuilder::new(matcher).build(value, &FieldPath::root());
    apply_flags(&mut out.index, saved_flags);
    out
}

pub struct ReviewSession {
    matcher: Arc<PathMatcher>,
    doc_id: String,
    /// Whole stored document as last loaded or saved.
    document: Value,
    /// Editable subtree of `document`, the baseline for collect.
    payload: Value,
    pdf: Option<PathBuf>,
    root: Option<WidgetNode>,
    index: TreeIndex,
    validator: Option<Validator>,
}

impl std::fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSession")
            .field("doc_id", &self.doc_id)
            .field("editors", &self.index.editors.len())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ReviewSession {
    /// Loads `id` and builds its tree. Nothing is kept if any step fails.
    pub fn open(store: &dyn DocumentStore, matcher: Arc<PathMatcher>, id: &str) -> Result<Self> {
        let loaded = store.load_document(id)?;
        let document = loaded.working_value().clone();
        let mut session =
            Self::from_value(matcher, id, document, &loaded.flags.unwrap_or_default())?;
        session.pdf = loaded.pdf;
        Ok(session)
    }

    /// Session over an in-memory document, without a store round trip.
    pub fn from_value(
        matcher: Arc<PathMatcher>,
        id: &str,
        document: Value,
        saved_flags: &FlagMap,
    ) -> Result<Self> {
        let root_path = matcher.payload_root();
        let payload = root_path
            .get(&document)
            .cloned()
            .ok_or_else(|| ReviewError::MissingPayload(root_path.to_string()))?;
        let BuildOutput { root, index } = build_tree(&matcher, &payload, saved_flags);
        Ok(Self {
            matcher,
            doc_id: id.to_string(),
            document,
            payload,
            pdf: None,
            root,
            index,
            validator: None,
        })
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn pdf(&self) -> Option<&PathBuf> {
        self.pdf.as_ref()
    }

    pub fn tree(&self) -> Option<&WidgetNode> {
        self.root.as_ref()
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    /// Tree and index borrowed together, for hosts that render one while
    /// editing the other.
    pub fn view_mut(&mut self) -> (Option<&WidgetNode>, &mut TreeIndex) {
        (self.root.as_ref(), &mut self.index)
    }

    pub fn editor_mut(&mut self, path: &FieldPath) -> Option<&mut EditorNode> {
        self.index.editor_mut(path)
    }

    pub fn flag_mut(&mut self, path: &FieldPath) -> Option<&mut FlagNode> {
        self.index.flag_mut(path)
    }

    /// The editable payload rebuilt from current editor state.
    pub fn collect_payload(&self) -> Result<Value> {
        TreeCollector::new(&self.matcher, &self.index).collect(&self.payload, &FieldPath::root())
    }

    /// The whole document with the collected payload spliced in at the payload root.
    pub fn collect_tree(&self) -> Result<Value> {
        let payload = self.collect_payload()?;
        let root_path = self.matcher.payload_root();
        if root_path.is_root() {
            return Ok(payload);
        }
        let mut doc = self.document.clone();
        let slot = root_path
            .get_mut(&mut doc)
            .ok_or_else(|| ReviewError::MissingPayload(root_path.to_string()))?;
        *slot = payload;
        Ok(doc)
    }

    pub fn collect_flags(&self) -> FlagMap {
        collect_flags(&self.index)
    }

    pub fn add_item(&mut self, path: &FieldPath) -> Result<RowId> {
        let (node, id) = ListController::new(&self.matcher).add_item(&mut self.index, path)?;
        self.splice(path, node);
        Ok(id)
    }

    pub fn remove_item(&mut self, path: &FieldPath, row: RowId) -> Result<()> {
        let node = ListController::new(&self.matcher).remove_item(&mut self.index, path, row)?;
        self.splice(path, node);
        Ok(())
    }

    fn splice(&mut self, path: &FieldPath, node: WidgetNode) {
        if let Some(slot) = self.root.as_mut().and_then(|r| r.find_list_mut(path)) {
            *slot = node;
        }
    }

    /// Collects value and flags and hands them to the store.
    ///
    /// Editor state is never touched here, so a failed save can be retried.
    pub fn save(&mut self, store: &dyn DocumentStore) -> Result<SaveReceipt> {
        let patched = self.collect_tree()?;
        let flags = self.collect_flags();
        if let Some(validate) = &self.validator {
            validate(&patched).map_err(ReviewError::Validation)?;
        }
        let receipt = store.save_document(&self.doc_id, &patched, &flags)?;
        if !receipt.ok {
            let msg = receipt
                .message
                .clone()
                .unwrap_or_else(|| "save rejected".to_string());
            tracing::warn!(id = %self.doc_id, "{msg}");
            return Err(ReviewError::Storage(msg));
        }
        self.document = patched;
        tracing::info!(id = %self.doc_id, flags = flags.len(), "review saved");
        Ok(receipt)
    }
}
