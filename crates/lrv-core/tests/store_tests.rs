use std::cell::RefCell;
use std::fs;
use std::sync::Arc;

use lrv_core::{
    DirStore, DocumentStore, FieldPath, FieldRules, FlagMap, LoadedDocument, PathMatcher,
    ReviewError, ReviewSession, SaveReceipt,
};
use serde_json::{Value, json};

fn p(s: &str) -> FieldPath {
    FieldPath::parse(s).unwrap()
}

fn plain_matcher() -> Arc<PathMatcher> {
    Arc::new(PathMatcher::new(&FieldRules::default()).unwrap())
}

#[test]
fn dir_store_lists_only_original_documents() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lease-b.json"), "{}").unwrap();
    fs::write(dir.path().join("lease-a.json"), "{}").unwrap();
    fs::write(dir.path().join("lease-a.corrected.json"), "{}").unwrap();
    fs::write(dir.path().join("lease-a.flags.json"), "{}").unwrap();
    fs::write(dir.path().join("lease-a.pdf"), b"%PDF").unwrap();
    fs::create_dir(dir.path().join("nested.json")).unwrap();

    let store = DirStore::new(dir.path());
    assert_eq!(store.list_documents().unwrap(), vec!["lease-a", "lease-b"]);

    let missing = DirStore::new(dir.path().join("nope"));
    assert!(matches!(missing.list_documents(), Err(ReviewError::Storage(_))));
}

#[test]
fn load_prefers_corrected_value_and_reads_flags() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("d.json"), r#"{"lessee": "Acme"}"#).unwrap();
    fs::write(dir.path().join("d.corrected.json"), r#"{"lessee": "Acme Oil"}"#).unwrap();
    fs::write(dir.path().join("d.flags.json"), r#"{"lessee": true}"#).unwrap();
    fs::write(dir.path().join("d.pdf"), b"%PDF").unwrap();

    let store = DirStore::new(dir.path());
    let doc = store.load_document("d").unwrap();
    assert_eq!(doc.original, json!({"lessee": "Acme"}));
    assert_eq!(doc.working_value(), &json!({"lessee": "Acme Oil"}));
    assert!(doc.pdf.is_some());

    let s = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    assert_eq!(s.collect_tree().unwrap(), json!({"lessee": "Acme Oil"}));
    assert_eq!(s.collect_flags().get("lessee"), Some(&true));
    assert!(s.pdf().is_some());
}

#[test]
fn save_writes_correction_and_backs_up_previous_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("d.json"),
        r#"{"lessee": "Acme", "tracts": [{"acres": 40}]}"#,
    )
    .unwrap();
    let store = DirStore::new(dir.path());

    let mut s = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    s.editor_mut(&p("tracts[0].acres")).unwrap().set_text("41").unwrap();
    s.add_item(&p("tracts")).unwrap();
    s.flag_mut(&p("lessee")).unwrap().checked = true;
    assert!(s.save(&store).unwrap().ok);
    // first save: nothing to back up yet
    assert!(!dir.path().join("backups").exists());

    let reopened = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    assert_eq!(
        reopened.collect_tree().unwrap(),
        json!({"lessee": "Acme", "tracts": [{"acres": 41}, {}]})
    );
    assert_eq!(reopened.collect_flags().get("lessee"), Some(&true));
    let original: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("d.json")).unwrap()).unwrap();
    assert_eq!(original, json!({"lessee": "Acme", "tracts": [{"acres": 40}]}));

    s.editor_mut(&p("lessee")).unwrap().set_text("Acme Oil").unwrap();
    s.save(&store).unwrap();
    let backups: Vec<_> = fs::read_dir(dir.path().join("backups"))
        .unwrap()
        .flatten()
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].file_name().to_string_lossy().starts_with("d_"));
}

#[test]
fn unparsable_document_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.json"), "{not json").unwrap();
    let store = DirStore::new(dir.path());
    let err = ReviewSession::open(&store, plain_matcher(), "bad").unwrap_err();
    assert!(matches!(err, ReviewError::Parse(_)));
    let err = ReviewSession::open(&store, plain_matcher(), "absent").unwrap_err();
    assert!(matches!(err, ReviewError::Storage(_)));
}

#[test]
fn payload_root_limits_editing_to_one_subtree() {
    let rules = FieldRules {
        payload_root: Some("output[0]".into()),
        ..FieldRules::default()
    };
    let m = Arc::new(PathMatcher::new(&rules).unwrap());
    let doc = json!({"model": "extractor-2", "output": [{"lessee": "Acme"}]});
    let mut s = ReviewSession::from_value(m.clone(), "d", doc, &FlagMap::new()).unwrap();
    assert!(s.index().editor(&p("model")).is_none());
    s.editor_mut(&p("lessee")).unwrap().set_text("Acme Oil").unwrap();
    assert_eq!(
        s.collect_tree().unwrap(),
        json!({"model": "extractor-2", "output": [{"lessee": "Acme Oil"}]})
    );

    let err =
        ReviewSession::from_value(m, "d", json!({"output": []}), &FlagMap::new()).unwrap_err();
    assert!(matches!(err, ReviewError::MissingPayload(ref root) if root == "output[0]"));
}

/// Store that accepts loads but refuses every save.
struct LockedStore {
    doc: Value,
    attempts: RefCell<usize>,
}

impl DocumentStore for LockedStore {
    fn list_documents(&self) -> lrv_core::Result<Vec<String>> {
        Ok(vec!["d".into()])
    }

    fn load_document(&self, _id: &str) -> lrv_core::Result<LoadedDocument> {
        Ok(LoadedDocument {
            original: self.doc.clone(),
            current: None,
            flags: None,
            pdf: None,
        })
    }

    fn save_document(
        &self,
        _id: &str,
        _value: &Value,
        _flags: &FlagMap,
    ) -> lrv_core::Result<SaveReceipt> {
        *self.attempts.borrow_mut() += 1;
        Ok(SaveReceipt {
            ok: false,
            message: Some("document row is locked".into()),
        })
    }
}

#[test]
fn failed_save_keeps_in_memory_edits() {
    let store = LockedStore {
        doc: json!({"lessee": "Acme"}),
        attempts: RefCell::new(0),
    };
    let mut s = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    s.editor_mut(&p("lessee")).unwrap().set_text("Acme Oil").unwrap();

    let err = s.save(&store).unwrap_err();
    assert_eq!(err.to_string(), "storage error: document row is locked");
    assert_eq!(*store.attempts.borrow(), 1);
    assert_eq!(s.index().editor(&p("lessee")).unwrap().text(), "Acme Oil");
    assert_eq!(s.collect_tree().unwrap(), json!({"lessee": "Acme Oil"}));
}

#[test]
fn validator_rejection_aborts_save() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("d.json"), r#"{"acres": 40}"#).unwrap();
    let store = DirStore::new(dir.path());
    let mut s = ReviewSession::open(&store, plain_matcher(), "d")
        .unwrap()
        .with_validator(Box::new(|v: &Value| {
            if v["acres"].as_f64().is_some_and(|a| a > 0.0) {
                Ok(())
            } else {
                Err("acres must be positive".into())
            }
        }));
    s.editor_mut(&p("acres")).unwrap().set_text("-1").unwrap();
    let err = s.save(&store).unwrap_err();
    assert!(matches!(err, ReviewError::Validation(ref m) if m == "acres must be positive"));
    assert!(!dir.path().join("d.corrected.json").exists());

    s.editor_mut(&p("acres")).unwrap().set_text("42.5").unwrap();
    assert!(s.save(&store).unwrap().ok);
    assert!(dir.path().join("d.corrected.json").exists());
}

#[test]
fn failed_flag_write_keeps_previous_correction() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("d.json"), r#"{"a": 1}"#).unwrap();
    let store = DirStore::new(dir.path()).with_backup(false);
    let mut s = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    s.editor_mut(&p("a")).unwrap().set_text("2").unwrap();
    s.save(&store).unwrap();

    // a directory where the flag file should go makes the flag write fail
    let flags_path = dir.path().join("d.flags.json");
    fs::remove_file(&flags_path).unwrap();
    fs::create_dir(&flags_path).unwrap();

    s.editor_mut(&p("a")).unwrap().set_text("3").unwrap();
    let err = s.save(&store).unwrap_err();
    assert!(matches!(err, ReviewError::Io(_)));

    let corrected: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("d.corrected.json")).unwrap())
            .unwrap();
    assert_eq!(corrected, json!({"a": 2}));
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    // the edit is still there for a retry
    assert_eq!(s.collect_tree().unwrap(), json!({"a": 3}));
}

#[test]
fn first_save_with_blocked_flag_file_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("d.json"), r#"{"a": 1}"#).unwrap();
    fs::create_dir(dir.path().join("d.flags.json")).unwrap();
    let store = DirStore::new(dir.path());
    let mut s = ReviewSession::open(&store, plain_matcher(), "d").unwrap();
    s.editor_mut(&p("a")).unwrap().set_text("2").unwrap();

    assert!(s.save(&store).is_err());
    assert!(!dir.path().join("d.corrected.json").exists());
    assert!(!dir.path().join("d.corrected.json.tmp").exists());
    assert!(!dir.path().join("d.flags.json.tmp").exists());
}
