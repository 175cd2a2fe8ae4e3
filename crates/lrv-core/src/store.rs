//! Storage collaborator: where documents come from and where corrections go.
//!
//! `DirStore` keeps everything for one document next to each other:
//!
//! ```text
//! <dir>/<id>.json            extracted output (never modified)
//! <dir>/<id>.corrected.json  reviewer's corrected value
//! <dir>/<id>.flags.json      {"path": true, ...}
//! <dir>/<id>.pdf             source scan, passed to hosts as an opaque reference
//! <dir>/backups/<id>_<ts>.zip previous corrected/flags files
//! <dir>/rules.json           optional field rules, not a document
//! ```
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::config::RULES_FILE;
use crate::error::{Result, ReviewError};
use crate::flags::FlagMap;

const CORRECTED_SUFFIX: &str = ".corrected.json";
const FLAGS_SUFFIX: &str = ".flags.json";
const BACKUP_DIR: &str = "backups";

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub original: Value,
    /// Last saved correction, if any.
    pub current: Option<Value>,
    pub flags: Option<FlagMap>,
    pub pdf: Option<PathBuf>,
}

impl LoadedDocument {
    /// The value to edit: the saved correction, else the original output.
    pub fn working_value(&self) -> &Value {
        self.current.as_ref().unwrap_or(&self.original)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub ok: bool,
    pub message: Option<String>,
}

impl SaveReceipt {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }
}

pub trait DocumentStore {
    fn list_documents(&self) -> Result<Vec<String>>;
    fn load_document(&self, id: &str) -> Result<LoadedDocument>;
    fn save_document(&self, id: &str, value: &Value, flags: &FlagMap) -> Result<SaveReceipt>;
}

#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    backup_on_save: bool,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_on_save: true,
        }
    }

    pub fn with_backup(mut self, on: bool) -> Self {
        self.backup_on_save = on;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn original_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn corrected_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", id, CORRECTED_SUFFIX))
    }

    fn flags_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", id, FLAGS_SUFFIX))
    }

    fn pdf_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.pdf", id))
    }

    /// Zips the current corrected and flag files of `id`, if any exist.
    /// Returns the archive path, or `None` when there was nothing to back up.
    pub fn backup_document(&self, id: &str) -> io::Result<Option<PathBuf>> {
        let sources: Vec<PathBuf> = [self.corrected_path(id), self.flags_path(id)]
            .into_iter()
            .filter(|p| p.is_file())
            .collect();
        if sources.is_empty() {
            return Ok(None);
        }
        let dir = self.root.join(BACKUP_DIR);
        fs::create_dir_all(&dir)?;
        let ts = chrono::Local::now().format("%Y%m%d-%H%M%S%3f");
        let dest = dir.join(format!("{}_{}.zip", id, ts));

        let file = fs::File::create(&dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        for src in &sources {
            let name = src
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.to_string());
            zip.start_file(name, options)?;
            zip.write_all(&fs::read(src)?)?;
        }
        zip.finish()?;
        Ok(Some(dest))
    }

    /// Replaces the corrected and flag files of `id` together.
    ///
    /// Both files are staged before either is renamed into place. If the
    /// second rename fails the previous flag file is put back, so the pair on
    /// disk is always either the old one or the new one.
    fn commit(&self, id: &str, value: &Value, flags: &FlagMap) -> Result<()> {
        let corrected = self.corrected_path(id);
        let flags_path = self.flags_path(id);
        let corrected_tmp = stage_json(&corrected, value)?;
        let flags_tmp = match stage_json(&flags_path, flags) {
            Ok(tmp) => tmp,
            Err(e) => {
                discard(&[&corrected_tmp]);
                return Err(e);
            }
        };

        let previous_flags = fs::read(&flags_path).ok();
        if let Err(e) = fs::rename(&flags_tmp, &flags_path) {
            discard(&[&corrected_tmp, &flags_tmp]);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&corrected_tmp, &corrected) {
            discard(&[&corrected_tmp]);
            let restored = match previous_flags {
                Some(bytes) => fs::write(&flags_path, bytes),
                None => fs::remove_file(&flags_path),
            };
            if let Err(re) = restored {
                tracing::warn!(id, "cannot restore previous flags: {re}");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn read_optional_json(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Writes `value` next to `path` as `<name>.tmp` and returns the temp path.
fn stage_json(path: &Path, value: &impl serde::Serialize) -> Result<PathBuf> {
    let s = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = fs::write(&tmp, s) {
        discard(&[&tmp]);
        return Err(e.into());
    }
    Ok(tmp)
}

fn discard<P: AsRef<Path>>(paths: &[P]) {
    for p in paths {
        let p: &Path = p.as_ref();
        if p.exists()
            && let Err(e) = fs::remove_file(p)
        {
            tracing::warn!(path = %p.display(), "cannot remove temp file: {e}");
        }
    }
}

impl DocumentStore for DirStore {
    fn list_documents(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(ReviewError::Storage(format!(
                "not a directory: {}",
                self.root.display()
            )));
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ReviewError::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name == RULES_FILE
                || name.ends_with(CORRECTED_SUFFIX)
                || name.ends_with(FLAGS_SUFFIX)
            {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                out.push(id.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    fn load_document(&self, id: &str) -> Result<LoadedDocument> {
        let original_path = self.original_path(id);
        if !original_path.is_file() {
            return Err(ReviewError::Storage(format!("no document '{}'", id)));
        }
        let original = read_json(&original_path)?;
        let current = read_optional_json(&self.corrected_path(id))?;
        let flags = match read_optional_json(&self.flags_path(id))? {
            Some(v) => Some(serde_json::from_value::<FlagMap>(v)?),
            None => None,
        };
        let pdf = Some(self.pdf_path(id)).filter(|p| p.is_file());
        tracing::info!(
            id,
            corrected = current.is_some(),
            flags = flags.as_ref().map_or(0, |f| f.len()),
            "document loaded"
        );
        Ok(LoadedDocument {
            original,
            current,
            flags,
            pdf,
        })
    }

    fn save_document(&self, id: &str, value: &Value, flags: &FlagMap) -> Result<SaveReceipt> {
        if !self.original_path(id).is_file() {
            return Ok(SaveReceipt {
                ok: false,
                message: Some(format!("no document '{}' to correct", id)),
            });
        }
        if self.backup_on_save
            && let Some(zip) = self.backup_document(id)?
        {
            tracing::info!(id, backup = %zip.display(), "previous correction backed up");
        }
        self.commit(id, value, flags)?;
        tracing::info!(id, flags = flags.len(), "document saved");
        Ok(SaveReceipt::ok())
    }
}
