//! Static field rules: which subtrees are hidden from reviewers and which
//! fields get a specific widget.
//!
//! Rules are plain data, loaded once from a JSON file:
//!
//! ```json
//! {
//!   "exclude": ["parties[*].address"],
//!   "widgets": {
//!     "instrument_date": {"type": "datepicker"},
//!     "special_provisions[*].provision_type": {"type": "dropdown", "choices": ["pugh_clause"]}
//!   },
//!   "payload_root": "output[0]"
//! }
//! ```
//!
//! Paths use dot notation for object keys and `[*]` for list indices.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Rules file looked up in a document store directory.
pub const RULES_FILE: &str = "rules.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl WidgetRule {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            choices: Vec::new(),
        }
    }

    pub fn dropdown<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: "dropdown".to_string(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    /// Subtrees never rendered nor edited; passed through untouched on save.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Per-field widget overrides. Not inherited by descendants.
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetRule>,
    /// Editable subtree inside each stored document, e.g. `output[0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_root: Option<String>,
}

impl FieldRules {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let rules = Self::from_json_str(&data)?;
        tracing::info!(
            path = %path.display(),
            exclude = rules.exclude.len(),
            widgets = rules.widgets.len(),
            "loaded field rules"
        );
        Ok(rules)
    }

    /// `<store>/rules.json` when present, else [`FieldRules::lease_defaults`].
    pub fn discover(store_root: &Path) -> Result<Self, ConfigError> {
        let candidate = store_root.join(RULES_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::lease_defaults())
        }
    }

    /// Stock rules for extracted oil and gas lease documents.
    pub fn lease_defaults() -> Self {
        let mut widgets = BTreeMap::new();
        widgets.insert(
            "special_provisions[*].provision_type".to_string(),
            WidgetRule::dropdown([
                "continuous_operations",
                "surface_retained_acreage",
                "depth_retained_acreage",
                "pugh_clause",
                "shut_in_royalty",
            ]),
        );
        for date in ["instrument_date", "primary_term.start_date"] {
            widgets.insert(date.to_string(), WidgetRule::new("datepicker"));
        }
        for long_text in [
            "legal_description",
            "document_details.open_interest_reasoning",
            "document_details.lease_complexity_reasoning",
            "document_details.analysis",
        ] {
            widgets.insert(long_text.to_string(), WidgetRule::new("textarea"));
        }
        Self {
            exclude: vec!["parties[*].address".to_string()],
            widgets,
            payload_root: None,
        }
    }
}
