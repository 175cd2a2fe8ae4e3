//! Compiled form of [`FieldRules`]: exclusion and directive lookup by
//! normalized path.
use std::collections::{HashMap, HashSet};

use crate::config::{FieldRules, WidgetRule};
use crate::error::ConfigError;
use crate::path::{FieldPath, canonical_rule, normalized_prefix};

#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    excluded: HashSet<String>,
    widgets: HashMap<String, WidgetRule>,
    payload_root: FieldPath,
}

impl PathMatcher {
    pub fn new(rules: &FieldRules) -> Result<Self, ConfigError> {
        let invalid = |e: crate::error::PathError| ConfigError::InvalidRulePath {
            path: e.path,
            reason: e.reason,
        };
        let mut excluded = HashSet::with_capacity(rules.exclude.len());
        for rule in &rules.exclude {
            excluded.insert(canonical_rule(rule).map_err(invalid)?);
        }
        let mut widgets = HashMap::with_capacity(rules.widgets.len());
        for (rule, directive) in &rules.widgets {
            widgets.insert(canonical_rule(rule).map_err(invalid)?, directive.clone());
        }
        let payload_root = match &rules.payload_root {
            Some(root) => FieldPath::parse(root).map_err(invalid)?,
            None => FieldPath::root(),
        };
        Ok(Self {
            excluded,
            widgets,
            payload_root,
        })
    }

    /// True if `path` or any of its ancestors normalizes to an exclusion rule.
    pub fn is_excluded(&self, path: &FieldPath) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let segs = path.segments();
        (1..=segs.len())
            .rev()
            .any(|len| self.excluded.contains(&normalized_prefix(&segs[..len])))
    }

    /// Exact directive for this path's normalized form. Ancestors are not consulted.
    pub fn directive(&self, path: &FieldPath) -> Option<&WidgetRule> {
        self.widgets.get(&path.normalize())
    }

    pub fn payload_root(&self) -> &FieldPath {
        &self.payload_root
    }
}

impl TryFrom<&FieldRules> for PathMatcher {
    type Error = ConfigError;

    fn try_from(rules: &FieldRules) -> Result<Self, Self::Error> {
        Self::new(rules)
    }
}
