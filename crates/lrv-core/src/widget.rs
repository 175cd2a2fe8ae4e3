//! Editor kind resolution for a leaf.
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde_json::Value;

use crate::coerce::to_text;
use crate::error::ConfigError;
use crate::matcher::PathMatcher;
use crate::path::FieldPath;

/// Strings longer than this (in characters) get a multi-line editor.
pub const TEXTAREA_THRESHOLD: usize = 80;
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Textbox,
    Textarea,
    Dropdown,
    Datepicker,
    /// Inferred for booleans only; rules cannot request it.
    Checkbox,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Textbox => "textbox",
            WidgetKind::Textarea => "textarea",
            WidgetKind::Dropdown => "dropdown",
            WidgetKind::Datepicker => "datepicker",
            WidgetKind::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a kind named in a rule. Only the four rule-selectable kinds are accepted.
impl FromStr for WidgetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "textbox" => Ok(WidgetKind::Textbox),
            "textarea" => Ok(WidgetKind::Textarea),
            "dropdown" => Ok(WidgetKind::Dropdown),
            "datepicker" => Ok(WidgetKind::Datepicker),
            _ => Err(ConfigError::UnsupportedWidget(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDirective {
    pub kind: WidgetKind,
    /// Dropdown options, current value included. Empty for other kinds.
    pub choices: Vec<String>,
}

impl WidgetDirective {
    pub fn plain(kind: WidgetKind) -> Self {
        Self {
            kind,
            choices: Vec::new(),
        }
    }
}

/// First ten characters of `s` as an ISO calendar date.
pub fn iso_date_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, ISO_DATE_FORMAT).ok()
}

/// Picks the editor for the leaf at `path` holding `value`.
///
/// A rule for the exact normalized path wins; an unknown kind in that rule
/// degrades to a textbox. Without a rule the kind is inferred from the value.
pub fn pick_widget(matcher: &PathMatcher, path: &FieldPath, value: &Value) -> WidgetDirective {
    if let Some(rule) = matcher.directive(path) {
        match rule.kind.parse::<WidgetKind>() {
            Ok(WidgetKind::Dropdown) => {
                let mut choices = rule.choices.clone();
                if !value.is_null() {
                    let current = to_text(value);
                    if !choices.contains(&current) {
                        choices.push(current);
                    }
                }
                return WidgetDirective {
                    kind: WidgetKind::Dropdown,
                    choices,
                };
            }
            Ok(kind) => return WidgetDirective::plain(kind),
            Err(e) => {
                tracing::warn!(path = %path, "{e}; falling back to textbox");
                return WidgetDirective::plain(WidgetKind::Textbox);
            }
        }
    }
    WidgetDirective::plain(infer_kind(value))
}

fn infer_kind(value: &Value) -> WidgetKind {
    match value {
        Value::Bool(_) => WidgetKind::Checkbox,
        Value::String(s) if iso_date_prefix(s).is_some() => WidgetKind::Datepicker,
        Value::String(s) if s.contains('\n') || s.chars().count() > TEXTAREA_THRESHOLD => {
            WidgetKind::Textarea
        }
        _ => WidgetKind::Textbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldRules, WidgetRule};
    use serde_json::json;

    fn matcher_with(path: &str, rule: WidgetRule) -> PathMatcher {
        let mut rules = FieldRules::default();
        rules.widgets.insert(path.to_string(), rule);
        PathMatcher::new(&rules).unwrap()
    }

    fn p(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn inference_by_shape() {
        let m = PathMatcher::default();
        let kind = |v: Value| pick_widget(&m, &p("x"), &v).kind;
        assert_eq!(kind(json!(true)), WidgetKind::Checkbox);
        assert_eq!(kind(json!("2021-04-01")), WidgetKind::Datepicker);
        assert_eq!(kind(json!("2021-04-01T10:00:00Z")), WidgetKind::Datepicker);
        assert_eq!(kind(json!("2021-13-01")), WidgetKind::Textbox);
        assert_eq!(kind(json!("line one\nline two")), WidgetKind::Textarea);
        assert_eq!(kind(json!("x".repeat(81))), WidgetKind::Textarea);
        assert_eq!(kind(json!("x".repeat(80))), WidgetKind::Textbox);
        assert_eq!(kind(json!(12.5)), WidgetKind::Textbox);
        assert_eq!(kind(Value::Null), WidgetKind::Textbox);
    }

    #[test]
    fn date_prefix_respects_char_boundaries() {
        assert!(iso_date_prefix("2020-01-0é").is_none());
        assert!(iso_date_prefix("short").is_none());
    }

    #[test]
    fn dropdown_appends_current_value() {
        let m = matcher_with("provisions[*].kind", WidgetRule::dropdown(["a", "b"]));
        let w = pick_widget(&m, &p("provisions[3].kind"), &json!("zz"));
        assert_eq!(w.kind, WidgetKind::Dropdown);
        assert_eq!(w.choices, vec!["a", "b", "zz"]);
        let w = pick_widget(&m, &p("provisions[0].kind"), &json!("b"));
        assert_eq!(w.choices, vec!["a", "b"]);
    }

    #[test]
    fn rule_overrides_inference_without_inheritance() {
        let m = matcher_with("notes", WidgetRule::new("textarea"));
        assert_eq!(pick_widget(&m, &p("notes"), &json!("x")).kind, WidgetKind::Textarea);
        assert_eq!(
            pick_widget(&m, &p("notes.inner"), &json!("x")).kind,
            WidgetKind::Textbox
        );
    }

    #[test]
    fn unknown_kind_degrades_to_textbox() {
        let m = matcher_with("flag", WidgetRule::new("slider"));
        assert_eq!(pick_widget(&m, &p("flag"), &json!(true)).kind, WidgetKind::Textbox);
        let m = matcher_with("flag", WidgetRule::new("checkbox"));
        assert_eq!(pick_widget(&m, &p("flag"), &json!(true)).kind, WidgetKind::Textbox);
    }
}
