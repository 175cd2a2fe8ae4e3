//! Field paths: `legal_description`, `parties[0].name`, `tracts[2]`.
//!
//! A `FieldPath` is always concrete (real indices) and is the key of every
//! editor, flag and list in the tree index. Rules are written against the
//! normalized form where each index is replaced by `[*]`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::PathError;

pub const WILDCARD: &str = "[*]";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: &str) -> Self {
        let mut segs = self.0.clone();
        segs.push(Segment::Field(name.to_string()));
        Self(segs)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segs = self.0.clone();
        segs.push(Segment::Index(i));
        Self(segs)
    }

    /// Appends every segment of `tail`.
    pub fn join(&self, tail: &[Segment]) -> Self {
        let mut segs = self.0.clone();
        segs.extend_from_slice(tail);
        Self(segs)
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Segments below `prefix`, or `None` when `prefix` is not an ancestor-or-self.
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<&[Segment]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }

    pub fn parse(s: &str) -> Result<Self, PathError> {
        let mut segs = Vec::new();
        for token in tokenize(s)? {
            match token {
                Token::Field(name) => segs.push(Segment::Field(name)),
                Token::Index(i) => segs.push(Segment::Index(i)),
                Token::Any => {
                    return Err(PathError {
                        path: s.to_string(),
                        reason: "wildcard is only allowed in rules".into(),
                    });
                }
            }
        }
        Ok(Self(segs))
    }

    /// Rule-lookup form: every index becomes `[*]`.
    pub fn normalize(&self) -> String {
        normalized_prefix(&self.0)
    }

    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut cur = value;
        for seg in &self.0 {
            cur = match (seg, cur) {
                (Segment::Field(k), Value::Object(map)) => map.get(k)?,
                (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn get_mut<'v>(&self, value: &'v mut Value) -> Option<&'v mut Value> {
        let mut cur = value;
        for seg in &self.0 {
            cur = match (seg, cur) {
                (Segment::Field(k), Value::Object(map)) => map.get_mut(k)?,
                (Segment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }
}

/// Normalized string of a slice of segments; shared by the matcher's prefix scan.
pub(crate) fn normalized_prefix(segs: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segs {
        match seg {
            Segment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            Segment::Index(_) => out.push_str(WILDCARD),
        }
    }
    out
}

/// Canonical normalized form of a rule string. Accepts `[*]` and concrete
/// indices alike, so `parties[0].address` and `parties[*].address` compile to
/// the same rule.
pub fn canonical_rule(s: &str) -> Result<String, PathError> {
    let mut out = String::new();
    for token in tokenize(s)? {
        match token {
            Token::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&name);
            }
            Token::Index(_) | Token::Any => out.push_str(WILDCARD),
        }
    }
    if out.is_empty() {
        return Err(PathError {
            path: s.to_string(),
            reason: "rule must name at least one segment".into(),
        });
    }
    Ok(out)
}

enum Token {
    Field(String),
    Index(usize),
    Any,
}

fn tokenize(s: &str) -> Result<Vec<Token>, PathError> {
    let err = |reason: &str| PathError {
        path: s.to_string(),
        reason: reason.to_string(),
    };
    let mut out = Vec::new();
    if s.is_empty() {
        return Ok(out);
    }
    for (n, piece) in s.split('.').enumerate() {
        let (name, mut rest) = match piece.find('[') {
            Some(pos) => (&piece[..pos], &piece[pos..]),
            None => (piece, ""),
        };
        if name.is_empty() && (n > 0 || rest.is_empty()) {
            return Err(err("empty field name"));
        }
        if !name.is_empty() {
            if name.contains(']') {
                return Err(err("unbalanced ']'"));
            }
            out.push(Token::Field(name.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| err("missing ']'"))?;
            if !rest.starts_with('[') {
                return Err(err("expected '[' after ']'"));
            }
            let inner = &rest[1..close];
            if inner == "*" {
                out.push(Token::Any);
            } else {
                let i = inner
                    .parse::<usize>()
                    .map_err(|_| err("array index must be a non-negative integer or '*'"))?;
                out.push(Token::Index(i));
            }
            rest = &rest[close + 1..];
        }
    }
    Ok(out)
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_and_display() {
        for s in ["legal_description", "parties[0].address", "a.b[2][3].c", "[0]", ""] {
            let p = FieldPath::parse(s).unwrap();
            assert_eq!(p.to_string(), s);
        }
        let p: FieldPath = "parties[1].name".parse().unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Field("parties".into()),
                Segment::Index(1),
                Segment::Field("name".into())
            ]
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("a[x]").is_err());
        assert!(FieldPath::parse("a[1").is_err());
        assert!(FieldPath::parse("a[*].b").is_err());
        assert!(FieldPath::parse(".a").is_err());
    }

    #[test]
    fn normalization_collapses_indices() {
        let a = FieldPath::parse("parties[0].address").unwrap();
        let b = FieldPath::parse("parties[7].address").unwrap();
        assert_eq!(a.normalize(), "parties[*].address");
        assert_eq!(a.normalize(), b.normalize());
        assert_eq!(canonical_rule("parties[3].address").unwrap(), "parties[*].address");
        assert_eq!(canonical_rule("parties[*].address").unwrap(), "parties[*].address");
        assert!(canonical_rule("").is_err());
    }

    #[test]
    fn lookup_and_prefix() {
        let doc = json!({"output": [{"tracts": [{"acres": 40}]}]});
        let p = FieldPath::parse("output[0].tracts[0].acres").unwrap();
        assert_eq!(p.get(&doc), Some(&json!(40)));
        let root = FieldPath::parse("output[0]").unwrap();
        assert!(p.starts_with(&root));
        assert_eq!(
            p.strip_prefix(&root).unwrap(),
            &[
                Segment::Field("tracts".into()),
                Segment::Index(0),
                Segment::Field("acres".into())
            ]
        );
        assert!(FieldPath::parse("output[1]").unwrap().get(&doc).is_none());
    }
}
