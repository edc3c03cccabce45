//! Schema-tolerant access into nested document trees
//!
//! Source documents vary from feed to feed: sections go missing, scalars show
//! up as strings in one file and numbers in the next, and lists are sometimes
//! absent instead of empty. `Field` wraps an optional position in the tree so
//! that lookups chain without presence checks, and every typed getter returns
//! an `Option` (or a caller-chosen default) instead of failing.
//!
//! ```rust
//! use scorebook::unnest::Field;
//! use serde_json::json;
//!
//! let doc = json!({"info": {"teams": ["India", "Australia"]}});
//! let root = Field::new(&doc);
//!
//! assert_eq!(root.at("info.teams[1]").str(), Some("Australia"));
//! assert_eq!(root.at("info.toss.winner").str(), None);
//! assert_eq!(root.at("info.overs").i64_or(50), 50);
//! ```

use serde_json::{Map, Value};
use std::fmt;

/// One step of a path: an object key or an array index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A pre-parsed path such as `info.registry.people` or `info.dates[0]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Parse a dotted path with optional `[n]` index suffixes.
    ///
    /// Malformed index brackets are kept as part of the key, so they simply
    /// never match anything.
    pub fn parse(path: &str) -> Self {
        FieldPath(segments(path).collect())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
            first = false;
        }
        Ok(())
    }
}

fn segments(path: &str) -> impl Iterator<Item = Segment> + '_ {
    path.split('.')
        .filter(|part| !part.is_empty())
        .flat_map(|part| {
            let mut out = Vec::new();
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                out.push(Segment::Key(key.to_string()));
            }
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else {
                    out.push(Segment::Key(rest.to_string()));
                    break;
                };
                match stripped[..end].parse::<usize>() {
                    Ok(idx) => out.push(Segment::Index(idx)),
                    Err(_) => out.push(Segment::Key(stripped[..end].to_string())),
                }
                rest = &stripped[end + 1..];
            }
            out
        })
}

/// A possibly-absent position in a document tree
#[derive(Debug, Clone, Copy)]
pub struct Field<'a>(Option<&'a Value>);

impl<'a> Field<'a> {
    pub fn new(value: &'a Value) -> Self {
        Field(Some(value))
    }

    pub fn absent() -> Self {
        Field(None)
    }

    /// Object member lookup; absent when this is not an object or lacks `key`
    pub fn key(self, key: &str) -> Field<'a> {
        Field(self.0.and_then(|v| v.as_object()).and_then(|obj| obj.get(key)))
    }

    /// Array element lookup; absent when this is not an array or too short
    pub fn index(self, idx: usize) -> Field<'a> {
        Field(self.0.and_then(|v| v.as_array()).and_then(|arr| arr.get(idx)))
    }

    /// Follow a dotted path, e.g. `"info.outcome.by.runs"`
    pub fn at(self, path: &str) -> Field<'a> {
        segments(path).fold(self, |field, segment| field.step(&segment))
    }

    /// Follow a pre-parsed path
    pub fn get(self, path: &FieldPath) -> Field<'a> {
        path.segments().iter().fold(self, |field, segment| field.step(segment))
    }

    fn step(self, segment: &Segment) -> Field<'a> {
        match segment {
            Segment::Key(key) => self.key(key),
            Segment::Index(idx) => self.index(*idx),
        }
    }

    /// True when the path exists, even if its value is `null`
    pub fn is_present(self) -> bool {
        self.0.is_some()
    }

    pub fn is_null(self) -> bool {
        matches!(self.0, Some(Value::Null))
    }

    /// The raw value, with explicit `null` treated as absent
    pub fn value(self) -> Option<&'a Value> {
        self.0.filter(|v| !v.is_null())
    }

    pub fn str(self) -> Option<&'a str> {
        self.0.and_then(|v| v.as_str())
    }

    /// Scalar rendered as text: strings as-is, numbers and booleans formatted.
    /// Useful for fields like `season` that arrive as `2009` or `"2009/10"`.
    pub fn text(self) -> Option<String> {
        match self.0? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integer value; integral floats are accepted, other types are not
    pub fn i64(self) -> Option<i64> {
        let Value::Number(n) = self.0? else {
            return None;
        };
        n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }

    pub fn i64_or(self, default: i64) -> i64 {
        self.i64().unwrap_or(default)
    }

    pub fn f64(self) -> Option<f64> {
        self.0.and_then(|v| v.as_f64())
    }

    /// Array elements, empty when absent or not an array
    pub fn array(self) -> &'a [Value] {
        self.0
            .and_then(|v| v.as_array())
            .map(|arr| arr.as_slice())
            .unwrap_or(&[])
    }

    /// Array elements as fields, empty when absent or not an array
    pub fn items(self) -> impl Iterator<Item = Field<'a>> {
        self.array().iter().map(Field::new)
    }

    pub fn object(self) -> Option<&'a Map<String, Value>> {
        self.0.and_then(|v| v.as_object())
    }

    /// Object members in document order, empty when absent or not an object
    pub fn entries(self) -> impl Iterator<Item = (&'a str, Field<'a>)> {
        self.object()
            .into_iter()
            .flat_map(|obj| obj.iter().map(|(k, v)| (k.as_str(), Field::new(v))))
    }
}
