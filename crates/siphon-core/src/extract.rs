//! Path-based lookups into untyped JSON documents.
//!
//! A selector such as `data/items/0/price` is a chain of segments applied
//! from the document root. Object nodes are entered by key, array nodes by
//! decimal index. Reaching a scalar while segments remain is a
//! [`ExtractError::TypeMismatch`]; a missing key or index is a
//! [`ExtractError::PathNotFound`]. A `null` that is actually present in the
//! document is returned as a value, never confused with an absent path.
//!
//! Segments use the JSON Pointer escapes: `~1` stands for `/` and `~0` for
//! `~`, so keys containing slashes remain addressable.

use std::fmt;

use serde_json::Value;

use crate::error::ExtractError;

/// A parsed selector: an ordered list of path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    segments: Vec<String>,
}

impl Selector {
    /// Parse a selector string. Parsing never fails; an empty selector
    /// addresses the whole document.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed.trim_matches('/');
        let segments = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').map(unescape_segment).collect()
        };
        Self {
            raw: trimmed.to_string(),
            segments,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn not_found(&self, segment: &str) -> ExtractError {
        ExtractError::PathNotFound {
            selector: self.raw.clone(),
            segment: segment.to_string(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::parse(raw)
    }
}

fn unescape_segment(segment: &str) -> String {
    if segment.contains('~') {
        segment.replace("~1", "/").replace("~0", "~")
    } else {
        segment.to_string()
    }
}

/// Human-readable kind of a JSON node, used in mismatch errors.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a raw payload into a document tree.
pub fn parse_document(raw: &str) -> Result<Value, ExtractError> {
    serde_json::from_str(raw).map_err(|e| ExtractError::InvalidDocument(e.to_string()))
}

/// Resolve `selector` against an already parsed document.
///
/// The returned value borrows from `document` and is never converted:
/// numbers stay numbers, strings stay strings.
pub fn extract<'a>(document: &'a Value, selector: &Selector) -> Result<&'a Value, ExtractError> {
    let mut node = document;
    for segment in &selector.segments {
        node = match node {
            Value::Object(map) => map.get(segment).ok_or_else(|| selector.not_found(segment))?,
            Value::Array(items) => {
                let index = parse_index(segment).ok_or_else(|| selector.not_found(segment))?;
                items.get(index).ok_or_else(|| selector.not_found(segment))?
            }
            scalar => {
                return Err(ExtractError::TypeMismatch {
                    selector: selector.raw.clone(),
                    segment: segment.clone(),
                    found: kind_of(scalar),
                });
            }
        };
    }
    Ok(node)
}

/// Parse `raw` and resolve a single selector against it.
pub fn extract_raw(raw: &str, selector: &str) -> Result<Value, ExtractError> {
    let document = parse_document(raw)?;
    extract(&document, &Selector::parse(selector)).cloned()
}

/// Array indices are plain decimal digits; signs and whitespace are rejected.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
