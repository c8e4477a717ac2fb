use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::extract::Selector;

/// Reserved key naming the document address.
pub const URL_KEY: &str = "url";
/// Reserved key naming the destination table.
pub const TABLE_KEY: &str = "table";

/// A resolved per-source mapping: where to fetch, where to store, and
/// which selector feeds each destination field.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub locator: String,
    pub url: String,
    pub table: String,
    /// Destination field name -> selector. Never contains `url` or `table`.
    pub fields: BTreeMap<String, Selector>,
}

impl Mapping {
    /// Build a mapping from an already decoded key/value table.
    ///
    /// The reserved directives are consumed; every other pair becomes a
    /// field mapping.
    pub fn from_pairs(
        locator: impl Into<String>,
        mut pairs: BTreeMap<String, String>,
    ) -> Result<Self, AppError> {
        let locator = locator.into();
        let url = take_reserved(&mut pairs, URL_KEY, &locator)?;
        let table = take_reserved(&mut pairs, TABLE_KEY, &locator)?;

        let fields = pairs
            .into_iter()
            .map(|(field, selector)| (field, Selector::parse(&selector)))
            .collect();

        Ok(Self {
            locator,
            url,
            table,
            fields,
        })
    }

    /// Destination field names in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

fn take_reserved(
    pairs: &mut BTreeMap<String, String>,
    key: &'static str,
    locator: &str,
) -> Result<String, AppError> {
    match pairs.remove(key).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::MappingIncomplete {
            locator: locator.to_string(),
            key,
        }),
    }
}

/// Loads mapping documents from the filesystem.
///
/// Relative locators are resolved against `base_dir`; absolute locators
/// are used as-is.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    base_dir: PathBuf,
}

impl Default for MappingResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl MappingResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Read, parse and validate the mapping identified by `locator`.
    pub fn resolve(&self, locator: &str) -> Result<Mapping, AppError> {
        let path = self.path_for(locator);

        let content = std::fs::read_to_string(&path).map_err(|e| AppError::MappingUnreadable {
            locator: locator.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;

        let pairs = parse_flat_object(locator, &content)?;
        Mapping::from_pairs(locator, pairs)
    }

    fn path_for(&self, locator: &str) -> PathBuf {
        let candidate = Path::new(locator.trim());
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}

/// Decode `content` as a JSON object whose values are all strings.
fn parse_flat_object(locator: &str, content: &str) -> Result<BTreeMap<String, String>, AppError> {
    let unparseable = |reason: String| AppError::MappingUnparseable {
        locator: locator.to_string(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| unparseable(format!("invalid JSON: {e}")))?;

    let object = match value {
        serde_json::Value::Object(object) => object,
        other => {
            return Err(unparseable(format!(
                "expected an object, found {}",
                crate::extract::kind_of(&other)
            )));
        }
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            other => Err(unparseable(format!(
                "value of '{key}' must be a string, found {}",
                crate::extract::kind_of(&other)
            ))),
        })
        .collect()
}
