use std::collections::BTreeMap;

use crate::error::AppError;
use crate::extract::{extract, parse_document};
use crate::mapping::Mapping;
use crate::models::Record;

/// Turn one fetched document into a [`Record`] using `mapping`.
///
/// Assembly is all-or-nothing: the first field whose selector cannot be
/// resolved aborts with [`AppError::FieldExtractionFailed`] and no partial
/// record is returned. A payload that is not JSON is reported against the
/// first mapped field, or against `"<document>"` when the mapping has none.
pub fn assemble(raw: &str, mapping: &Mapping, database: &str) -> Result<Record, AppError> {
    let document = parse_document(raw).map_err(|cause| AppError::FieldExtractionFailed {
        field: mapping
            .field_names()
            .next()
            .unwrap_or("<document>")
            .to_string(),
        cause,
    })?;

    let mut fields = BTreeMap::new();
    for (field, selector) in &mapping.fields {
        let value = extract(&document, selector).map_err(|cause| {
            AppError::FieldExtractionFailed {
                field: field.clone(),
                cause,
            }
        })?;
        fields.insert(field.clone(), value.clone());
    }

    Ok(Record {
        database: database.to_string(),
        table: mapping.table.clone(),
        fields,
    })
}
