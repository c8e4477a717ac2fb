use serde_json::Value;
use siphon_core::error::AppError;
use siphon_core::models::{InsertedId, Record};
use siphon_core::traits::RecordStore;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};

/// Inserts assembled records into arbitrary tables.
///
/// Identifiers come from mapping files and are always quoted; values are
/// always bound as parameters.
#[derive(Clone)]
pub struct RecordRepository {
    pool: Pool<Postgres>,
    id_column: String,
}

impl RecordRepository {
    pub fn new(pool: PgPool, id_column: impl Into<String>) -> Self {
        Self {
            pool,
            id_column: id_column.into(),
        }
    }

    /// Insert `record` as one row and return its identifier.
    pub async fn insert(&self, record: &Record) -> Result<InsertedId, AppError> {
        let mut query = build_insert(record, &self.id_column)?;
        tracing::debug!(sql = %query.sql(), database = %record.database, "Inserting record");

        let (id,): (Option<String>,) = query
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;

        Ok(InsertedId(id.unwrap_or_else(|| "null".to_string())))
    }
}

impl RecordStore for RecordRepository {
    async fn persist(&self, record: &Record) -> Result<InsertedId, AppError> {
        self.insert(record).await
    }
}

/// Build `INSERT INTO <table> AS inserted (<fields>) VALUES (...) RETURNING <id>`.
///
/// The id is read from the row's JSONB image, so a table without
/// `id_column` still takes the insert and reports a NULL id.
fn build_insert(record: &Record, id_column: &str) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let mut query = QueryBuilder::new("INSERT INTO ");
    query.push(quote_ident_path(&record.table)?);
    query.push(" AS inserted");

    if record.fields.is_empty() {
        query.push(" DEFAULT VALUES");
    } else {
        query.push(" (");
        {
            let mut columns = query.separated(", ");
            for name in record.fields.keys() {
                columns.push(quote_ident(name)?);
            }
        }
        query.push(") VALUES (");
        {
            let mut values = query.separated(", ");
            for (name, value) in &record.fields {
                bind_value(&mut values, name, value)?;
            }
        }
        query.push(")");
    }

    if id_column.is_empty() {
        return Err(AppError::PersistenceFailed("Empty id column name".into()));
    }
    query.push(" RETURNING to_jsonb(inserted) ->> ");
    query.push_bind(id_column.to_string());
    Ok(query)
}

fn bind_value(
    values: &mut Separated<'_, 'static, Postgres, &'static str>,
    name: &str,
    value: &Value,
) -> Result<(), AppError> {
    match value {
        // A typed NULL parameter would need a cast per column; the literal
        // takes the column's type.
        Value::Null => {
            values.push("NULL");
        }
        Value::Bool(b) => {
            values.push_bind(*b);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                values.push_bind(i);
            } else if n.is_u64() {
                return Err(AppError::PersistenceFailed(format!(
                    "Value of '{name}' ({n}) exceeds the BIGINT range"
                )));
            } else if let Some(f) = n.as_f64() {
                values.push_bind(f);
            } else {
                return Err(AppError::PersistenceFailed(format!(
                    "Value of '{name}' ({n}) is not representable"
                )));
            }
        }
        Value::String(s) => {
            values.push_bind(s.clone());
        }
        Value::Array(_) | Value::Object(_) => {
            values.push_bind(Json(value.clone()));
        }
    }
    Ok(())
}

/// Quote a single SQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> Result<String, AppError> {
    if name.is_empty() || name.contains('\0') {
        return Err(AppError::PersistenceFailed(format!(
            "Invalid identifier {name:?}"
        )));
    }
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    Ok(escaped)
}

/// Quote a possibly schema-qualified table name (`schema.table`).
fn quote_ident_path(path: &str) -> Result<String, AppError> {
    let parts = path
        .split('.')
        .map(quote_ident)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("."))
}
