use std::future::Future;

use crate::error::AppError;
use crate::models::{InsertedId, Record, Source};

/// Fetches the raw body of a document from a URL.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists assembled records.
///
/// Each call must be self-contained (one statement, one implicit
/// transaction) so concurrent jobs can share a single store.
pub trait RecordStore: Send + Sync + Clone + 'static {
    /// Insert `record` as a new row. Returns the generated row identifier.
    fn persist(&self, record: &Record)
    -> impl Future<Output = Result<InsertedId, AppError>> + Send;
}

/// Supplies the list of sources active for a tick.
pub trait SourceProvider: Send + Sync {
    fn sources(&self) -> Result<Vec<Source>, AppError>;
}

/// A RecordStore that accepts everything and stores nothing.
///
/// Useful for dry runs: every job still resolves, fetches and assembles.
#[derive(Debug, Clone)]
pub struct NullStore;

impl RecordStore for NullStore {
    async fn persist(&self, _record: &Record) -> Result<InsertedId, AppError> {
        Ok(InsertedId::dry_run())
    }
}
