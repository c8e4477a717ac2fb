//! Test utilities: mock implementations of the collaborator traits.
//!
//! All mocks use `Arc<Mutex<_>>` so clones handed to a job share the same
//! recorded state as the handle kept by the test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{InsertedId, Record, Source};
use crate::traits::{Fetcher, RecordStore, SourceProvider};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Response {
    Body(String),
    Error(String),
    Panic,
}

/// Mock fetcher keyed by URL. Unknown URLs fail with a 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Response>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.respond(url, Response::Body(body.to_string()))
    }

    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.respond(url, Response::Error(message.to_string()))
    }

    /// Fetching `url` panics, simulating an unexpected fault inside a job.
    pub fn panicking_on(self, url: &str) -> Self {
        self.respond(url, Response::Panic)
    }

    /// URLs requested so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn respond(self, url: &str, response: Response) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(Response::Body(body)) => Ok(body),
            Some(Response::Error(message)) => Err(AppError::FetchFailed(message)),
            Some(Response::Panic) => panic!("mock fetcher fault for {url}"),
            None => Err(AppError::FetchFailed(format!("HTTP 404 for {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that records persisted records and hands out sequential ids.
#[derive(Clone, Default)]
pub struct MockStore {
    pub saved: Arc<Mutex<Vec<Record>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts into `table` fail with `message`.
    pub fn failing_for(self, table: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(table.to_string(), message.to_string());
        self
    }
}

impl RecordStore for MockStore {
    async fn persist(&self, record: &Record) -> Result<InsertedId, AppError> {
        if let Some(message) = self.failures.lock().unwrap().get(&record.table) {
            return Err(AppError::PersistenceFailed(message.clone()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(record.clone());
        Ok(InsertedId(saved.len().to_string()))
    }
}

// ---------------------------------------------------------------------------
// StaticSources
// ---------------------------------------------------------------------------

/// Source provider returning a fixed list, or a configuration error.
#[derive(Clone)]
pub struct StaticSources {
    sources: Result<Vec<Source>, String>,
}

impl StaticSources {
    pub fn new(locators: &[&str]) -> Self {
        Self {
            sources: Ok(locators
                .iter()
                .enumerate()
                .map(|(i, l)| Source::new(i, *l))
                .collect()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sources: Err(message.to_string()),
        }
    }
}

impl SourceProvider for StaticSources {
    fn sources(&self) -> Result<Vec<Source>, AppError> {
        self.sources.clone().map_err(AppError::ConfigInvalid)
    }
}
