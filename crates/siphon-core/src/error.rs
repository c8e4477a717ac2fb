use thiserror::Error;

/// Failures while resolving a selector against a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// A key, index or segment does not exist in the document.
    #[error("path not found: segment '{segment}' of '{selector}'")]
    PathNotFound { selector: String, segment: String },

    /// Descent was required but the node at `segment` is a scalar.
    #[error("type mismatch at segment '{segment}' of '{selector}': cannot descend into {found}")]
    TypeMismatch {
        selector: String,
        segment: String,
        found: &'static str,
    },

    /// The fetched payload is not JSON at all.
    #[error("document is not valid JSON: {0}")]
    InvalidDocument(String),
}

/// Application-wide error types for siphon.
#[derive(Error, Debug)]
pub enum AppError {
    /// Static configuration is missing or malformed. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The mapping document could not be read.
    #[error("Mapping '{locator}' unreadable: {reason}")]
    MappingUnreadable { locator: String, reason: String },

    /// The mapping document is not a flat object of string values.
    #[error("Mapping '{locator}' unparseable: {reason}")]
    MappingUnparseable { locator: String, reason: String },

    /// A reserved directive (`url` or `table`) is absent or blank.
    #[error("Mapping '{locator}' is missing the '{key}' property")]
    MappingIncomplete { locator: String, key: &'static str },

    /// One mapped field could not be extracted; no record is produced.
    #[error("Extraction of field '{field}' failed: {cause}")]
    FieldExtractionFailed {
        field: String,
        #[source]
        cause: ExtractError,
    },

    /// Fetching the source document failed (transport or non-success status).
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The insert statement was rejected or could not be sent.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),
}

impl AppError {
    /// Returns true if the process cannot continue after this error.
    ///
    /// Everything except configuration problems is contained at the
    /// granularity of a single source job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigInvalid(_))
    }
}
