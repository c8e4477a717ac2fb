use std::fmt;

use crate::assemble::assemble;
use crate::error::AppError;
use crate::mapping::{Mapping, MappingResolver};
use crate::models::{InsertedId, Record, Source};
use crate::traits::{Fetcher, RecordStore};

/// Pipeline stage at which a source job stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Mapping,
    Fetch,
    Assembly,
    Persist,
    /// The job faulted outside the modelled stages (a panic).
    Unknown,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Mapping => "mapping",
            JobStage::Fetch => "fetch",
            JobStage::Assembly => "assembly",
            JobStage::Persist => "persist",
            JobStage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intermediate states of a single source job.
#[derive(Debug)]
enum JobState {
    Pending,
    MappingResolved(Mapping),
    DocumentFetched { mapping: Mapping, body: String },
    RecordAssembled(Record),
    Persisted { table: String, id: InsertedId },
    Failed { stage: JobStage, error: AppError },
}

/// Terminal result of a source job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Persisted {
        source: Source,
        table: String,
        id: InsertedId,
    },
    Failed {
        source: Source,
        stage: JobStage,
        error: String,
    },
}

impl JobOutcome {
    pub fn source(&self) -> &Source {
        match self {
            JobOutcome::Persisted { source, .. } | JobOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, JobOutcome::Persisted { .. })
    }

    /// Outcome for a job that never produced a result of its own.
    pub fn faulted(source: Source, error: impl Into<String>) -> Self {
        JobOutcome::Failed {
            source,
            stage: JobStage::Unknown,
            error: error.into(),
        }
    }
}

/// Runs one source end-to-end: resolve mapping, fetch, assemble, persist.
///
/// Every failure is captured as a [`JobOutcome::Failed`]; `run` itself
/// never returns an error.
pub struct SourceJob<F, S>
where
    F: Fetcher,
    S: RecordStore,
{
    resolver: MappingResolver,
    fetcher: F,
    store: S,
    database: String,
}

impl<F, S> SourceJob<F, S>
where
    F: Fetcher,
    S: RecordStore,
{
    pub fn new(resolver: MappingResolver, fetcher: F, store: S, database: impl Into<String>) -> Self {
        Self {
            resolver,
            fetcher,
            store,
            database: database.into(),
        }
    }

    pub async fn run(&self, source: &Source) -> JobOutcome {
        let mut state = JobState::Pending;
        loop {
            state = match self.step(source, state).await {
                JobState::Persisted { table, id } => {
                    return JobOutcome::Persisted {
                        source: source.clone(),
                        table,
                        id,
                    };
                }
                JobState::Failed { stage, error } => {
                    return JobOutcome::Failed {
                        source: source.clone(),
                        stage,
                        error: error.to_string(),
                    };
                }
                next => next,
            };
        }
    }

    async fn step(&self, source: &Source, state: JobState) -> JobState {
        match state {
            JobState::Pending => match self.resolver.resolve(&source.locator) {
                Ok(mapping) => {
                    tracing::debug!(%source, url = %mapping.url, table = %mapping.table, "Mapping resolved");
                    JobState::MappingResolved(mapping)
                }
                Err(error) => JobState::Failed {
                    stage: JobStage::Mapping,
                    error,
                },
            },
            JobState::MappingResolved(mapping) => match self.fetcher.fetch(&mapping.url).await {
                Ok(body) => {
                    tracing::debug!(%source, bytes = body.len(), "Document fetched");
                    JobState::DocumentFetched { mapping, body }
                }
                Err(error) => JobState::Failed {
                    stage: JobStage::Fetch,
                    error,
                },
            },
            JobState::DocumentFetched { mapping, body } => {
                match assemble(&body, &mapping, &self.database) {
                    Ok(record) => {
                        tracing::debug!(%source, fields = record.field_count(), "Record assembled");
                        JobState::RecordAssembled(record)
                    }
                    Err(error) => JobState::Failed {
                        stage: JobStage::Assembly,
                        error,
                    },
                }
            }
            JobState::RecordAssembled(record) => match self.store.persist(&record).await {
                Ok(id) => JobState::Persisted {
                    table: record.table,
                    id,
                },
                Err(error) => JobState::Failed {
                    stage: JobStage::Persist,
                    error,
                },
            },
            terminal @ (JobState::Persisted { .. } | JobState::Failed { .. }) => terminal,
        }
    }
}
