pub mod assemble;
pub mod config;
pub mod error;
pub mod extract;
pub mod interval;
pub mod job;
pub mod mapping;
pub mod models;
pub mod scheduler;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ConfigFile, ConnectionParams, SiphonConfig};
pub use error::{AppError, ExtractError};
pub use job::{JobOutcome, JobStage, SourceJob};
pub use mapping::{Mapping, MappingResolver};
pub use models::{InsertedId, Record, Source};
pub use scheduler::{Scheduler, SchedulerConfig, TickReporter, TickSummary, TracingTickReporter};
pub use traits::{Fetcher, NullStore, RecordStore, SourceProvider};
