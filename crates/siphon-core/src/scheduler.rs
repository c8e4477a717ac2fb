use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::interval::{DEFAULT_INTERVAL, MAX_INTERVAL};
use crate::job::{JobOutcome, JobStage, SourceJob};
use crate::models::{InsertedId, Source};
use crate::traits::{Fetcher, RecordStore, SourceProvider};

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum TickEvent<'a> {
    SchedulerStarted {
        interval: Duration,
    },
    TickStarted {
        tick: u64,
        at: DateTime<Utc>,
        sources: usize,
    },
    SourceLoadFailed {
        tick: u64,
        error: &'a AppError,
    },
    JobPersisted {
        source: &'a Source,
        table: &'a str,
        id: &'a InsertedId,
    },
    JobFailed {
        source: &'a Source,
        stage: JobStage,
        error: &'a str,
    },
    TickCompleted {
        summary: &'a TickSummary,
    },
    SchedulerStopped {
        ticks: u64,
    },
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait TickReporter: Send + Sync {
    fn report(&self, event: TickEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTickReporter;

impl TickReporter for TracingTickReporter {
    fn report(&self, event: TickEvent<'_>) {
        match event {
            TickEvent::SchedulerStarted { interval } => {
                tracing::info!(interval_secs = interval.as_secs_f64(), "Scheduler started");
            }
            TickEvent::TickStarted { tick, at, sources } => {
                tracing::info!(%tick, at = %at.to_rfc3339(), %sources, "Tick started");
            }
            TickEvent::SourceLoadFailed { tick, error } => {
                tracing::error!(%tick, %error, "Could not load sources, skipping tick");
            }
            TickEvent::JobPersisted { source, table, id } if id.is_dry_run() => {
                tracing::info!(%source, %table, "Would create record (dry run)");
            }
            TickEvent::JobPersisted { source, table, id } => {
                tracing::info!(%source, %table, row_id = %id, "Created record");
            }
            TickEvent::JobFailed {
                source,
                stage,
                error,
            } => {
                tracing::warn!(%source, %stage, %error, "Source job failed");
            }
            TickEvent::TickCompleted { summary } => {
                tracing::info!(
                    tick = summary.tick,
                    persisted = summary.persisted(),
                    failed = summary.failed(),
                    "Tick completed"
                );
            }
            TickEvent::SchedulerStopped { ticks } => {
                tracing::info!(%ticks, "Scheduler stopped");
            }
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    /// False when the source list could not be loaded.
    pub ran: bool,
    pub outcomes: Vec<JobOutcome>,
}

impl TickSummary {
    pub fn persisted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_persisted()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.persisted()
    }
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Upper bound on source jobs running at once within a tick.
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_concurrent_jobs: 16,
        }
    }
}

impl SchedulerConfig {
    /// Intervals above one year are clamped.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.min(MAX_INTERVAL);
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

/// Drives ticks: on every interval, fan out one [`SourceJob`] per source
/// and wait for all of them.
pub struct Scheduler<P, F, S>
where
    P: SourceProvider,
    F: Fetcher,
    S: RecordStore,
{
    provider: P,
    job: Arc<SourceJob<F, S>>,
    config: SchedulerConfig,
}

impl<P, F, S> Scheduler<P, F, S>
where
    P: SourceProvider,
    F: Fetcher,
    S: RecordStore,
{
    pub fn new(provider: P, job: SourceJob<F, S>, config: SchedulerConfig) -> Self {
        Self {
            provider,
            job: Arc::new(job),
            config,
        }
    }

    /// Run ticks until `cancel_token` fires.
    ///
    /// The first tick happens one full interval after start. Ticks missed
    /// while a slow tick was still draining are skipped, not replayed.
    /// Cancellation is observed between ticks; a running tick is drained.
    pub async fn run<R: TickReporter>(&self, cancel_token: CancellationToken, reporter: &R) {
        reporter.report(TickEvent::SchedulerStarted {
            interval: self.config.interval,
        });

        let period = self.config.interval.clamp(Duration::from_millis(1), MAX_INTERVAL);
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = cancel_token.cancelled() => break,
            }
            ticks += 1;
            self.run_tick(ticks, reporter).await;
        }

        reporter.report(TickEvent::SchedulerStopped { ticks });
    }

    /// Execute a single tick: snapshot sources, run all jobs, await them.
    pub async fn run_tick<R: TickReporter>(&self, tick: u64, reporter: &R) -> TickSummary {
        let started_at = Utc::now();

        let sources = match self.provider.sources() {
            Ok(sources) => sources,
            Err(error) => {
                reporter.report(TickEvent::SourceLoadFailed {
                    tick,
                    error: &error,
                });
                let summary = TickSummary {
                    tick,
                    started_at,
                    ran: false,
                    outcomes: Vec::new(),
                };
                reporter.report(TickEvent::TickCompleted { summary: &summary });
                return summary;
            }
        };

        reporter.report(TickEvent::TickStarted {
            tick,
            at: started_at,
            sources: sources.len(),
        });

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut jobs = JoinSet::new();
        let mut in_flight = HashMap::new();

        for source in sources {
            let job = Arc::clone(&self.job);
            let permits = Arc::clone(&permits);
            let task_source = source.clone();
            let handle = jobs.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return JobOutcome::faulted(task_source, "job pool closed");
                };
                job.run(&task_source).await
            });
            in_flight.insert(handle.id(), source);
        }

        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some(joined) = jobs.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, outcome)) => {
                    in_flight.remove(&id);
                    outcome
                }
                Err(join_error) => {
                    let source = in_flight
                        .remove(&join_error.id())
                        .unwrap_or_else(|| Source::new(usize::MAX, "<unknown>"));
                    let cause = if join_error.is_panic() {
                        format!("job panicked: {}", panic_message(join_error.into_panic()))
                    } else {
                        "job cancelled".to_string()
                    };
                    JobOutcome::faulted(source, cause)
                }
            };
            report_outcome(reporter, &outcome);
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|o| o.source().position);
        let summary = TickSummary {
            tick,
            started_at,
            ran: true,
            outcomes,
        };
        reporter.report(TickEvent::TickCompleted { summary: &summary });
        summary
    }
}

fn report_outcome<R: TickReporter>(reporter: &R, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Persisted { source, table, id } => {
            reporter.report(TickEvent::JobPersisted { source, table, id });
        }
        JobOutcome::Failed {
            source,
            stage,
            error,
        } => {
            reporter.report(TickEvent::JobFailed {
                source,
                stage: *stage,
                error,
            });
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
