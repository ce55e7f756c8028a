//! 🎬 *[camera pans across a bucket of access logs]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where log files never stop growing..."
//! 🎬 "One pipeline dared to index them all. One line at a time."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: part middle manager, part helicopter parent.
//!
//! 🧠 Knowledge graph:
//! - [`Pipeline`]: the process-wide, read-only bits (object store, publisher, runtime
//!   knobs, progress display), `Arc`-shared and cheap to clone.
//! - `job`: one location → one [`JobOutcome`]. Fresh tracker per job, always.
//! - `workers`: the batch runner. A bounded queue of locations drained by
//!   `job_parallelism` job workers. Reports come back in input order.
//!
//! ⚠️ The workers are the supervisor's private little minions. They are not `pub`.

use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use tracing::info;

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::{ObjectStoreBackend, PublisherBackend};
use crate::common::ObjectLocation;
use crate::tracker::JobOutcome;

mod job;
mod workers;

/// 📋 How one job ended, and which object it was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub location: ObjectLocation,
    pub outcome: JobOutcome,
}

/// 📋 One report per location, in the order the locations were given.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    /// ✅ Every job succeeded. An empty batch counts: nothing asked, nothing failed.
    pub fn is_success(&self) -> bool {
        self.jobs.iter().all(|job| job.outcome.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| !job.outcome.is_success())
    }

    /// 🎯 The batch's single verdict: `Ok(self)` on success, or an error naming every
    /// failed job and why.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let the_reasons: Vec<String> = self
            .failures()
            .filter_map(|job| match &job.outcome {
                JobOutcome::Failed(the_error) => Some(format!("{}: {}", job.location, the_error)),
                JobOutcome::Succeeded { .. } => None,
            })
            .collect();
        anyhow::bail!(
            "💀 {} of {} jobs failed:\n  {}",
            the_reasons.len(),
            self.jobs.len(),
            the_reasons.join("\n  ")
        )
    }
}

/// 🏗️ Everything a job needs that outlives the job.
#[derive(Debug, Clone)]
pub struct Pipeline {
    object_store: Arc<ObjectStoreBackend>,
    publisher: Arc<PublisherBackend>,
    runtime: RuntimeConfig,
    display: MultiProgress,
}

impl Pipeline {
    pub fn new(
        object_store: ObjectStoreBackend,
        publisher: PublisherBackend,
        runtime: RuntimeConfig,
    ) -> Self {
        Self {
            object_store: Arc::new(object_store),
            publisher: Arc::new(publisher),
            runtime,
            display: MultiProgress::new(),
        }
    }

    /// 🚀 Build both backends from config. Credentials and clients are resolved here,
    /// once, before any job starts.
    pub async fn from_config(app_config: AppConfig) -> Result<Self> {
        let the_object_store = ObjectStoreBackend::from_config(app_config.object_store)
            .await
            .context("💀 The object store backend could not be built. No bytes will flow today.")?;
        let the_publisher = PublisherBackend::from_config(app_config.publisher)
            .await
            .context("💀 The publisher backend could not be built. The documents have nowhere to go.")?;
        Ok(Self::new(the_object_store, the_publisher, app_config.runtime))
    }

    /// 🎯 Run one job to its terminal state.
    pub async fn run_job(&self, location: ObjectLocation) -> JobReport {
        let the_outcome = job::run_job(self, location.clone()).await;
        JobReport {
            location,
            outcome: the_outcome,
        }
    }

    /// 🧵 Run a batch of jobs, `job_parallelism` at a time, and wait for every one of them.
    ///
    /// `Err` only for plumbing failures (a worker died). Job failures are in the report.
    pub async fn run_batch(&self, locations: Vec<ObjectLocation>) -> Result<BatchReport> {
        info!(
            "🚀 batch of {} jobs starting ({} at a time)",
            locations.len(),
            self.runtime.job_parallelism.max(1)
        );
        let the_report = workers::run_batch(self, locations).await?;
        info!(
            "🏁 batch finished: {} succeeded, {} failed",
            the_report.jobs.len() - the_report.failures().count(),
            the_report.failures().count()
        );
        Ok(the_report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryObjectStore, InMemoryPublisher, InMemoryPublisherConfig};
    use crate::error::{JobError, PublishError};

    fn a_log_line(path: &str) -> String {
        format!(r#"127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET {path} HTTP/1.0" 200 2326"#)
    }

    fn a_log_file(paths: &[&str]) -> String {
        paths.iter().map(|p| a_log_line(p) + "\n").collect()
    }

    #[tokio::test]
    async fn the_one_where_two_jobs_share_a_batch_but_not_a_fate() -> Result<()> {
        let the_good = ObjectLocation::new("logs", "good.log");
        let the_bad = ObjectLocation::new("logs", "bad.log");
        let the_store = InMemoryObjectStore::new()
            .with_object(the_good.clone(), a_log_file(&["/a", "/b", "/c"]))
            .with_object(the_bad.clone(), a_log_file(&["/d", "/boom", "/e"]));
        let the_publisher = InMemoryPublisher::new(InMemoryPublisherConfig {
            fail_when_contains: Some("/boom".to_string()),
            delay_ms: 5,
        });
        let the_pipeline = Pipeline::new(
            ObjectStoreBackend::InMemory(the_store),
            PublisherBackend::InMemory(the_publisher.clone()),
            RuntimeConfig {
                job_parallelism: 2,
                ..RuntimeConfig::default()
            },
        );

        let the_report = the_pipeline
            .run_batch(vec![the_good.clone(), the_bad.clone()])
            .await?;

        assert_eq!(the_report.jobs.len(), 2);
        assert_eq!(the_report.jobs[0].location, the_good);
        assert_eq!(
            the_report.jobs[0].outcome,
            JobOutcome::Succeeded {
                acknowledged: 3,
                skipped: 0
            }
        );
        assert_eq!(the_report.jobs[1].location, the_bad);
        assert!(matches!(
            &the_report.jobs[1].outcome,
            JobOutcome::Failed(JobError::Publish {
                line_number: 2,
                source: PublishError::Rejected { status: 500, .. }
            })
        ));
        assert!(!the_report.is_success());

        let the_error = the_report.into_result().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(the_error.contains("1 of 2 jobs failed"));
        assert!(the_error.contains("s3://logs/bad.log"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_reports_come_back_in_input_order() -> Result<()> {
        let mut the_store = InMemoryObjectStore::new();
        let the_locations: Vec<ObjectLocation> = (0..6)
            .map(|i| ObjectLocation::new("logs", format!("part-{i}.log")))
            .collect();
        for (i, location) in the_locations.iter().enumerate() {
            let the_paths: Vec<String> = (0..=i).map(|n| format!("/{n}")).collect();
            let the_refs: Vec<&str> = the_paths.iter().map(String::as_str).collect();
            the_store.insert(location.clone(), a_log_file(&the_refs));
        }
        let the_pipeline = Pipeline::new(
            ObjectStoreBackend::InMemory(the_store),
            PublisherBackend::InMemory(InMemoryPublisher::default()),
            RuntimeConfig {
                job_parallelism: 3,
                queue_capacity: 1,
                ..RuntimeConfig::default()
            },
        );

        let the_report = the_pipeline.run_batch(the_locations.clone()).await?;
        let the_order: Vec<ObjectLocation> =
            the_report.jobs.iter().map(|job| job.location.clone()).collect();
        assert_eq!(the_order, the_locations);
        for (i, job) in the_report.jobs.iter().enumerate() {
            assert_eq!(
                job.outcome,
                JobOutcome::Succeeded {
                    acknowledged: i as u64 + 1,
                    skipped: 0
                }
            );
        }
        assert!(the_report.into_result().is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_batch_is_a_quiet_success() -> Result<()> {
        let the_pipeline = Pipeline::new(
            ObjectStoreBackend::InMemory(InMemoryObjectStore::new()),
            PublisherBackend::InMemory(InMemoryPublisher::default()),
            RuntimeConfig::default(),
        );
        let the_report = the_pipeline.run_batch(Vec::new()).await?;
        assert!(the_report.jobs.is_empty());
        assert!(the_report.is_success());
        Ok(())
    }
}
