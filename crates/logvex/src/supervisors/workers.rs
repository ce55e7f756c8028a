//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! 🚀 A batch is a bounded `async-channel` queue of `(index, location)` pairs, drained by
//! `job_parallelism` [`JobWorker`]s. Each worker runs one job at a time and sends its
//! report back tagged with the index, so the batch report keeps the input order no matter
//! who finished first. 🦆

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::debug;

mod job_worker;
use job_worker::JobWorker;

use super::{BatchReport, JobReport, Pipeline};
use crate::common::ObjectLocation;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}

pub(super) async fn run_batch(
    pipeline: &Pipeline,
    locations: Vec<ObjectLocation>,
) -> Result<BatchReport> {
    let the_job_count = locations.len();
    let (the_queue_tx, the_queue_rx) =
        async_channel::bounded::<(usize, ObjectLocation)>(pipeline.runtime.queue_capacity.max(1));
    let (the_report_tx, the_report_rx) = async_channel::unbounded::<(usize, JobReport)>();

    let the_workers: Vec<JoinHandle<Result<()>>> = (0..pipeline.runtime.job_parallelism.max(1))
        .map(|worker_id| {
            JobWorker::new(
                worker_id,
                the_queue_rx.clone(),
                the_report_tx.clone(),
                pipeline.clone(),
            )
            .start()
        })
        .collect();
    // -- 🔒 only the workers hold these now, so the channels close when the workers are done
    drop(the_queue_rx);
    drop(the_report_tx);

    for (index, location) in locations.into_iter().enumerate() {
        the_queue_tx.send((index, location)).await.context(
            "💀 Every job worker has left the building with locations still queued. \
             Somebody died on the job; the join below will say who.",
        )?;
    }
    the_queue_tx.close();
    debug!("📬 all {} locations queued, waiting for the workers", the_job_count);

    let mut the_slots: Vec<Option<JobReport>> = std::iter::repeat_with(|| None)
        .take(the_job_count)
        .collect();
    while let Ok((index, report)) = the_report_rx.recv().await {
        if let Some(slot) = the_slots.get_mut(index) {
            *slot = Some(report);
        }
    }

    for the_worker in the_workers {
        the_worker
            .await
            .context("💀 A job worker panicked. It took its secrets to the grave.")??;
    }

    let the_jobs: Option<Vec<JobReport>> = the_slots.into_iter().collect();
    let the_jobs = the_jobs.context(
        "💀 The batch ended with a job that never reported back. The books don't balance.",
    )?;
    Ok(BatchReport { jobs: the_jobs })
}
