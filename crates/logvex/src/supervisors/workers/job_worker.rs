//! 🎬 *[a queue fills with object locations. somewhere, a worker waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for last month's access logs. and yet, here we are.]*

use anyhow::{Context, Result};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::common::ObjectLocation;
use crate::supervisors::{JobReport, Pipeline};

/// 🗑️ The JobWorker: takes a location off the queue, runs the job, reports back, repeats.
#[derive(Debug)]
pub(crate) struct JobWorker {
    worker_id: usize,
    rx: Receiver<(usize, ObjectLocation)>,
    reports: Sender<(usize, JobReport)>,
    pipeline: Pipeline,
}

impl JobWorker {
    pub(crate) fn new(
        worker_id: usize,
        rx: Receiver<(usize, ObjectLocation)>,
        reports: Sender<(usize, JobReport)>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            worker_id,
            rx,
            reports,
            pipeline,
        }
    }
}

impl Worker for JobWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 JobWorker {} started draining the queue...", self.worker_id);
            // -- 🏁 recv fails only once the queue is empty and closed
            while let Ok((index, location)) = self.rx.recv().await {
                let the_report = self.pipeline.run_job(location).await;
                self.reports.send((index, the_report)).await.context(
                    "💀 JobWorker finished a job and nobody was listening for the report.",
                )?;
            }
            debug!("🏁 JobWorker {}: queue closed. Shutting down.", self.worker_id);
            Ok(())
        })
    }
}
