//! 🪵 logvex: stream log files out of an object store and into a search index,
//! one line at a time, and say exactly once per file whether it all made it.
//!
//! ```text
//! object store ──bytes──▶ splitter ──lines──▶ parser ──documents──▶ publisher
//!                                                                     │
//!                          invoker ◀── JobOutcome ◀── tracker ◀── acknowledgments
//! ```
//!
//! Entry points: [`load_config`], [`Pipeline::from_config`], [`Pipeline::run_batch`],
//! [`locations_from_event`]. Or [`run`], which strings them together.

pub mod app_config;
pub mod backends;
mod common;
pub mod error;
pub mod progress;
mod splitter;
pub mod supervisors;
pub mod tracker;
pub mod transforms;
pub mod trigger;

use anyhow::Result;

pub use app_config::{AppConfig, load_config};
pub use common::{LogLine, ObjectLocation};
pub use error::{JobError, PublishError};
pub use supervisors::{BatchReport, JobReport, Pipeline};
pub use tracker::JobOutcome;
pub use trigger::locations_from_event;

/// 🚀 Build the pipeline from config and run every location through it.
///
/// Backends and credentials are resolved once, up front. The report lists one
/// outcome per location in input order; use [`BatchReport::into_result`] for the
/// single batch verdict.
pub async fn run(app_config: AppConfig, locations: Vec<ObjectLocation>) -> Result<BatchReport> {
    let the_pipeline = Pipeline::from_config(app_config).await?;
    the_pipeline.run_batch(locations).await
}
