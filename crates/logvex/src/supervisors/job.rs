//! 🎯 One job: one object, read once, every line published, one verdict.
//!
//! 🎬 *[the splitter hands over a line. the parser turns it into JSON. a publish task
//! is spawned and wanders off into the network. the splitter is already on the next
//! line. somewhere behind it, acknowledgments start trickling home, out of order,
//! and the tracker counts every one of them.]*
//!
//! ```text
//!   ObjectStore ──bytes──▶ LineSplitter ──line──▶ to_document ──doc──▶ spawn(publish)
//!                               │                      │                    │
//!                          eos / error           parse error           Acknowledgment
//!                               ▼                      ▼                    ▼
//!                            ┌──────────────── JobTracker ─────────────────┐
//!                            └──────────────▶ JobOutcome (exactly once) ◀──┘
//! ```
//!
//! 🧠 Knowledge graph:
//! - One `select!` loop drives both directions: new lines in, acknowledgments back.
//!   `biased` so finished publishes are counted before more are started.
//! - `LineSplitter::next_line` is cancel-safe, so losing a `select!` race costs nothing.
//! - Publishes live in a `JoinSet`. A panicked or aborted task still settles its line:
//!   the `JoinError` becomes an `Aborted` failure.
//! - After a failure, the still-running publishes are not aborted: they drain in a
//!   detached task that feeds the terminal tracker, which logs and ignores them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, trace, warn};

use super::Pipeline;
use crate::backends::{ObjectStore, Publisher};
use crate::common::{LogLine, ObjectLocation};
use crate::error::JobError;
use crate::progress::ProgressMetrics;
use crate::splitter::LineSplitter;
use crate::tracker::{Acknowledgment, JobOutcome, JobTracker};
use crate::transforms::{self, ParseFailurePolicy};

/// 📬 Whatever woke the loop up.
enum Event {
    Line(anyhow::Result<Option<LogLine>>),
    Joined(Result<(Id, Acknowledgment), JoinError>),
}

/// 🧵 The publishes a job has started and not yet heard back from.
struct InFlight {
    tasks: JoinSet<Acknowledgment>,
    // 🏷️ task id → line number, so a panicked task can still be named
    line_numbers: HashMap<Id, u64>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            line_numbers: HashMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn spawn(
        &mut self,
        line_number: u64,
        document: String,
        pipeline: &Pipeline,
        permit: Option<tokio::sync::OwnedSemaphorePermit>,
    ) {
        let the_publisher = Arc::clone(&pipeline.publisher);
        let the_handle = self.tasks.spawn(async move {
            // -- 🚦 held until the publish finishes, then handed back to the next line
            let _permit = permit;
            Acknowledgment {
                line_number,
                result: the_publisher.publish(document).await,
            }
        });
        self.line_numbers.insert(the_handle.id(), line_number);
    }

    /// 📬 Turn a joined task into the acknowledgment it owes us. A task that panicked or
    /// was aborted owes us one too: an `Aborted` failure naming its line.
    fn settle(
        &mut self,
        joined: Result<(Id, Acknowledgment), JoinError>,
    ) -> Result<Acknowledgment, JobError> {
        match joined {
            Ok((the_id, the_ack)) => {
                self.line_numbers.remove(&the_id);
                Ok(the_ack)
            }
            Err(the_join_error) => {
                let the_line_number = self
                    .line_numbers
                    .remove(&the_join_error.id())
                    .unwrap_or_default();
                Err(JobError::Aborted {
                    line_number: the_line_number,
                    detail: the_join_error.to_string(),
                })
            }
        }
    }
}

/// 🎯 Run one job to its terminal state. Never panics, never returns twice.
pub(super) async fn run_job(pipeline: &Pipeline, location: ObjectLocation) -> JobOutcome {
    let mut the_tracker = JobTracker::new(location.clone());
    info!("🚀 job started for {}", location);

    let the_stream = match pipeline.object_store.open_read_stream(&location).await {
        Ok(stream) => stream,
        Err(the_open_error) => {
            // 💀 nothing was read, nothing was published. fail before the pipeline exists.
            let the_error = JobError::SourceOpen {
                location,
                detail: format!("{the_open_error:#}"),
            };
            return the_tracker
                .fail(the_error.clone())
                .unwrap_or(JobOutcome::Failed(the_error));
        }
    };

    let the_runtime = &pipeline.runtime;
    let mut the_splitter = LineSplitter::new(
        the_stream.reader,
        the_runtime.read_buffer_bytes,
        the_runtime.max_line_bytes,
    );
    let mut the_progress = ProgressMetrics::new(
        location.to_string(),
        the_stream.content_length,
        &pipeline.display,
    );
    let the_limiter = (the_runtime.max_in_flight_publishes > 0)
        .then(|| Arc::new(Semaphore::new(the_runtime.max_in_flight_publishes)));

    let mut the_in_flight = InFlight::new();
    let mut lines_read: u64 = 0;
    let mut stream_done = false;

    let the_outcome = loop {
        let the_event = tokio::select! {
            biased;
            Some(joined) = the_in_flight.tasks.join_next_with_id(), if !the_in_flight.is_empty() => {
                Event::Joined(joined)
            }
            next = the_splitter.next_line(), if !stream_done => Event::Line(next),
            else => {
                // -- 🧮 stream over, nothing in flight, and still no verdict: the books don't balance
                let the_error = JobError::Aborted {
                    line_number: lines_read,
                    detail: format!(
                        "pipeline went idle with {} of {} lines acknowledged",
                        the_tracker.acknowledged(),
                        the_tracker.expected()
                    ),
                };
                break the_tracker
                    .fail(the_error.clone())
                    .unwrap_or(JobOutcome::Failed(the_error));
            }
        };

        let the_verdict = match the_event {
            Event::Joined(joined) => match the_in_flight.settle(joined) {
                Ok(the_ack) => {
                    trace!(
                        "📬 line {} acknowledged ({})",
                        the_ack.line_number,
                        if the_ack.result.is_ok() { "ok" } else { "failed" }
                    );
                    the_tracker.acknowledge(the_ack)
                }
                Err(the_abort) => the_tracker.fail(the_abort),
            },
            Event::Line(Ok(Some(the_line))) => {
                lines_read += 1;
                if the_line.is_blank() {
                    trace!("🫥 line {} is blank, not a record", the_line.number());
                    None
                } else {
                    match transforms::to_document(&the_line) {
                        Ok(the_document) => {
                            let the_permit = match &the_limiter {
                                Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                                    Ok(permit) => Some(permit),
                                    Err(the_closed) => {
                                        let the_error = JobError::Aborted {
                                            line_number: the_line.number(),
                                            detail: format!("publish limiter closed: {the_closed}"),
                                        };
                                        break the_tracker
                                            .fail(the_error.clone())
                                            .unwrap_or(JobOutcome::Failed(the_error));
                                    }
                                },
                                None => None,
                            };
                            the_tracker.line_discovered();
                            the_in_flight.spawn(the_line.number(), the_document, pipeline, the_permit);
                            None
                        }
                        Err(the_parse_error) => match the_runtime.on_parse_error {
                            ParseFailurePolicy::Skip => {
                                warn!(
                                    "🙈 {} line {} skipped ({}): {:?}",
                                    location,
                                    the_line.number(),
                                    the_parse_error,
                                    the_line.to_text()
                                );
                                the_tracker.line_skipped();
                                None
                            }
                            ParseFailurePolicy::Abort => the_tracker.fail(JobError::Parse {
                                line_number: the_line.number(),
                                source: the_parse_error,
                            }),
                        },
                    }
                }
            }
            Event::Line(Ok(None)) => {
                stream_done = true;
                the_tracker.end_of_stream()
            }
            Event::Line(Err(the_read_error)) => {
                stream_done = true;
                the_tracker.fail(JobError::SourceRead {
                    location: location.clone(),
                    lines_read,
                    detail: format!("{the_read_error:#}"),
                })
            }
        };

        the_progress.update(
            the_splitter.bytes_consumed(),
            the_tracker.expected(),
            the_tracker.acknowledged(),
        );
        if let Some(the_outcome) = the_verdict {
            break the_outcome;
        }
    };

    the_progress.finish(&the_outcome);
    drain_stragglers(the_in_flight, the_tracker);
    the_outcome
}

/// 👻 Let the publishes that outlived their job finish on their own time.
///
/// Dropping a `JoinSet` aborts its tasks, so the set moves into a detached task instead.
/// Every acknowledgment still reaches the (terminal) tracker, which logs it and moves on.
fn drain_stragglers(mut in_flight: InFlight, mut tracker: JobTracker) {
    if in_flight.is_empty() {
        return;
    }
    debug!(
        "👻 {}: {} publishes still in flight after the verdict, draining in the background",
        tracker.location(),
        in_flight.tasks.len()
    );
    tokio::spawn(async move {
        while let Some(joined) = in_flight.tasks.join_next_with_id().await {
            match in_flight.settle(joined) {
                Ok(the_ack) => {
                    tracker.acknowledge(the_ack);
                }
                Err(the_abort) => {
                    tracker.fail(the_abort);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::RuntimeConfig;
    use crate::backends::{
        InMemoryObjectStore, InMemoryPublisher, InMemoryPublisherConfig, ObjectStoreBackend,
        PublisherBackend,
    };
    use crate::error::PublishError;
    use crate::transforms::ParseError;

    fn a_log_line(path: &str) -> String {
        format!(r#"10.0.0.7 - bob [10/Oct/2000:13:55:36 -0700] "GET {path} HTTP/1.0" 200 2326"#)
    }

    fn the_location() -> ObjectLocation {
        ObjectLocation::new("logs", "access.log")
    }

    struct Harness {
        pipeline: Pipeline,
        publisher: InMemoryPublisher,
    }

    fn a_harness(contents: &str, publisher_config: InMemoryPublisherConfig, runtime: RuntimeConfig) -> Harness {
        let the_store = InMemoryObjectStore::new().with_object(the_location(), contents.to_string());
        let the_publisher = InMemoryPublisher::new(publisher_config);
        Harness {
            pipeline: Pipeline::new(
                ObjectStoreBackend::InMemory(the_store),
                PublisherBackend::InMemory(the_publisher.clone()),
                runtime,
            ),
            publisher: the_publisher,
        }
    }

    #[tokio::test]
    async fn the_one_where_an_empty_file_succeeds_with_nothing_to_say() {
        let the_harness = a_harness("", InMemoryPublisherConfig::default(), RuntimeConfig::default());
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert_eq!(
            the_outcome,
            JobOutcome::Succeeded {
                acknowledged: 0,
                skipped: 0
            }
        );
        assert!(the_harness.publisher.documents().await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_three_lines_become_three_documents() {
        let the_contents = format!(
            "{}\n{}\n{}\n",
            a_log_line("/one"),
            a_log_line("/two"),
            a_log_line("/three")
        );
        let the_harness = a_harness(
            &the_contents,
            InMemoryPublisherConfig {
                fail_when_contains: None,
                delay_ms: 10,
            },
            RuntimeConfig::default(),
        );
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert_eq!(
            the_outcome,
            JobOutcome::Succeeded {
                acknowledged: 3,
                skipped: 0
            }
        );

        let the_documents = the_harness.publisher.documents().await;
        assert_eq!(the_documents.len(), 3);
        for path in ["/one", "/two", "/three"] {
            assert!(
                the_documents
                    .iter()
                    .any(|doc| doc.contains(&format!("\"path\":\"{path}\""))),
                "document for {path} is missing"
            );
        }
    }

    #[tokio::test]
    async fn the_one_where_the_second_publish_fails_and_takes_the_job_down() {
        let the_contents = format!(
            "{}\n{}\n{}\n",
            a_log_line("/one"),
            a_log_line("/two"),
            a_log_line("/three")
        );
        let the_harness = a_harness(
            &the_contents,
            InMemoryPublisherConfig {
                fail_when_contains: Some("/two".to_string()),
                delay_ms: 0,
            },
            RuntimeConfig::default(),
        );
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert!(matches!(
            the_outcome,
            JobOutcome::Failed(JobError::Publish {
                line_number: 2,
                source: PublishError::Rejected { status: 500, .. }
            })
        ));
    }

    #[tokio::test]
    async fn the_one_where_a_missing_key_fails_before_a_single_line() {
        let the_harness = a_harness("", InMemoryPublisherConfig::default(), RuntimeConfig::default());
        let the_ghost = ObjectLocation::new("logs", "ghost.log");
        let the_outcome = run_job(&the_harness.pipeline, the_ghost.clone()).await;
        match the_outcome {
            JobOutcome::Failed(JobError::SourceOpen { location, detail }) => {
                assert_eq!(location, the_ghost);
                assert!(detail.contains("NoSuchKey"));
            }
            other => panic!("💀 expected SourceOpen, got {other:?}"),
        }
        assert!(the_harness.publisher.documents().await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_the_stream_breaks_mid_file() {
        let the_store = InMemoryObjectStore::new()
            .with_broken_object(the_location(), format!("{}\n", a_log_line("/one")));
        let the_pipeline = Pipeline::new(
            ObjectStoreBackend::InMemory(the_store),
            PublisherBackend::InMemory(InMemoryPublisher::default()),
            RuntimeConfig::default(),
        );
        let the_outcome = run_job(&the_pipeline, the_location()).await;
        assert!(matches!(
            the_outcome,
            JobOutcome::Failed(JobError::SourceRead { lines_read: 1, .. })
        ));
    }

    #[tokio::test]
    async fn the_one_where_a_malformed_line_aborts_by_default() {
        let the_contents = format!("{}\nthis is not a log line\n{}\n", a_log_line("/a"), a_log_line("/b"));
        let the_harness = a_harness(&the_contents, InMemoryPublisherConfig::default(), RuntimeConfig::default());
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert!(matches!(
            the_outcome,
            JobOutcome::Failed(JobError::Parse {
                line_number: 2,
                source: ParseError::MissingField(_) | ParseError::Malformed { .. }
            })
        ));
    }

    #[tokio::test]
    async fn the_one_where_skip_mode_steps_over_the_garbage() {
        let the_contents = format!("{}\nthis is not a log line\n{}\n", a_log_line("/a"), a_log_line("/b"));
        let the_harness = a_harness(
            &the_contents,
            InMemoryPublisherConfig::default(),
            RuntimeConfig {
                on_parse_error: ParseFailurePolicy::Skip,
                ..RuntimeConfig::default()
            },
        );
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert_eq!(
            the_outcome,
            JobOutcome::Succeeded {
                acknowledged: 2,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_blank_lines_are_not_records_and_the_last_line_needs_no_newline() {
        let the_contents = format!("{}\n\n   \n{}", a_log_line("/a"), a_log_line("/b"));
        let the_harness = a_harness(&the_contents, InMemoryPublisherConfig::default(), RuntimeConfig::default());
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert_eq!(
            the_outcome,
            JobOutcome::Succeeded {
                acknowledged: 2,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_a_tight_publish_cap_still_gets_everything_there() {
        let the_contents: String = (0..20).map(|i| a_log_line(&format!("/{i}")) + "\n").collect();
        let the_harness = a_harness(
            &the_contents,
            InMemoryPublisherConfig {
                fail_when_contains: None,
                delay_ms: 2,
            },
            RuntimeConfig {
                max_in_flight_publishes: 2,
                read_buffer_bytes: 16,
                ..RuntimeConfig::default()
            },
        );
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert_eq!(
            the_outcome,
            JobOutcome::Succeeded {
                acknowledged: 20,
                skipped: 0
            }
        );
        assert_eq!(the_harness.publisher.documents().await.len(), 20);
    }

    #[tokio::test]
    async fn the_one_where_stragglers_finish_after_the_verdict() {
        // 🧪 line 1 fails fast-ish; the others are still sleeping when the verdict lands
        let the_contents = format!(
            "{}\n{}\n{}\n",
            a_log_line("/boom"),
            a_log_line("/slow-1"),
            a_log_line("/slow-2")
        );
        let the_harness = a_harness(
            &the_contents,
            InMemoryPublisherConfig {
                fail_when_contains: Some("/boom".to_string()),
                delay_ms: 20,
            },
            RuntimeConfig::default(),
        );
        let the_outcome = run_job(&the_harness.pipeline, the_location()).await;
        assert!(matches!(the_outcome, JobOutcome::Failed(JobError::Publish { .. })));

        // 👻 the stragglers were not aborted; they still land
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(the_harness.publisher.documents().await.len(), 2);
    }
}
