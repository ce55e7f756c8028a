//! 🧮 The Job Completion Tracker: the accountant who decides when a Job is done.
//!
//! 🎬 *[two counters sit at a desk. one counts lines. one counts receipts.]*
//! *["Are we done?" asks the invoker. "Depends," says the tracker. "Is the file over?"]*
//!
//! A per-Job state machine fed with synthetic-or-real events:
//!
//! ```text
//!                 line_discovered / ack(Ok)
//!                    ┌──────────┐
//!                    ▼          │
//!   ───────────▶ [ PENDING ] ───┘
//!                 │        │
//!   ack == lines  │        │  ack(Err) | stream error | parse error | open error
//!   AND eos seen  ▼        ▼
//!          [ SUCCEEDED ]  [ FAILED ]      ← terminal, exactly one of them, exactly once
//! ```
//!
//! 🧠 Knowledge graph:
//! - Owned by exactly one Job. Never in a static, never behind an `Arc`. Two Jobs means
//!   two trackers means zero cross-contamination. That's the whole point.
//! - Order-independent: acknowledgments may arrive in any order; only the counts matter.
//! - Every event returns `Option<JobOutcome>`: `Some` exactly once, on the terminal
//!   transition. After that: logged, ignored, not acted upon.
//! - Pure and synchronous. Tests drive it with fake events, no network required.

use tracing::{debug, error, info, warn};

use crate::common::ObjectLocation;
use crate::error::{JobError, PublishError};

/// 📬 One publish attempt's verdict, tied to the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub line_number: u64,
    pub result: Result<(), PublishError>,
}

impl Acknowledgment {
    pub fn success(line_number: u64) -> Self {
        Self {
            line_number,
            result: Ok(()),
        }
    }

    pub fn failure(line_number: u64, error: PublishError) -> Self {
        Self {
            line_number,
            result: Err(error),
        }
    }
}

/// 🏁 How a Job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// every line acknowledged, stream fully read
    Succeeded { acknowledged: u64, skipped: u64 },
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// 🚦 Where the tracker is in its short, eventful life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
}

/// 🧮 Counts lines against acknowledgments for one Job and calls it exactly once.
#[derive(Debug)]
pub struct JobTracker {
    location: ObjectLocation,
    // 📈 a lower bound until `end_of_stream` flips
    expected: u64,
    acknowledged: u64,
    skipped: u64,
    end_of_stream: bool,
    state: JobState,
}

impl JobTracker {
    pub fn new(location: ObjectLocation) -> Self {
        Self {
            location,
            expected: 0,
            acknowledged: 0,
            skipped: 0,
            end_of_stream: false,
            state: JobState::Pending,
        }
    }

    /// 🧵 Another record is heading to the publisher. Expect one more acknowledgment.
    pub fn line_discovered(&mut self) {
        if self.state == JobState::Pending {
            self.expected += 1;
        }
    }

    /// 🙈 A malformed line was skipped on purpose. Not expected, but remembered.
    pub fn line_skipped(&mut self) {
        if self.state == JobState::Pending {
            self.skipped += 1;
        }
    }

    /// 📬 A publish finished, one way or another.
    pub fn acknowledge(&mut self, ack: Acknowledgment) -> Option<JobOutcome> {
        if self.state != JobState::Pending {
            // -- 👻 a straggler from before the end. we hear you. we do nothing.
            match &ack.result {
                Ok(()) => debug!(
                    "👻 {}: late success for line {} ignored: job already {:?}",
                    self.location, ack.line_number, self.state
                ),
                Err(the_error) => warn!(
                    "👻 {}: late failure for line {} ignored: job already {:?}: {}",
                    self.location, ack.line_number, self.state, the_error
                ),
            }
            return None;
        }

        match ack.result {
            Ok(()) => {
                if self.acknowledged >= self.expected {
                    return self.fail(JobError::Aborted {
                        line_number: ack.line_number,
                        detail: format!(
                            "acknowledgment #{} arrived but only {} lines were ever handed out",
                            self.acknowledged + 1,
                            self.expected
                        ),
                    });
                }
                self.acknowledged += 1;
                self.try_succeed()
            }
            Err(the_error) => self.fail(JobError::Publish {
                line_number: ack.line_number,
                source: the_error,
            }),
        }
    }

    /// 🏁 The source has no more bytes. `expected` is final now.
    pub fn end_of_stream(&mut self) -> Option<JobOutcome> {
        if self.state != JobState::Pending {
            return None;
        }
        self.end_of_stream = true;
        debug!(
            "🏁 {}: end of stream: {} lines expected, {} acknowledged so far",
            self.location, self.expected, self.acknowledged
        );
        self.try_succeed()
    }

    /// 💀 Something fatal happened. First caller wins; everyone after is ignored.
    pub fn fail(&mut self, error: JobError) -> Option<JobOutcome> {
        if self.state != JobState::Pending {
            debug!(
                "👻 {}: second failure ignored: job already {:?}: {}",
                self.location, self.state, error
            );
            return None;
        }
        self.state = JobState::Failed;
        error!(
            "💀 {}: job failed with {} of {} lines acknowledged: {}",
            self.location, self.acknowledged, self.expected, error
        );
        Some(JobOutcome::Failed(error))
    }

    fn try_succeed(&mut self) -> Option<JobOutcome> {
        if self.end_of_stream && self.acknowledged == self.expected {
            self.state = JobState::Succeeded;
            info!(
                "✅ {}: all {} log records added to the index ({} skipped)",
                self.location, self.acknowledged, self.skipped
            );
            return Some(JobOutcome::Succeeded {
                acknowledged: self.acknowledged,
                skipped: self.skipped,
            });
        }
        None
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != JobState::Pending
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }
}
