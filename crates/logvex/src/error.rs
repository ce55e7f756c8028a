//! 💀 Errors the invoker actually has to tell apart.
//!
//! Everything internal rides on `anyhow` with a context chain. These are the typed
//! ones: the reason a Job died, and the reason a single publish did.

use crate::common::ObjectLocation;
use crate::transforms::ParseError;

/// 📡 Why one document didn't make it into the index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// credentials missing or unusable: shows up at the first publish, not the thousandth
    #[error("request signing failed: {0}")]
    Signing(String),
    /// the request never got an answer: DNS, TCP, TLS, timeout, pick one
    #[error("transport error: {0}")]
    Transport(String),
    /// the backend answered, and the answer was no
    #[error("search backend answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// 🪦 Why a Job ended up in the failed terminal state. One of these per failed Job, ever.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// the source failed before a single byte arrived: missing bucket or key, access
    /// denied, unreachable store. Same family as [`JobError::SourceRead`] (see
    /// [`JobError::is_source_failure`]), split out because nothing was read and no line
    /// was ever published.
    #[error("could not open {location}: {detail}")]
    SourceOpen {
        location: ObjectLocation,
        detail: String,
    },
    /// the source stream failed after bytes started flowing
    #[error("source stream {location} broke after {lines_read} lines: {detail}")]
    SourceRead {
        location: ObjectLocation,
        lines_read: u64,
        detail: String,
    },
    #[error("line {line_number} is not a log record: {source}")]
    Parse {
        line_number: u64,
        source: ParseError,
    },
    #[error("line {line_number} was not published: {source}")]
    Publish {
        line_number: u64,
        source: PublishError,
    },
    /// the publish task vanished (panic, abort) or the acknowledgment math stopped adding up
    #[error("publish for line {line_number} never acknowledged cleanly: {detail}")]
    Aborted { line_number: u64, detail: String },
}

impl JobError {
    /// 🪣 The object store let the job down, whether at open or mid-read.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, JobError::SourceOpen { .. } | JobError::SourceRead { .. })
    }
}
