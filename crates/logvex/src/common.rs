//! 📦 Common data structures: the building blocks of logvex
//!
//! 🎬 COLD OPEN. INT. S3 BUCKET, 3:47 AM
//!
//! A log file sits in a bucket. It has been growing since 2019. Nobody has read
//! it. Nobody has *wanted* to read it. Tonight, someone is going to read every
//! single line of it, one at a time, without ever holding the whole thing in RAM.
//! That someone is a `LogLine`. Many of them, actually. They come and they go.
//!
//! This module holds the tiny load-bearing types that name where bytes come from
//! ([`ObjectLocation`]) and what one unit of raw log text looks like ([`LogLine`]).
//!
//! 🦆

use std::borrow::Cow;
use std::fmt;

use anyhow::{Context, Result};

/// 🪣 Where a log object lives: one bucket, one key. The source identifier of a Job.
///
/// Displays as `s3://bucket/key` because that's what every human pastes into Slack anyway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    /// 🪣 the bucket: where the data lives, sleeps, and waits for us
    pub bucket: String,
    /// 🗝️ the key, already URI-unescaped. `logs/access log.txt`, not `logs/access+log.txt`
    pub key: String,
}

impl ObjectLocation {
    /// 🚀 Builds a location from anything string-shaped.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// 🔍 Parses `s3://bucket/key/with/slashes` into a location.
    ///
    /// The scheme is optional: `bucket/key` works too, because typing `s3://`
    /// forty times a day is how carpal tunnel starts.
    pub fn parse_uri(uri: &str) -> Result<Self> {
        let the_rest = uri.strip_prefix("s3://").unwrap_or(uri);
        let (bucket, key) = the_rest.split_once('/').with_context(|| {
            format!(
                "💀 '{}' is not an object location. Expected s3://bucket/key: a bucket, a slash, \
                 and a key. We got a bucket and an existential void where the key should be.",
                uri
            )
        })?;
        if bucket.is_empty() || key.is_empty() {
            anyhow::bail!(
                "💀 '{}' has an empty bucket or key. Both are mandatory. Like pants at the office.",
                uri
            );
        }
        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// 🧵 One newline-delimited unit of raw log text, plus where in the file it came from.
///
/// Immutable by construction: fields are private, accessors hand out borrows.
/// Produced by the splitter, consumed exactly once by the record parser, then dropped.
/// A short, meaningful life. More than most log lines get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    // 🔢 1-based line number in the source object, for error messages a human can act on
    number: u64,
    // 📦 the raw bytes, terminator already stripped
    bytes: Vec<u8>,
}

impl LogLine {
    pub(crate) fn new(number: u64, bytes: Vec<u8>) -> Self {
        Self { number, bytes }
    }

    /// 🔢 1-based position of this line in its source object.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// 📦 The raw bytes, no terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 🔤 The line as text. Invalid UTF-8 is replaced, not rejected: access logs
    /// happily record whatever garbage a scanner threw at the server.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// 🫥 Empty or whitespace-only. These never become records.
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}
