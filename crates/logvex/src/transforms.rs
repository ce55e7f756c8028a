//! 🔄 Transforms: one raw log line in, one search document out 🎭
//!
//! 🎬 COLD OPEN. INT. CUSTOMS DESK, AIRPORT, 2:47 AM
//!
//! A log line shuffles up to the desk. No passport. No luggage. Just a string of
//! space-separated tokens and a timestamp in a format nobody has used on purpose
//! since 1996. The officer stamps it, splits it into fields, and hands it a JSON
//! boarding pass to the search index. Next!
//!
//! 🧠 Knowledge graph:
//! - Cardinality: one [`LogLine`] → one serialized document, or one [`ParseError`].
//! - Pure: no I/O, no shared state. Safe to call from anywhere, as often as you like.
//! - The grammar lives in [`common_log`]. This file owns the error type and the
//!   policy knob for what a malformed line means to the job.

use serde::Deserialize;

use crate::common::LogLine;

pub(crate) mod common_log;

/// 💀 Why a line refused to become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// the line ended before this field showed up
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// the field is there, it's just wrong
    #[error("field `{field}` is malformed: {value:?}")]
    Malformed { field: &'static str, value: String },
    /// the line grammar itself failed to compile. every line fails the same way.
    #[error("log line grammar is broken: {0}")]
    Grammar(String),
    /// serde_json said no. It never says no. And yet.
    #[error("could not serialize record: {0}")]
    Serialize(String),
}

/// 🎛️ What a malformed line does to its job.
///
/// `Abort` is the classic behavior: one bad line and the whole job fails.
/// `Skip` logs the line, counts it, and keeps going. Pick your poison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    #[default]
    Abort,
    Skip,
}

/// 📦 Parse one line and serialize it straight into the JSON document the index expects.
///
/// The structured record never outlives this call. It is born, serialized, and dropped,
/// like a mayfly with a very specific job.
pub(crate) fn to_document(line: &LogLine) -> Result<String, ParseError> {
    let the_text = line.to_text();
    let the_record = common_log::parse(&the_text)?;
    serde_json::to_string(&the_record).map_err(|e| ParseError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn the_one_where_the_document_carries_every_field_from_the_line()
    -> Result<(), Box<dyn std::error::Error>> {
        let the_line = LogLine::new(
            1,
            br#"192.168.1.20 - alice [28/Feb/2024:23:59:59 +0530] "GET /index.html HTTP/1.1" 200 4096 "https://ref.example/" "agent/1.0""#.to_vec(),
        );
        let the_document: Value = serde_json::from_str(&to_document(&the_line)?)?;

        assert_eq!(the_document["remote_addr"], "192.168.1.20");
        assert_eq!(the_document["remote_user"], "alice");
        assert_eq!(the_document["time_local"], "2024-02-28T23:59:59+05:30");
        assert_eq!(the_document["request"], "GET /index.html HTTP/1.1");
        assert_eq!(the_document["method"], "GET");
        assert_eq!(the_document["path"], "/index.html");
        assert_eq!(the_document["status"], 200);
        assert_eq!(the_document["body_bytes_sent"], 4096);
        assert_eq!(the_document["http_referer"], "https://ref.example/");
        assert_eq!(the_document["http_user_agent"], "agent/1.0");
        // 🫥 absent fields are absent, not null
        assert!(the_document.get("remote_ident").is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_a_malformed_line_surfaces_as_a_parse_error() {
        let the_line = LogLine::new(9, b"definitely not an access log".to_vec());
        assert!(to_document(&the_line).is_err());
    }

    #[test]
    fn the_one_where_the_policy_speaks_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::from_str::<ParseFailurePolicy>("\"skip\"")?,
            ParseFailurePolicy::Skip
        );
        assert_eq!(
            serde_json::from_str::<ParseFailurePolicy>("\"abort\"")?,
            ParseFailurePolicy::Abort
        );
        assert_eq!(ParseFailurePolicy::default(), ParseFailurePolicy::Abort);
        Ok(())
    }
}
