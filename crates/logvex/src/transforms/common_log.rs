//! 🪵📡 Apache Common / Combined Log Format → search document JSON 🔄
//!
//! 🎬 COLD OPEN. INT. WEB SERVER, 1995 (AND ALSO EVERY YEAR SINCE)
//!
//! Someone at NCSA decided what a web request looks like when written down:
//!
//! ```text
//! 127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08"
//! └─host──┘ ↑ └user┘ └──────────time──────────┘ └──────request─────────────┘ └st┘ └sz┘ └────────referer (combined)─────┘ └agent (combined)┘
//!        ident
//! ```
//!
//! Thirty years later the format is still here. So are we. One regex takes the line
//! apart. Every field after the address sits inside the optional group of the field
//! before it, so a line that stops early still matches as far as it got, and the first
//! empty capture names the field that went missing.
//!
//! 🧠 Knowledge graph:
//! - Common format = 7 fields. Combined = 7 + referer + agent. Same grammar, optional tail.
//! - Quoted fields may carry `\"` and `\\`. Those are unescaped; `\xhh` stays as written.
//! - `-` means "absent" for ident/user/referer/agent, and `0` for the size.
//! - The request line is kept verbatim in `request`; `method`/`path`/`protocol` only appear
//!   when it splits cleanly into three parts. Scanners send TLS handshakes to port 80.
//!   Those still parse. They just don't get a method.
//! - Anything after the agent (response times, vhost, …) is ignored.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use regex::{Captures, Regex};
use serde::Serialize;

use super::ParseError;

// 📅 `10/Oct/2000:13:55:36 -0700`
const THE_CLF_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

// 🧩 capture names double as the field names in errors and in the document
static THE_CLF_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^\s*(?P<remote_addr>\S+)"#,
        r#"(?: +(?P<remote_ident>\S+) +(?P<remote_user>\S+)"#,
        r#"(?: +\[(?P<time_local>[^\]]*)\]"#,
        r#"(?: +"(?P<request>(?:[^"\\]|\\.)*)""#,
        r#"(?: +(?P<status>\S+)"#,
        r#"(?: +(?P<body_bytes_sent>\S+)"#,
        r#"(?: +"(?P<http_referer>(?:[^"\\]|\\.)*)" +"(?P<http_user_agent>(?:[^"\\]|\\.)*)")?"#,
        r#")?)?)?)?)?"#,
    ))
});

/// 📦 One access-log line, taken apart. Borrowed from the line wherever no unescaping
/// was needed, which is almost always.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LogRecord<'a> {
    pub remote_addr: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ident: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<&'a str>,
    /// ⏰ serialized as RFC 3339 with the server's original offset
    pub time_local: DateTime<FixedOffset>,
    pub request: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub status: u16,
    pub body_bytes_sent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_referer: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_user_agent: Option<Cow<'a, str>>,
}

/// 🔬 Parse one line. Pure. No I/O. No opinions about blank lines (the caller filters those).
pub(crate) fn parse(line: &str) -> Result<LogRecord<'_>, ParseError> {
    let the_pattern = THE_CLF_PATTERN
        .as_ref()
        .map_err(|e| ParseError::Grammar(e.to_string()))?;
    let the_captures = the_pattern
        .captures(line)
        .ok_or(ParseError::MissingField("remote_addr"))?;
    // -- 🧹 whatever the pattern couldn't place. empty = the line simply ended.
    let the_rest = the_captures
        .get(0)
        .map_or(line, |whole| &line[whole.end()..])
        .trim();

    let remote_addr = required(&the_captures, the_rest, "remote_addr")?;
    let remote_ident = dash_is_none(required(&the_captures, the_rest, "remote_ident")?);
    let remote_user = dash_is_none(required(&the_captures, the_rest, "remote_user")?);

    let the_raw_time = required(&the_captures, the_rest, "time_local")?;
    let time_local = DateTime::parse_from_str(the_raw_time, THE_CLF_TIMESTAMP_FORMAT)
        .map_err(|_| ParseError::Malformed {
            field: "time_local",
            value: the_raw_time.to_string(),
        })?;

    let request = unescape(required(&the_captures, the_rest, "request")?);
    let (method, path, protocol) = split_request_line(&request);

    let status = parse_status(required(&the_captures, the_rest, "status")?)?;

    let the_raw_size = required(&the_captures, the_rest, "body_bytes_sent")?;
    let body_bytes_sent = if the_raw_size == "-" {
        0
    } else {
        the_raw_size.parse().map_err(|_| ParseError::Malformed {
            field: "body_bytes_sent",
            value: the_raw_size.to_string(),
        })?
    };

    // -- 🎁 combined format tail: referer + agent. common format simply ends here.
    let (http_referer, http_user_agent) = match (
        the_captures.name("http_referer"),
        the_captures.name("http_user_agent"),
    ) {
        (Some(referer), Some(agent)) => (
            dash_is_none_cow(unescape(referer.as_str())),
            dash_is_none_cow(unescape(agent.as_str())),
        ),
        _ if the_rest.is_empty() => (None, None),
        _ => {
            return Err(ParseError::Malformed {
                field: "http_referer",
                value: the_rest.to_string(),
            });
        }
    };

    Ok(LogRecord {
        remote_addr,
        remote_ident,
        remote_user,
        time_local,
        request,
        method,
        path,
        protocol,
        status,
        body_bytes_sent,
        http_referer,
        http_user_agent,
    })
}

/// 🎯 A capture the grammar can't do without. Missing at the end of the line means the
/// line was cut short; missing with text left over means that text is the wrong shape.
fn required<'h>(
    captures: &Captures<'h>,
    rest: &str,
    field: &'static str,
) -> Result<&'h str, ParseError> {
    match captures.name(field) {
        Some(the_match) => Ok(the_match.as_str()),
        None if rest.is_empty() => Err(ParseError::MissingField(field)),
        None => Err(ParseError::Malformed {
            field,
            value: rest.to_string(),
        }),
    }
}

fn parse_status(raw: &str) -> Result<u16, ParseError> {
    let the_status = if raw.len() == 3 && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse().ok()
    } else {
        None
    };
    the_status.ok_or_else(|| ParseError::Malformed {
        field: "status",
        value: raw.to_string(),
    })
}

fn split_request_line(request: &str) -> (Option<String>, Option<String>, Option<String>) {
    let the_parts: Vec<&str> = request.split_ascii_whitespace().collect();
    match the_parts.as_slice() {
        [method, path, protocol] => (
            Some((*method).to_string()),
            Some((*path).to_string()),
            Some((*protocol).to_string()),
        ),
        // -- 🦆 "-", a lone "GET /", a TLS ClientHello. keep it verbatim, move on.
        _ => (None, None, None),
    }
}

/// 💬 `\"` → `"` and `\\` → `\`. Borrowed when there was nothing to unescape.
fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut the_unescaped = String::with_capacity(raw.len());
    let mut the_chars = raw.chars();
    while let Some(ch) = the_chars.next() {
        if ch != '\\' {
            the_unescaped.push(ch);
            continue;
        }
        match the_chars.next() {
            Some(escaped @ ('"' | '\\')) => the_unescaped.push(escaped),
            // -- 🧾 \xhh and friends stay exactly as apache wrote them
            Some(other) => {
                the_unescaped.push('\\');
                the_unescaped.push(other);
            }
            None => the_unescaped.push('\\'),
        }
    }
    Cow::Owned(the_unescaped)
}

fn dash_is_none(value: &str) -> Option<&str> {
    (value != "-").then_some(value)
}

fn dash_is_none_cow(value: Cow<'_, str>) -> Option<Cow<'_, str>> {
    (value != "-").then_some(value)
}
