//! ✂️ The Line Splitter: bytes go in, lines come out, nobody gets concatenated.
//!
//! 🎬 *[a byte stream arrives from S3 in chunks of whatever size the network felt like]*
//! *[somewhere in chunk 3,412, a log line is cut in half]*
//! *[the splitter does not panic. the splitter has seen this before.]*
//!
//! Wraps any `AsyncRead` in a `BufReader` and scans each read window with `memchr`
//! for `\n`. Partial lines are carried over in `pending` until their terminator
//! shows up (or the stream ends, in which case the leftover is still a line).
//!
//! 🧠 Knowledge graph:
//! - Cardinality: one byte stream → many [`LogLine`]s, in file order, consume-once.
//! - Memory: one read window + the current line. A file of 40 GB costs the same as
//!   a file of 40 bytes, give or take the longest line.
//! - `next_line` is cancel-safe: `fill_buf` is cancel-safe and every partial line lives
//!   in `self`, not in the future. The job loop relies on this inside `select!`.
//! - Errors are terminal: after one `Err`, the splitter is done. No retry. No second date.

use anyhow::{Context, Result};
use memchr::memchr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

use crate::common::LogLine;

/// ✂️ Pull-based line splitter over an async byte stream.
pub(crate) struct LineSplitter<R> {
    reader: BufReader<R>,
    // 🧩 the half-line we're holding while we wait for its other half
    pending: Vec<u8>,
    lines_emitted: u64,
    bytes_consumed: u64,
    max_line_bytes: usize,
    // 🏁 true once we hit EOF or an error: after that, only `None`
    finished: bool,
}

impl<R> std::fmt::Debug for LineSplitter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 the reader is an opaque S3 pipe. nobody wants to see it. we skip it.
        f.debug_struct("LineSplitter")
            .field("pending_len", &self.pending.len())
            .field("lines_emitted", &self.lines_emitted)
            .field("bytes_consumed", &self.bytes_consumed)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> LineSplitter<R> {
    /// 🚀 `read_buffer_bytes` is the read window; `max_line_bytes` is the point at which
    /// a "line" stops being a line and starts being a memory leak with ambitions.
    pub(crate) fn new(reader: R, read_buffer_bytes: usize, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(read_buffer_bytes.max(1), reader),
            pending: Vec::new(),
            lines_emitted: 0,
            bytes_consumed: 0,
            max_line_bytes,
            finished: false,
        }
    }

    /// 📄 Next line, `Ok(None)` at end-of-stream, `Err` when the stream breaks.
    ///
    /// A final line without a trailing `\n` is still a line. A trailing `\r` is stripped.
    /// Empty lines are emitted as empty lines: deciding they don't matter is the
    /// caller's business, not ours.
    pub(crate) async fn next_line(&mut self) -> Result<Option<LogLine>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let the_window = match self.reader.fill_buf().await {
                Ok(window) => window,
                Err(the_io_error) => {
                    self.finished = true;
                    return Err(the_io_error).context(format!(
                        "💀 The byte stream broke after {} lines ({} bytes). The pipe went quiet \
                         mid-sentence, like a phone call in a tunnel. No retry: the job is over.",
                        self.lines_emitted, self.bytes_consumed
                    ));
                }
            };

            // 🏁 EOF: whatever is pending is the last line, terminator or not
            if the_window.is_empty() {
                self.finished = true;
                if self.pending.is_empty() {
                    trace!("✂️ end of stream after {} lines", self.lines_emitted);
                    return Ok(None);
                }
                return Ok(Some(self.emit()));
            }

            match memchr(b'\n', the_window) {
                Some(the_newline_at) => {
                    self.pending.extend_from_slice(&the_window[..the_newline_at]);
                    self.reader.consume(the_newline_at + 1);
                    self.bytes_consumed += (the_newline_at + 1) as u64;
                    self.guard_line_length()?;
                    return Ok(Some(self.emit()));
                }
                None => {
                    // -- 🧩 no terminator in this window. stash it, ask for more.
                    let the_window_len = the_window.len();
                    self.pending.extend_from_slice(the_window);
                    self.reader.consume(the_window_len);
                    self.bytes_consumed += the_window_len as u64;
                    self.guard_line_length()?;
                }
            }
        }
    }

    /// 📊 Total bytes pulled off the stream so far, terminators included.
    pub(crate) fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    fn guard_line_length(&mut self) -> Result<()> {
        if self.pending.len() > self.max_line_bytes {
            self.finished = true;
            anyhow::bail!(
                "💀 Line {} is longer than {} bytes and still going. That's not a log line, \
                 that's a novella. Refusing to buffer it.",
                self.lines_emitted + 1,
                self.max_line_bytes
            );
        }
        Ok(())
    }

    fn emit(&mut self) -> LogLine {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        self.lines_emitted += 1;
        LogLine::new(self.lines_emitted, std::mem::take(&mut self.pending))
    }
}
