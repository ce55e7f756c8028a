//! 📊 progress.rs: "Are we there yet?" Every job, every file, forever.
//!
//! 🚀 Two views of the same question:
//! - [`ProgressMetrics`]: one live indicatif bar per job. Bytes read from the object,
//!   lines discovered, documents acknowledged, and the rates in between.
//! - [`summary_table`]: one comfy-table row per job, printed once the batch is over.
//!
//! ⚠️  Warning: Watching this progress bar will not make the search cluster go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING, presets::UTF8_FULL};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::supervisors::JobReport;
use crate::tracker::JobOutcome;

// -- 📏 one mebibyte: not a megabyte, pedants. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

// -- 🎨 redrawing a table per log line would cost more than parsing it
const RENDER_INTERVAL: Duration = Duration::from_millis(200);

/// 📦 Bytes, scaled to whatever unit doesn't make the reader squint.
fn format_bytes(bytes: u64) -> String {
    if bytes >= 512 * MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000": you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 Rates over the sliding window.
struct Rates {
    lines_per_sec: f64,
    acks_per_sec: f64,
    mib_per_sec: f64,
}

/// 📊 Live progress for one job.
///
/// Uses a sliding 5-second window for rates so one slow publish doesn't scare you.
///
/// # Ancient Proverb
/// "He who streams a 40 GB log without a progress bar, streams alone and in darkness."
pub(crate) struct ProgressMetrics {
    source_name: String,
    /// 📏 `None` when the object store wouldn't say
    total_size: Option<u64>,
    bytes_read: u64,
    lines: u64,
    acknowledged: u64,
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, bytes, lines, acks)
    rate_samples: VecDeque<(Instant, u64, u64, u64)>,
    start_time: Instant,
    last_render: Option<Instant>,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("bytes_read", &self.bytes_read)
            .field("lines", &self.lines)
            .field("acknowledged", &self.acknowledged)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 Add a bar for one job to the shared multi-bar display.
    pub(crate) fn new(source_name: String, total_size: Option<u64>, display: &MultiProgress) -> Self {
        let the_bar = match total_size {
            Some(size) => ProgressBar::new(size),
            None => ProgressBar::no_length(),
        };
        let the_style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}]")
            // -- 🐛 the template is hardcoded; if it ever fails, the plain bar is fine too
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        the_bar.set_style(the_style);
        let progress_bar = display.add(the_bar);

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64, 0u64));

        Self {
            source_name,
            total_size,
            bytes_read: 0,
            lines: 0,
            acknowledged: 0,
            progress_bar,
            rate_samples,
            start_time,
            last_render: None,
        }
    }

    /// 🔄 Record absolute totals. Cheap; redraws at most every [`RENDER_INTERVAL`].
    pub(crate) fn update(&mut self, bytes_read: u64, lines: u64, acknowledged: u64) {
        self.bytes_read = bytes_read;
        self.lines = lines;
        self.acknowledged = acknowledged;
        self.progress_bar.set_position(bytes_read);

        let now = Instant::now();
        let is_due = self
            .last_render
            .is_none_or(|last| now.duration_since(last) >= RENDER_INTERVAL);
        if is_due {
            self.last_render = Some(now);
            let rates = self.calculate_rates(now);
            self.render(rates);
        }
    }

    /// ✅ Final redraw and leave the bar on screen with the verdict.
    pub(crate) fn finish(&mut self, outcome: &JobOutcome) {
        let rates = self.calculate_rates(Instant::now());
        self.render(rates);
        let the_verdict = if outcome.is_success() { "✅ done" } else { "💀 failed" };
        self.progress_bar.finish_with_message(format!(
            "{} {}: {} lines, {} acknowledged",
            self.source_name,
            the_verdict,
            format_number(self.lines),
            format_number(self.acknowledged)
        ));
    }

    fn calculate_rates(&mut self, now: Instant) -> Rates {
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.bytes_read, self.lines, self.acknowledged));

        if let Some(&(oldest_time, oldest_bytes, oldest_lines, oldest_acks)) =
            self.rate_samples.front()
        {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                return Rates {
                    lines_per_sec: self.lines.saturating_sub(oldest_lines) as f64 / elapsed,
                    acks_per_sec: self.acknowledged.saturating_sub(oldest_acks) as f64 / elapsed,
                    mib_per_sec: (self.bytes_read.saturating_sub(oldest_bytes) as f64 / elapsed)
                        / MIB as f64,
                };
            }
        }
        Rates {
            lines_per_sec: 0.0,
            acks_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    /// 🎨 Layout:
    /// ```text
    /// source: s3://bucket/key
    ///   <lines/s>     <lines>
    ///   <acks/s>      <acknowledged>
    ///   <MiB/s>       <bytes / total (pct)>
    ///   <elapsed>
    /// ```
    fn render(&self, rates: Rates) {
        let the_bytes = match self.total_size {
            Some(size) if size > 0 => format!(
                "{} / {} ({:.2}%)",
                format_bytes(self.bytes_read),
                format_bytes(size),
                (self.bytes_read as f64 / size as f64) * 100.0
            ),
            _ => format_bytes(self.bytes_read),
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Lines/s", format_number(rates.lines_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Lines", format_number(self.lines)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} Acks/s", format_number(rates.acks_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Acknowledged", format_number(self.acknowledged)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(the_bytes).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(self.start_time.elapsed())))
                .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}

/// 🍽️ One row per job: where, verdict, how many, and why it died if it did.
pub fn summary_table(reports: &[JobReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["object", "outcome", "acknowledged", "skipped", "detail"]);

    for report in reports {
        let the_row = match &report.outcome {
            JobOutcome::Succeeded {
                acknowledged,
                skipped,
            } => vec![
                Cell::new(report.location.to_string()),
                Cell::new("✅ succeeded"),
                Cell::new(format_number(*acknowledged)).set_alignment(CellAlignment::Right),
                Cell::new(format_number(*skipped)).set_alignment(CellAlignment::Right),
                Cell::new(""),
            ],
            JobOutcome::Failed(the_error) => vec![
                Cell::new(report.location.to_string()),
                Cell::new("💀 failed"),
                Cell::new("-").set_alignment(CellAlignment::Right),
                Cell::new("-").set_alignment(CellAlignment::Right),
                Cell::new(the_error.to_string()),
            ],
        };
        table.add_row(the_row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ObjectLocation;
    use crate::error::JobError;

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_durations_grow_an_hour_column_only_when_needed() {
        assert_eq!(format_duration(Duration::from_secs(65)), "01:05");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn the_one_where_bytes_pick_a_sensible_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(1024 * MIB), "1024.00 MiB");
    }

    #[test]
    fn the_one_where_the_summary_names_every_job_and_every_failure() {
        let the_reports = vec![
            JobReport {
                location: ObjectLocation::new("logs", "good.log"),
                outcome: JobOutcome::Succeeded {
                    acknowledged: 1_500,
                    skipped: 2,
                },
            },
            JobReport {
                location: ObjectLocation::new("logs", "bad.log"),
                outcome: JobOutcome::Failed(JobError::SourceOpen {
                    location: ObjectLocation::new("logs", "bad.log"),
                    detail: "NoSuchKey".to_string(),
                }),
            },
        ];
        let the_rendered = summary_table(&the_reports).to_string();
        assert!(the_rendered.contains("s3://logs/good.log"));
        assert!(the_rendered.contains("1,500"));
        assert!(the_rendered.contains("s3://logs/bad.log"));
        assert!(the_rendered.contains("NoSuchKey"));
    }

    #[test]
    fn the_one_where_a_hidden_display_still_counts() {
        let the_display = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let mut the_metrics =
            ProgressMetrics::new("s3://logs/a.log".to_string(), Some(100), &the_display);
        the_metrics.update(50, 3, 2);
        the_metrics.update(100, 4, 4);
        the_metrics.finish(&JobOutcome::Succeeded {
            acknowledged: 4,
            skipped: 0,
        });
        assert_eq!(the_metrics.bytes_read, 100);
        assert_eq!(the_metrics.acknowledged, 4);
    }
}
