//! Per-file metrics and the end-of-run report
//!
//! Every completed write request becomes a `FileRecord`. The writer keeps a
//! `Ledger` of them and forwards each one to an optional `Observer`. After
//! the run the ledger is summarized into a `RunReport`.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::Format;
use crate::error::SkipReason;

/// Outcome of one file, as seen by the writer.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: String,
    /// Bytes read, or the on-disk size for oversize skips
    pub bytes: u64,
    pub included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(rename = "duration_us", serialize_with = "serialize_micros")]
    pub duration: Duration,
}

fn serialize_micros<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

/// Receives a record for every file the writer handles.
///
/// Called on the writer thread, in emission order.
pub trait Observer: Send {
    fn on_file(&mut self, record: &FileRecord);
}

/// In-memory record of every file handled during a run.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<FileRecord>,
}

impl Ledger {
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn included(&self) -> usize {
        self.records.iter().filter(|r| r.included).count()
    }

    pub fn skipped(&self) -> usize {
        self.len() - self.included()
    }
}

impl Observer for Ledger {
    fn on_file(&mut self, record: &FileRecord) {
        self.records.push(record.clone());
    }
}

/// Wall-clock facts about a run that the ledger cannot know.
#[derive(Debug, Clone, Copy)]
pub struct RunTimings {
    pub started_at: DateTime<Utc>,
    /// Time the dispatcher spent walking and enqueueing
    pub collection: Duration,
    pub total: Duration,
}

impl RunTimings {
    /// Timings for a run that started now and took no time; useful as a base.
    pub fn starting_now() -> Self {
        Self {
            started_at: Utc::now(),
            collection: Duration::ZERO,
            total: Duration::ZERO,
        }
    }
}

/// The slowest file of a run
#[derive(Debug, Clone, Serialize)]
pub struct SlowestFile {
    pub path: String,
    pub duration_us: u64,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub format: String,
    pub workers: usize,
    pub files: usize,
    pub included: usize,
    pub skipped: usize,
    pub bytes: u64,
    /// Skip counts keyed by reason kind
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub skip_breakdown: BTreeMap<&'static str, usize>,
    pub collection_ms: u64,
    pub total_ms: u64,
    pub files_per_sec: f64,
    pub bytes_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest: Option<SlowestFile>,
}

impl RunReport {
    pub fn from_ledger(ledger: &Ledger, timings: RunTimings, format: Format, workers: usize) -> Self {
        let mut skip_breakdown = BTreeMap::new();
        let mut bytes = 0u64;
        for record in ledger.records() {
            match &record.skip_reason {
                Some(reason) => *skip_breakdown.entry(reason.kind()).or_insert(0) += 1,
                None => bytes += record.bytes,
            }
        }

        let slowest = ledger
            .records()
            .iter()
            .max_by_key(|r| r.duration)
            .map(|r| SlowestFile {
                path: r.path.clone(),
                duration_us: r.duration.as_micros() as u64,
            });

        let secs = timings.total.as_secs_f64();
        let rate = |n: f64| if secs > 0.0 { n / secs } else { 0.0 };

        Self {
            started_at: timings.started_at,
            format: format.name().to_string(),
            workers,
            files: ledger.len(),
            included: ledger.included(),
            skipped: ledger.skipped(),
            bytes,
            skip_breakdown,
            collection_ms: timings.collection.as_millis() as u64,
            total_ms: timings.total.as_millis() as u64,
            files_per_sec: rate(ledger.len() as f64),
            bytes_per_sec: rate(bytes as f64),
            slowest,
        }
    }
}

/// Print the report to stderr with optional color.
pub fn print_report(report: &RunReport, use_color: bool) -> io::Result<()> {
    let color_choice = if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(color_choice);

    let mut bold = ColorSpec::new();
    bold.set_bold(true);
    stderr.set_color(&bold)?;
    writeln!(stderr, "Run Report")?;
    stderr.reset()?;
    writeln!(stderr, "──────────")?;

    writeln!(
        stderr,
        "Started:      {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(stderr, "Format:       {} ({} workers)", report.format, report.workers)?;
    writeln!(
        stderr,
        "Files:        {} total, {} included, {} skipped",
        report.files, report.included, report.skipped
    )?;
    writeln!(stderr, "Bytes:        {}", format_number(report.bytes))?;
    writeln!(
        stderr,
        "Elapsed:      {} ms (collection {} ms)",
        report.total_ms, report.collection_ms
    )?;
    writeln!(
        stderr,
        "Throughput:   {:.1} files/s, {:.1} KB/s",
        report.files_per_sec,
        report.bytes_per_sec / 1024.0
    )?;

    if !report.skip_breakdown.is_empty() {
        writeln!(stderr)?;
        stderr.set_color(&bold)?;
        writeln!(stderr, "Skipped By Reason:")?;
        stderr.reset()?;

        let mut reason_color = ColorSpec::new();
        reason_color.set_fg(Some(Color::Yellow));
        for (kind, count) in &report.skip_breakdown {
            write!(stderr, "  ")?;
            stderr.set_color(&reason_color)?;
            write!(stderr, "{:<18}", kind)?;
            stderr.reset()?;
            writeln!(stderr, "{:>6}", count)?;
        }
    }

    if let Some(slowest) = &report.slowest {
        writeln!(stderr)?;
        writeln!(
            stderr,
            "Slowest:      {} ({} us)",
            slowest.path, slowest.duration_us
        )?;
    }

    Ok(())
}

/// Print the report as JSON to stderr.
pub fn print_report_json(report: &RunReport) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    eprintln!("{}", json);
    Ok(())
}

/// Format a number with thousand separators.
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
