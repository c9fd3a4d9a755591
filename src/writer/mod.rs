//! Document writer
//!
//! The writer is the only component that touches the output stream. It runs
//! a small state machine (`Header -> Body -> Footer -> Done`) and delegates
//! the actual encoding to a `FormatSerializer`.
//!
//! # Module Structure
//!
//! - `format` - serializer trait and the shared entry shape
//! - `json` - JSON array of objects
//! - `yaml` - YAML sequence of mappings
//! - `markdown` - heading plus fenced code block per file
//! - `reorder` - buffers out-of-order requests to restore collection order

mod format;
mod json;
mod markdown;
mod reorder;
mod yaml;

use std::fmt;
use std::io::{BufWriter, Write};
use std::time::Duration;

use crate::config::{EntryOrder, Format, SkipPolicy};
use crate::error::{PackError, Result, SkipReason};
use crate::metrics::{FileRecord, Ledger, Observer};

pub use format::{Entry, FormatSerializer, serializer_for};
pub use json::JsonSerializer;
pub use markdown::{MarkdownSerializer, fence_for};
pub use reorder::ReorderBuffer;
pub use yaml::YamlSerializer;

/// Content of a file, or why it has none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Content(String),
    Skipped(SkipReason),
}

/// One file's result, handed from a worker to the writer.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Position in collection order
    pub index: usize,
    /// Path relative to the root, `/`-separated
    pub path: String,
    pub outcome: FileOutcome,
    /// Bytes read, or the on-disk size for oversize skips
    pub bytes: u64,
    /// Time the worker spent on this file
    pub duration: Duration,
}

impl WriteRequest {
    fn record(&self) -> FileRecord {
        let skip_reason = match &self.outcome {
            FileOutcome::Content(_) => None,
            FileOutcome::Skipped(reason) => Some(reason.clone()),
        };
        FileRecord {
            path: self.path.clone(),
            bytes: self.bytes,
            included: skip_reason.is_none(),
            skip_reason,
            duration: self.duration,
        }
    }
}

/// Writer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Header,
    Body,
    Footer,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Header => "header",
            Phase::Body => "body",
            Phase::Footer => "footer",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Counters kept by the writer while it emits the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    /// Body entries emitted (content and skip entries)
    pub entries: usize,
    /// Entries that carried content
    pub included: usize,
    /// Skipped files seen, whether or not they were emitted
    pub errors: usize,
}

/// What a finished writer hands back
pub struct Finished<W> {
    pub output: W,
    pub stats: DocumentStats,
    pub ledger: Ledger,
    /// Most requests the reorder buffer held at once
    pub reorder_peak: usize,
}

/// Single-owner document writer.
pub struct DocumentWriter<W: Write> {
    out: BufWriter<W>,
    serializer: Box<dyn FormatSerializer>,
    policy: SkipPolicy,
    reorder: Option<ReorderBuffer>,
    phase: Phase,
    stats: DocumentStats,
    ledger: Ledger,
    observer: Option<Box<dyn Observer>>,
}

impl<W: Write> DocumentWriter<W> {
    /// Create a writer for `format`. `title` names the document where the
    /// format has a place for it (the Markdown heading).
    pub fn new(output: W, format: Format, title: &str) -> Self {
        Self {
            out: BufWriter::new(output),
            serializer: serializer_for(format, title),
            policy: SkipPolicy::default(),
            reorder: None,
            phase: Phase::Header,
            stats: DocumentStats::default(),
            ledger: Ledger::default(),
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: SkipPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_order(mut self, order: EntryOrder) -> Self {
        self.reorder = match order {
            EntryOrder::Arrival => None,
            EntryOrder::Collection => Some(ReorderBuffer::new()),
        };
        self
    }

    /// Restore collection order with a caller-supplied buffer.
    pub fn with_reorder(mut self, buffer: ReorderBuffer) -> Self {
        self.reorder = Some(buffer);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> DocumentStats {
        self.stats
    }

    fn expect_phase(&self, expected: Phase, op: &str) -> Result<()> {
        if self.phase != expected {
            return Err(PackError::Processing(format!(
                "cannot {} in {} phase",
                op, self.phase
            )));
        }
        Ok(())
    }

    /// Emit the opening token and move to the body.
    pub fn begin(&mut self) -> Result<()> {
        self.expect_phase(Phase::Header, "write header")?;
        self.serializer.header(&mut self.out)?;
        self.phase = Phase::Body;
        Ok(())
    }

    /// Accept one request. Under collection ordering it may be held back
    /// until every earlier request has arrived.
    pub fn write_entry(&mut self, request: WriteRequest) -> Result<()> {
        self.expect_phase(Phase::Body, "write entry")?;
        let ready = match self.reorder.as_mut() {
            Some(buffer) => buffer.push(request),
            None => vec![request],
        };
        for request in ready {
            self.emit(request)?;
        }
        Ok(())
    }

    fn emit(&mut self, request: WriteRequest) -> Result<()> {
        let record = request.record();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_file(&record);
        }
        self.ledger.on_file(&record);

        let entry = match &request.outcome {
            FileOutcome::Content(content) => {
                self.stats.included += 1;
                Entry {
                    path: &request.path,
                    content: Some(content.as_str()),
                    error: None,
                }
            }
            FileOutcome::Skipped(reason) => {
                self.stats.errors += 1;
                if self.policy == SkipPolicy::Omit {
                    return Ok(());
                }
                Entry {
                    path: &request.path,
                    content: None,
                    error: Some(reason.to_string()),
                }
            }
        };

        self.serializer
            .entry(&mut self.out, &entry, self.stats.entries)?;
        self.stats.entries += 1;
        Ok(())
    }

    /// Release anything still buffered, emit the closing token and flush.
    pub fn finish(mut self) -> Result<Finished<W>> {
        self.expect_phase(Phase::Body, "write footer")?;

        let mut reorder_peak = 0;
        if let Some(buffer) = self.reorder.take() {
            reorder_peak = buffer.peak();
            for leftover in buffer.drain() {
                self.emit(leftover)?;
            }
        }

        self.phase = Phase::Footer;
        self.serializer.footer(&mut self.out, &self.stats)?;
        self.out
            .flush()
            .map_err(|e| PackError::output("flush", e))?;
        self.phase = Phase::Done;

        let output = self
            .out
            .into_inner()
            .map_err(|e| PackError::output("flush", e.into_error()))?;

        Ok(Finished {
            output,
            stats: self.stats,
            ledger: self.ledger,
            reorder_peak,
        })
    }
}
