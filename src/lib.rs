//! Treepack - pack a directory tree into a single JSON, YAML or Markdown document
//!
//! Files are collected by a lazy walk that respects .gitignore, read by a
//! bounded pool of worker threads, and written by one writer thread so the
//! document is always well-formed.

pub mod collect;
pub mod config;
pub mod error;
pub mod language;
pub mod metrics;
pub mod pipeline;
pub mod resolve;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod writer;

pub use collect::{Collector, FileTask, GitFilter};
pub use config::{
    EntryOrder, FilterConfig, Format, MAX_CONCURRENCY, RunContext, SkipPolicy, load_filter_config,
    parse_size,
};
pub use error::{PackError, Result, SkipReason, ValidationError};
pub use metrics::{FileRecord, Ledger, Observer, RunReport, RunTimings, print_report, print_report_json};
pub use pipeline::{CancelToken, Pipeline, RunOutcome};
pub use writer::{DocumentStats, DocumentWriter, FileOutcome, WriteRequest};
