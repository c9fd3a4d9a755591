//! Worker thread logic for parallel file reading
//!
//! Each worker:
//! - Pulls file tasks from the path queue
//! - Reads the file, bounded by the configured maximum size
//! - Sends exactly one write request per task to the writer, carrying
//!   either the content or the reason the file was skipped

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace};

use crate::collect::FileTask;
use crate::config::{FilterConfig, RunContext};
use crate::error::{PackError, Result, SkipReason};
use crate::resolve::relative_path;
use crate::writer::{FileOutcome, WriteRequest};

use super::queue::OrderWindow;

/// Bytes inspected for NUL when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8192;

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Files read successfully
    pub files_read: AtomicU64,

    /// Bytes read from included files
    pub bytes_read: AtomicU64,

    /// Files recorded as skipped
    pub skipped: AtomicU64,
}

impl WorkerStats {
    fn record_read(&self, bytes: u64) {
        self.files_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_read(&self) -> u64 {
        self.files_read.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Opens the order window if the worker dies holding a task whose index
/// the writer would otherwise wait on forever
struct ReleaseOnPanic(Arc<OrderWindow>);

impl Drop for ReleaseOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

/// A worker thread that turns file tasks into write requests
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: Arc<RunContext>,
        filter: Arc<FilterConfig>,
        tasks: Receiver<FileTask>,
        requests: Sender<WriteRequest>,
        window: Option<Arc<OrderWindow>>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("treepack-worker-{}", id))
            .spawn(move || {
                let _release = window.map(ReleaseOnPanic);
                worker_loop(id, &ctx, &filter, tasks, requests, &stats_clone)
            })
            .map_err(|e| PackError::Spawn {
                role: "worker",
                source: e,
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish and hand back its counters
    pub fn join(mut self) -> Result<Arc<WorkerStats>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| PackError::WorkerPanicked { id: self.id })?;
        }
        Ok(self.stats)
    }
}

fn worker_loop(
    id: usize,
    ctx: &RunContext,
    filter: &FilterConfig,
    tasks: Receiver<FileTask>,
    requests: Sender<WriteRequest>,
    stats: &WorkerStats,
) {
    debug!(worker = id, "worker started");

    // Ends when the dispatcher closes the queue
    for task in tasks.iter() {
        if ctx.cancel.is_cancelled() {
            debug!(worker = id, "cancellation observed, exiting");
            break;
        }

        let request = process_task(&ctx.root, task, filter.max_file_size);
        match request.outcome {
            FileOutcome::Content(_) => stats.record_read(request.bytes),
            FileOutcome::Skipped(ref reason) => {
                debug!(worker = id, path = %request.path, reason = %reason, "file skipped");
                stats.record_skip();
            }
        }

        if requests.send(request).is_err() {
            // Writer has stopped; nothing more can be delivered
            debug!(worker = id, "write queue closed, exiting");
            break;
        }
    }

    debug!(worker = id, "worker finished");
}

/// Turn one task into its write request. Never fails: read errors become skips.
pub fn process_task(root: &Path, task: FileTask, max_file_size: u64) -> WriteRequest {
    let start = Instant::now();
    let path = relative_path(root, &task.path);
    trace!(path = %path, "reading");

    let (outcome, bytes) = match read_file_content(&task.path, max_file_size) {
        Ok(content) => {
            let bytes = content.len() as u64;
            (FileOutcome::Content(content), bytes)
        }
        Err(reason) => {
            let bytes = match reason {
                SkipReason::TooLarge { size, .. } => size,
                _ => 0,
            };
            (FileOutcome::Skipped(reason), bytes)
        }
    };

    WriteRequest {
        index: task.index,
        path,
        outcome,
        bytes,
        duration: start.elapsed(),
    }
}

/// Read a text file if it meets size requirements.
///
/// The size is checked before reading and the read itself is capped, so a
/// file that grows after the check is still bounded by `max_size`.
pub fn read_file_content(path: &Path, max_size: u64) -> std::result::Result<String, SkipReason> {
    let file = File::open(path).map_err(|e| SkipReason::from_io(&e))?;
    let size = file.metadata().map_err(|e| SkipReason::from_io(&e))?.len();
    if size > max_size {
        return Err(SkipReason::TooLarge {
            size,
            limit: max_size,
        });
    }

    let mut buf = Vec::with_capacity(size as usize);
    file.take(max_size.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| SkipReason::from_io(&e))?;

    if buf.len() as u64 > max_size {
        return Err(SkipReason::TooLarge {
            size: buf.len() as u64,
            limit: max_size,
        });
    }

    let sniff = &buf[..buf.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Err(SkipReason::Binary);
    }

    String::from_utf8(buf).map_err(|_| SkipReason::InvalidUtf8)
}
