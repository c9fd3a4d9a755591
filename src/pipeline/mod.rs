//! Concurrent collection pipeline
//!
//! # Architecture
//!
//! ```text
//! Collector --(FileTask)--> path queue --> Worker x N --(WriteRequest)--> write queue --> Writer
//!   caller thread            bounded(N)      threads                    bounded(2N)     thread
//! ```
//!
//! The caller thread walks the tree and dispatches paths. Workers read files
//! in parallel. A single writer thread owns the output stream, so entries are
//! never interleaved. Both queues are bounded: a slow writer stalls the
//! workers, which stalls the dispatcher, which stalls the walk.
//!
//! With `EntryOrder::Collection` the dispatcher also waits on an
//! `OrderWindow` so that no task runs more than `ORDER_WINDOW_PER_WORKER`
//! times the worker count ahead of the writer's next expected index.
//!
//! # Module Structure
//!
//! - `cancel` - cooperative cancellation token with optional deadline
//! - `queue` - bounded path queue with cancellable, backpressure-aware sends
//! - `worker` - file reading worker threads

mod cancel;
mod queue;
mod worker;

use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use crate::collect::Collector;
use crate::config::{EntryOrder, FilterConfig, RunContext};
use crate::error::{PackError, Result};
use crate::metrics::{Ledger, Observer, RunReport, RunTimings};
use crate::resolve::resolve_root;
use crate::writer::{DocumentStats, DocumentWriter, Finished, ReorderBuffer, WriteRequest};

pub use cancel::CancelToken;
pub use queue::{OrderWindow, PathSender, QueueStats, SendOutcome, path_queue};

/// Order window width per worker under collection ordering
pub const ORDER_WINDOW_PER_WORKER: usize = 4;
pub use worker::{Worker, WorkerStats, process_task, read_file_content};

/// Everything a successful run hands back.
pub struct RunOutcome<W> {
    /// The output stream, flushed
    pub output: W,
    pub stats: DocumentStats,
    pub ledger: Ledger,
    pub timings: RunTimings,
    /// Paths handed to workers
    pub dispatched: usize,
    /// Files the walk produced, dispatched or not
    pub collected: usize,
    /// Walk entries that could not be traversed
    pub skipped_dirs: usize,
    /// Times the dispatcher found the path queue full
    pub backpressure_events: u64,
    /// Most out-of-order entries held at once under collection ordering
    pub reorder_peak: usize,
}

/// A validated, ready-to-run pipeline.
pub struct Pipeline {
    ctx: Arc<RunContext>,
    filter: Arc<FilterConfig>,
    collector: Collector,
}

impl Pipeline {
    /// Validate the filter and resolve the root. Nothing is spawned until
    /// `run`.
    pub fn new(ctx: RunContext, filter: FilterConfig) -> Result<Self> {
        filter.validate()?;
        let root = resolve_root(&ctx.root)?;
        let ctx = RunContext { root, ..ctx };

        let filter = Arc::new(filter);
        let collector = Collector::new(&ctx.root, Arc::clone(&filter))?;

        Ok(Self {
            ctx: Arc::new(ctx),
            filter,
            collector,
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Name used for the document title: the root directory's name.
    pub fn title(&self) -> String {
        self.ctx
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.ctx.root.display().to_string())
    }

    /// Run the pipeline, writing the document to `output`.
    pub fn run<W: Write + Send + 'static>(&self, output: W) -> Result<RunOutcome<W>> {
        self.execute(output, None)
    }

    /// Like `run`, also delivering every `FileRecord` to `observer`.
    pub fn run_with_observer<W: Write + Send + 'static>(
        &self,
        output: W,
        observer: Box<dyn Observer>,
    ) -> Result<RunOutcome<W>> {
        self.execute(output, Some(observer))
    }

    /// Summarize a finished run.
    pub fn report<W>(&self, outcome: &RunOutcome<W>) -> RunReport {
        RunReport::from_ledger(
            &outcome.ledger,
            outcome.timings,
            self.ctx.format,
            self.ctx.concurrency,
        )
    }

    fn execute<W: Write + Send + 'static>(
        &self,
        output: W,
        observer: Option<Box<dyn Observer>>,
    ) -> Result<RunOutcome<W>> {
        let started_at = Utc::now();
        let start = Instant::now();
        let ctx = &self.ctx;

        info!(
            root = %ctx.root.display(),
            format = %ctx.format,
            workers = ctx.concurrency,
            "starting run"
        );

        // Fails before any output is produced if the root is unreadable
        let mut paths = self.collector.paths()?;

        let window = match ctx.order {
            EntryOrder::Collection => Some(Arc::new(OrderWindow::new(
                ctx.concurrency * ORDER_WINDOW_PER_WORKER,
            ))),
            EntryOrder::Arrival => None,
        };

        let mut writer =
            DocumentWriter::new(output, ctx.format, &self.title()).with_policy(ctx.skip_policy);
        writer = match &window {
            Some(window) => writer.with_reorder(ReorderBuffer::with_window(Arc::clone(window))),
            None => writer.with_order(ctx.order),
        };
        if let Some(observer) = observer {
            writer = writer.with_observer(observer);
        }

        let (write_tx, write_rx) = bounded::<WriteRequest>(ctx.concurrency * 2);
        let writer_handle = spawn_writer(writer, write_rx)?;

        let (path_tx, path_rx, queue_stats) = path_queue(ctx.concurrency);
        let mut workers = Vec::with_capacity(ctx.concurrency);
        let mut spawn_error = None;
        for id in 0..ctx.concurrency {
            match Worker::spawn(
                id,
                Arc::clone(ctx),
                Arc::clone(&self.filter),
                path_rx.clone(),
                write_tx.clone(),
                window.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }
        // Only the workers hold these now, so closure propagates
        drop(path_rx);
        drop(write_tx);

        let mut dispatched = 0usize;
        let mut dispatch_cancelled = false;
        if spawn_error.is_none() {
            for task in paths.by_ref() {
                let outcome = match &window {
                    Some(window) => path_tx.send_in_window(task, &ctx.cancel, window),
                    None => path_tx.send_cancellable(task, &ctx.cancel),
                };
                match outcome {
                    SendOutcome::Sent => dispatched += 1,
                    SendOutcome::Cancelled => {
                        debug!(dispatched, "dispatch cancelled");
                        dispatch_cancelled = true;
                        break;
                    }
                    SendOutcome::Closed => {
                        // Writer stopped; its error surfaces on join
                        debug!(dispatched, "path queue closed early");
                        break;
                    }
                }
            }
        }
        let collection = start.elapsed();
        let skipped_dirs = paths.skipped_dirs();
        let collected = paths.collected();
        drop(path_tx);

        let mut worker_error = None;
        for worker in workers {
            let id = worker.id();
            match worker.join() {
                Ok(stats) => debug!(
                    worker = id,
                    files = stats.files_read(),
                    skipped = stats.skipped(),
                    "worker joined"
                ),
                Err(e) => {
                    warn!(worker = id, "worker panicked");
                    worker_error.get_or_insert(e);
                }
            }
        }

        let writer_result = writer_handle
            .join()
            .map_err(|_| PackError::WriterPanicked)
            .and_then(|r| r);

        if let Some(e) = spawn_error {
            return Err(e);
        }
        let finished = writer_result?;
        if let Some(e) = worker_error {
            return Err(e);
        }

        let written = finished.ledger.len();
        if dispatch_cancelled || (ctx.cancel.is_cancelled() && written < dispatched) {
            info!(dispatched, written, "run cancelled");
            return Err(PackError::Cancelled {
                dispatched,
                written,
            });
        }

        let Finished {
            output,
            stats,
            ledger,
            reorder_peak,
        } = finished;
        let timings = RunTimings {
            started_at,
            collection,
            total: start.elapsed(),
        };

        if let Some(window) = &window {
            debug!(
                reorder_peak,
                window = window.width(),
                window_waits = queue_stats.window_wait_count(),
                "collection order restored"
            );
        }
        info!(
            files = ledger.len(),
            skipped = ledger.skipped(),
            elapsed_ms = timings.total.as_millis() as u64,
            "run complete"
        );
        if skipped_dirs > 0 {
            warn!(skipped_dirs, "some entries could not be traversed");
        }

        Ok(RunOutcome {
            output,
            stats,
            ledger,
            timings,
            dispatched,
            collected,
            skipped_dirs,
            backpressure_events: queue_stats.backpressure_count(),
            reorder_peak,
        })
    }
}

fn spawn_writer<W: Write + Send + 'static>(
    mut writer: DocumentWriter<W>,
    requests: crossbeam_channel::Receiver<WriteRequest>,
) -> Result<JoinHandle<Result<Finished<W>>>> {
    thread::Builder::new()
        .name("treepack-writer".to_string())
        .spawn(move || {
            writer.begin()?;
            for request in requests.iter() {
                writer.write_entry(request)?;
            }
            writer.finish()
        })
        .map_err(|e| PackError::Spawn {
            role: "writer",
            source: e,
        })
}
