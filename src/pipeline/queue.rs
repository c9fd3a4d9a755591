//! Bounded path queue with backpressure
//!
//! The dispatcher is the single producer and the workers are the consumers.
//! Capacity equals the worker count, so at most `concurrency` paths wait at
//! any time. A full queue blocks the dispatcher, which keeps polling the
//! cancellation token while it waits.
//!
//! Under collection ordering an [`OrderWindow`] also holds the dispatcher back
//! while the task index is too far ahead of the last entry the writer emitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};

use crate::collect::FileTask;

use super::cancel::CancelToken;

/// How long a blocked send waits before re-checking cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Statistics for the path queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Number of sends that found the queue full
    pub backpressure_events: AtomicU64,

    /// Number of sends held back by the order window
    pub window_waits: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    pub fn window_wait_count(&self) -> u64 {
        self.window_waits.load(Ordering::Relaxed)
    }
}

/// How far dispatch may run ahead of the writer when entries are emitted in
/// collection order.
///
/// The writer publishes the next index it is waiting for. Task `i` is only
/// dispatched once `i < next_emitted + width`, so every index held in the
/// reorder buffer lies inside that range and the buffer never holds more than
/// `width - 1` entries.
#[derive(Debug)]
pub struct OrderWindow {
    width: usize,
    state: Mutex<WindowState>,
    advanced: Condvar,
}

#[derive(Debug, Default)]
struct WindowState {
    next_emitted: usize,
    closed: bool,
}

enum WindowWait {
    Admitted,
    Cancelled,
}

impl OrderWindow {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            state: Mutex::new(WindowState::default()),
            advanced: Condvar::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Record that every index below `next` has been emitted.
    pub fn advance(&self, next: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if next > state.next_emitted {
            state.next_emitted = next;
            self.advanced.notify_all();
        }
    }

    /// Stop holding back dispatch. Called when the writer or a worker goes
    /// away and the window can no longer advance.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        self.advanced.notify_all();
    }

    fn admits(&self, state: &WindowState, index: usize) -> bool {
        state.closed || index < state.next_emitted.saturating_add(self.width)
    }

    /// Block until `index` fits the window. Returns the wait outcome and
    /// whether the caller had to wait at all.
    fn wait_for(&self, index: usize, cancel: &CancelToken) -> (WindowWait, bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut waited = false;

        while !self.admits(&state, index) {
            if cancel.is_cancelled() {
                return (WindowWait::Cancelled, waited);
            }
            waited = true;
            state = self
                .advanced
                .wait_timeout(state, CANCEL_POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        (WindowWait::Admitted, waited)
    }
}

/// Result of a cancellable send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Cancellation was observed before the task could be queued
    Cancelled,
    /// Every worker has gone away
    Closed,
}

/// Producer half of the path queue. Dropping it closes the queue.
pub struct PathSender {
    sender: Sender<FileTask>,
    stats: Arc<QueueStats>,
}

/// Create a bounded path queue.
pub fn path_queue(capacity: usize) -> (PathSender, Receiver<FileTask>, Arc<QueueStats>) {
    let (sender, receiver) = bounded(capacity.max(1));
    let stats = Arc::new(QueueStats::default());
    let tx = PathSender {
        sender,
        stats: Arc::clone(&stats),
    };
    (tx, receiver, stats)
}

impl PathSender {
    /// Send a task, blocking while the queue is full and giving up if the
    /// token is cancelled in the meantime.
    pub fn send_cancellable(&self, task: FileTask, cancel: &CancelToken) -> SendOutcome {
        let mut task = task;
        let mut blocked = false;

        loop {
            if cancel.is_cancelled() {
                return SendOutcome::Cancelled;
            }

            match self.sender.send_timeout(task, CANCEL_POLL_INTERVAL) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return SendOutcome::Sent;
                }
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !blocked {
                        self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                        blocked = true;
                    }
                    task = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return SendOutcome::Closed,
            }
        }
    }

    /// Like [`send_cancellable`](Self::send_cancellable), but first waits
    /// until the task index fits the order window.
    pub fn send_in_window(
        &self,
        task: FileTask,
        cancel: &CancelToken,
        window: &OrderWindow,
    ) -> SendOutcome {
        let (wait, waited) = window.wait_for(task.index, cancel);
        if waited {
            self.stats.window_waits.fetch_add(1, Ordering::Relaxed);
        }
        match wait {
            WindowWait::Admitted => self.send_cancellable(task, cancel),
            WindowWait::Cancelled => SendOutcome::Cancelled,
        }
    }
}
