//! Restores collection order for requests that arrive out of order

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::pipeline::OrderWindow;

use super::WriteRequest;

/// Holds requests whose predecessors have not arrived yet.
///
/// On its own the buffer grows with how far workers run ahead of the slowest
/// file. Attached to an [`OrderWindow`] it publishes every advance, and the
/// dispatcher never lets more than `width - 1` requests wait here.
/// Dropping the buffer closes the window.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: usize,
    pending: BTreeMap<usize, WriteRequest>,
    peak: usize,
    window: Option<Arc<OrderWindow>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that reports its progress to `window`.
    pub fn with_window(window: Arc<OrderWindow>) -> Self {
        let mut buffer = Self::default();
        buffer.window = Some(window);
        buffer
    }

    /// Accept a request and return every request that is now in sequence.
    pub fn push(&mut self, request: WriteRequest) -> Vec<WriteRequest> {
        if request.index < self.next {
            // Duplicate or stale index; pass it through rather than lose it
            return vec![request];
        }
        self.pending.insert(request.index, request);

        let mut ready = Vec::new();
        while let Some(request) = self.pending.remove(&self.next) {
            ready.push(request);
            self.next += 1;
        }
        self.peak = self.peak.max(self.pending.len());
        if !ready.is_empty() {
            if let Some(window) = &self.window {
                window.advance(self.next);
            }
        }
        ready
    }

    /// Requests still waiting on a gap
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Most requests ever left waiting after a push
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Release whatever is left, in index order, skipping over gaps.
    pub fn drain(mut self) -> impl Iterator<Item = WriteRequest> {
        std::mem::take(&mut self.pending).into_values()
    }
}

impl Drop for ReorderBuffer {
    fn drop(&mut self) {
        if let Some(window) = &self.window {
            window.close();
        }
    }
}
