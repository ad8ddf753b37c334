//! LIFO backlog of tile requests waiting for a drain chain.
//!
//! Newest entries are popped first, so when capacity frees up the tile the
//! viewport asked for most recently is the one rendered. Older entries are
//! never cancelled; they stay buried until the stack drains down to them.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::coord::{PlaneRegion, TileIndex};

/// A request waiting in the backlog.
///
/// Created at push time and consumed at pop time; it has no cancellation
/// hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRequest {
    pub index: TileIndex,
    pub region: PlaneRegion,
}

/// Concurrency-safe LIFO stack of pending requests.
///
/// Push and pop hold a short critical section; [`is_empty_hint`]
/// is lock-free.
///
/// [`is_empty_hint`]: BacklogStack::is_empty_hint
#[derive(Debug, Default)]
pub struct BacklogStack {
    entries: Mutex<Vec<PendingRequest>>,
    /// Mirrors `entries.len()`, updated inside the lock.
    len: AtomicUsize,
}

impl BacklogStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request on top of the stack.
    pub fn push(&self, request: PendingRequest) {
        let mut entries = self.entries.lock();
        entries.push(request);
        self.len.store(entries.len(), Ordering::SeqCst);
    }

    /// Removes and returns the most recently pushed request.
    pub fn try_pop(&self) -> Option<PendingRequest> {
        let mut entries = self.entries.lock();
        let request = entries.pop();
        self.len.store(entries.len(), Ordering::SeqCst);
        request
    }

    /// Momentary emptiness check.
    ///
    /// The answer can be stale by the time the caller acts on it; it is a
    /// hint for choosing a fast path, not a basis for mutual exclusion.
    pub fn is_empty_hint(&self) -> bool {
        self.len.load(Ordering::SeqCst) == 0
    }

    /// Number of waiting requests at the moment of the call.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Same as [`is_empty_hint`](Self::is_empty_hint).
    pub fn is_empty(&self) -> bool {
        self.is_empty_hint()
    }
}
