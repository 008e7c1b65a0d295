//! # Request Queue
//!
//! Bounded FIFO of background work shared by the render thread and the
//! workers. Enqueue never blocks: a full queue rejects the request and the
//! caller retries on a later frame.
//!
//! Duplicates are dropped at enqueue time:
//! - `NewChunk` is keyed by coordinate, and also counts as pending while a
//!   worker is still resolving it.
//! - `UpdateChunk` is keyed by chunk identity and only dedupes against
//!   queued entries, so a chunk re-dirtied mid-update gets another pass.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use voxstream_procedural::ChunkCoord;

use crate::chunk::ChunkRef;
use crate::error::QueueError;

/// A unit of background work.
#[derive(Clone, Debug)]
pub enum Request {
    /// Resolve the chunk at a coordinate into the cache.
    NewChunk(ChunkCoord),
    /// Re-run the visibility pass on a resolved chunk and persist it.
    UpdateChunk(ChunkRef),
}

impl Request {
    /// Coordinate the request is about.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        match self {
            Self::NewChunk(coord) => *coord,
            Self::UpdateChunk(chunk) => chunk.coord(),
        }
    }

    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NewChunk(a), Self::NewChunk(b)) => a == b,
            (Self::UpdateChunk(a), Self::UpdateChunk(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Outcome of a successful enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// Added to the back of the queue.
    Queued,
    /// An equal request was already pending; nothing added.
    AlreadyPending,
}

struct QueueState {
    entries: VecDeque<Request>,
    /// `NewChunk` coordinates taken by a worker and not yet finished.
    in_flight: HashSet<ChunkCoord>,
    closed: bool,
}

/// Bounded, deduplicating request queue.
pub struct RequestQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    capacity: usize,
}

impl RequestQueue {
    /// Creates an empty queue. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::with_capacity(capacity),
                in_flight: HashSet::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Adds a request unless an equal one is already pending.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] at capacity, [`QueueError::Closed`] after
    /// [`close`](Self::close).
    pub fn push(&self, request: Request) -> Result<Enqueued, QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        let pending = matches!(&request, Request::NewChunk(coord) if state.in_flight.contains(coord))
            || state.entries.iter().any(|queued| queued.same_as(&request));
        if pending {
            return Ok(Enqueued::AlreadyPending);
        }

        if state.entries.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }

        state.entries.push_back(request);
        self.not_empty.notify_one();
        Ok(Enqueued::Queued)
    }

    /// Takes the oldest request, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is closed. The caller must pass the
    /// request to [`finish`](Self::finish) when done with it.
    pub fn pop(&self) -> Option<Request> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(request) = Self::take_front(&mut state) {
                return Some(request);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Takes the oldest request without waiting.
    pub fn try_pop(&self) -> Option<Request> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        Self::take_front(&mut state)
    }

    /// Marks a popped request as done.
    pub fn finish(&self, request: &Request) {
        if let Request::NewChunk(coord) = request {
            self.state.lock().in_flight.remove(coord);
        }
    }

    /// Stops accepting work, discards what is queued and wakes every
    /// blocked [`pop`](Self::pop).
    ///
    /// Returns the number of discarded requests.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let discarded = state.entries.len();
        state.entries.clear();
        self.not_empty.notify_all();
        discarded
    }

    /// True after [`close`](Self::close).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Queued requests, excluding in-flight ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Maximum queued requests.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn take_front(state: &mut QueueState) -> Option<Request> {
        let request = state.entries.pop_front()?;
        if let Request::NewChunk(coord) = &request {
            state.in_flight.insert(*coord);
        }
        Some(request)
    }
}
