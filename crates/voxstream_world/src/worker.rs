//! # Worker Pool
//!
//! Fixed set of named background threads draining the request queue. A
//! worker sleeps on the queue while it is empty and exits once the queue is
//! closed. Work already taken is finished; queued work is dropped by the
//! close.
//!
//! A panic while handling one request is caught, logged and counted. The
//! worker then moves on to the next request.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::{WorldError, WorldResult};
use crate::queue::Request;
use crate::world::WorldShared;

/// Handles of the running worker threads.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `count` workers on `shared`.
    ///
    /// If any thread fails to spawn, the queue is closed, the threads
    /// already started are joined and the error is returned.
    pub(crate) fn spawn(count: usize, shared: &Arc<WorldShared>) -> WorldResult<Self> {
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let worker_shared = Arc::clone(shared);
            let spawned = thread::Builder::new()
                .name(format!("voxstream-worker-{id}"))
                .spawn(move || worker_loop(id, &worker_shared));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = id, error = %e, "failed to spawn worker");
                    shared.queue.close();
                    Self { handles }.join();
                    return Err(WorldError::Spawn(e));
                }
            }
        }

        Ok(Self { handles })
    }

    /// Number of threads in the pool.
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to exit. The queue must already be closed.
    ///
    /// Returns the number of threads joined.
    pub(crate) fn join(self) -> usize {
        let count = self.handles.len();
        for handle in self.handles {
            if handle.join().is_err() {
                error!("worker thread died outside request handling");
            }
        }
        count
    }
}

fn worker_loop(id: usize, shared: &WorldShared) {
    debug!(worker = id, "worker started");
    let mut handled: u64 = 0;

    while let Some(request) = shared.queue.pop() {
        run_request(shared, &request);
        handled += 1;
    }

    debug!(worker = id, handled, "worker stopped");
}

/// Handles one request with panic isolation, then marks it finished.
pub(crate) fn run_request(shared: &WorldShared, request: &Request) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.handle(request)));
    shared.queue.finish(request);

    if let Err(payload) = outcome {
        shared.stats.worker_panics.fetch_add(1, Ordering::Relaxed);
        error!(
            coord = %request.coord(),
            panic = panic_message(payload.as_ref()),
            "request handler panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
