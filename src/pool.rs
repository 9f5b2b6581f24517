//! A fixed-size worker pool that executes batches of tasks with a barrier.
//!
//! This is the Rust-native equivalent of the original C `thread_control`:
//! a fixed set of threads spawned once, parked on a condvar between
//! phases, never torn down until the pool itself is dropped. The
//! single-slot, three-condvar hand-off of the original is replaced by a
//! queue guarded by one mutex and two condvars (one for "work available",
//! one for "batch complete") — the barrier contract is identical:
//! [`WorkerPool::submit`] blocks the caller until every task in the batch
//! has run.
//!
//! Tasks are opaque `FnOnce` closures rather than `(fn, *void, *void)`
//! triples, so phases don't need a tagged dispatch on a "phase kind" —
//! each closure already carries everything it needs (typically an `Arc`
//! clone of shared state plus a partition index).

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

/// A unit of work submitted to the pool. Must be `'static` because the
/// pool's worker threads outlive any single `submit` call.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Hard cap on auto-detected thread count, matching `world.c`'s `MAXTHREADS`.
pub const MAX_AUTO_THREADS: usize = 16;

/// Resolves the `-j` flag's contract: `0` auto-detects the online CPU
/// count (capped at [`MAX_AUTO_THREADS`]), anything else is used as-is
/// (also capped, since `init_world` clamps an explicit count above
/// `MAXTHREADS` the same way it clamps the auto-detected one).
pub fn resolve_thread_count(requested: usize) -> usize {
    let nthreads = if requested == 0 { num_cpus::get() } else { requested };
    nthreads.min(MAX_AUTO_THREADS).max(1)
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    work_available: Condvar,
    pending: Mutex<usize>,
    work_done: Condvar,
    shutdown: Mutex<bool>,
}

/// A fixed set of worker threads that run batches of tasks submitted via
/// [`WorkerPool::submit`]. The pool is a plain value: construct one,
/// pass it by reference to every phase, and it is joined and torn down
/// when dropped.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `nthreads` worker threads. `nthreads` must be at least 1.
    pub fn new(nthreads: usize) -> Self {
        assert!(nthreads >= 1, "worker pool needs at least one thread");
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            pending: Mutex::new(0),
            work_done: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        let workers = (0..nthreads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        WorkerPool { shared, workers }
    }

    /// Hands the whole batch of tasks to the pool and blocks until every
    /// one of them has completed. Tasks may run in any order and on any
    /// thread; the only guarantee is that `submit` does not return until
    /// all of them have (this is the phase barrier).
    pub fn submit(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }

        *self.shared.pending.lock() = tasks.len();
        {
            let mut queue = self.shared.queue.lock();
            queue.extend(tasks);
        }
        self.shared.work_available.notify_all();

        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.work_done.wait(&mut pending);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        *self.shared.shutdown.lock() = true;
        self.shared.work_available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                if *shared.shutdown.lock() {
                    return;
                }
                shared.work_available.wait(&mut queue);
            }
        };

        task();

        let mut pending = shared.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            shared.work_done.notify_all();
        }
    }
}
