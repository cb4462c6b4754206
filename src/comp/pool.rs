//! Process-wide worker pool for CPU-bound tasks.
//!
//! Fixed OS threads drain a [`PriorityQueue`] of boxed jobs; results travel
//! back over `tokio` oneshot channels so async handlers can await them.
//! Removing a queued job drops its sender, which the awaiting side observes
//! as cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

use super::queue::PriorityQueue;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<PriorityQueue<Job>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// Priority work pool with id-based cancellation.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..threads)
            .map(|n| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("worker-{n}"))
                    .spawn(move || worker_loop(shared))
                    .expect("worker thread spawn")
            })
            .collect();

        Self { shared, workers }
    }

    /// Submit a job tagged `(id, priority)` and return a receiver for its
    /// result. The receiver resolves with an error if the job is removed
    /// before a worker runs it.
    pub fn submit<T, F>(&self, id: u64, priority: i32, f: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The receiver may be gone if the session died mid-flight
            let _ = tx.send(f());
        });
        self.shared.queue.lock().push(id, priority, job);
        self.shared.available.notify_one();
        rx
    }

    /// Withdraw all queued jobs tagged with `id`.
    pub fn remove_by_id(&self, id: u64) {
        self.shared.queue.lock().remove_id(id);
    }

    /// Withdraw all queued jobs at `priority`.
    pub fn remove_by_priority(&self, priority: i32) {
        self.shared.queue.lock().remove_priority(priority);
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool stopped");
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(job) = queue.pop() {
                    break job;
                }
                shared.available.wait(&mut queue);
            }
        };
        job();
    }
}
