//! Worker pool for per-TU analysis jobs.
//!
//! A fixed set of OS threads drains a shared FIFO queue. Dispatch is a
//! mutex-protected queue plus a condition variable; sleeping workers are
//! additionally woken on a one-second timeout, which closes the lost-wakeup
//! window between observing an empty queue and entering the wait.
//!
//! A thread count of one (without forced asynchrony) degenerates to running
//! each job synchronously on the caller's thread.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Defensive wake interval for idle workers.
const WAKE_INTERVAL: Duration = Duration::from_secs(1);

/// A queue of jobs executed by some pool of workers.
pub trait JobQueue<J>: Send {
    /// Hand a job to the pool. Execution may start (or even finish) before
    /// this returns.
    fn enqueue(&self, job: J);

    /// Stop accepting the idle wait: workers drain the remaining queue, then
    /// exit, and the calling thread blocks until all of them are joined.
    /// Call exactly once per pool.
    fn wait(&mut self);
}

/// Synchronous single-thread queue: `enqueue` runs the job immediately on
/// the caller's thread and `wait` has nothing to do.
pub struct SingleThreadQueue<J, F> {
    run: F,
    _job: PhantomData<fn(J)>,
}

impl<J, F: Fn(J)> SingleThreadQueue<J, F> {
    pub fn new(run: F) -> Self {
        Self {
            run,
            _job: PhantomData,
        }
    }
}

impl<J, F> JobQueue<J> for SingleThreadQueue<J, F>
where
    F: Fn(J) + Send,
{
    fn enqueue(&self, job: J) {
        (self.run)(job);
    }

    fn wait(&mut self) {}
}

struct Shared<J> {
    queue: Mutex<VecDeque<J>>,
    signal: Condvar,
    die: AtomicBool,
}

/// The multi-threaded pool.
pub struct WorkerPool<J: Send + 'static> {
    shared: Arc<Shared<J>>,
    workers: Vec<JoinHandle<()>>,
    waited: bool,
}

impl<J: Send + 'static> WorkerPool<J> {
    pub fn new<F>(thread_count: usize, run: F) -> Self
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
            die: AtomicBool::new(false),
        });
        let run = Arc::new(run);

        let workers = (0..thread_count)
            .map(|_| {
                let shared = shared.clone();
                let run = run.clone();
                thread::spawn(move || worker_loop(&shared, run.as_ref()))
            })
            .collect();

        Self {
            shared,
            workers,
            waited: false,
        }
    }
}

fn worker_loop<J, F: Fn(J)>(shared: &Shared<J>, run: &F) {
    loop {
        let mut queue = shared.queue.lock().unwrap();
        if queue.is_empty() {
            if shared.die.load(Ordering::SeqCst) {
                return;
            }
            // Wait for work, but wake on a timeout too: an enqueue may have
            // signalled while nobody was waiting yet.
            let (guard, _) = shared
                .signal
                .wait_timeout_while(queue, WAKE_INTERVAL, |q| {
                    q.is_empty() && !shared.die.load(Ordering::SeqCst)
                })
                .unwrap();
            drop(guard);
            // Pass the signal on; the next cycle takes the work if nobody
            // snatches it first.
            shared.signal.notify_one();
            continue;
        }

        let Some(job) = queue.pop_front() else {
            continue;
        };
        // Out of the critical section before doing actual work.
        drop(queue);
        shared.signal.notify_one();

        run(job);
    }
}

impl<J: Send + 'static> JobQueue<J> for WorkerPool<J> {
    fn enqueue(&self, job: J) {
        self.shared.queue.lock().unwrap().push_back(job);
        self.shared.signal.notify_one();
    }

    fn wait(&mut self) {
        self.shared.die.store(true, Ordering::SeqCst);
        self.shared.signal.notify_all();

        for worker in self.workers.drain(..) {
            // Keep nudging so a stalled wait cannot hold up the join.
            self.shared.signal.notify_all();
            let _ = worker.join();
        }
        self.waited = true;
    }
}

impl<J: Send + 'static> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        if !self.waited {
            self.wait();
        }
    }
}

/// Build a job queue for `thread_count` workers. One thread gets the
/// synchronous queue unless `force_async` demands a real worker thread.
pub fn make_thread_pool<J, F>(thread_count: usize, run: F, force_async: bool) -> Box<dyn JobQueue<J>>
where
    J: Send + 'static,
    F: Fn(J) + Send + Sync + 'static,
{
    if thread_count == 1 && !force_async {
        Box::new(SingleThreadQueue::new(run))
    } else {
        Box::new(WorkerPool::new(thread_count, run))
    }
}
