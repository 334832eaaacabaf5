//! The single worker thread that serialises deferred command phases.
//!
//! Every deferred handler in the process runs on one thread, in the order the
//! jobs were scheduled. That single queue is what gives clients a global total
//! order over state mutations without any per-command locking discipline.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{error, warn};

use crate::dispatch::{Args, Context, DeferredFn};

/// Tracing target for worker activity.
pub(crate) const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

/// One queued deferred phase: the handler plus the request's argument tail.
pub(crate) struct Job {
    deferred: DeferredFn,
    input: String,
    context: Context,
}

impl Job {
    pub(crate) fn new(deferred: DeferredFn, input: String, context: Context) -> Self {
        Self {
            deferred,
            input,
            context,
        }
    }

    fn run(self) {
        let Self {
            deferred,
            input,
            context,
        } = self;
        let mut args = Args::new(&input);
        if let Err(error) = deferred(&mut args, context) {
            warn!(target: WORKER_TARGET, error = %error, "deferred command failed");
        }
    }
}

#[derive(Default)]
struct WorkerState {
    queue: Vec<Job>,
    busy: bool,
    closing: bool,
}

/// Serialisation queue executed by a dedicated thread.
///
/// Jobs are swapped out in batches: the thread takes the whole pending queue
/// under the lock, marks itself busy, and runs the batch without holding the
/// lock. [`Worker::drain_and_wait_idle`] waits for both the queue to empty and
/// the busy flag to clear, which is the rendezvous the synchronous step and
/// reset paths rely on.
pub(crate) struct Worker {
    state: Mutex<WorkerState>,
    has_work: Condvar,
    idle: Condvar,
}

impl Worker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WorkerState::default()),
            has_work: Condvar::new(),
            idle: Condvar::new(),
        })
    }

    /// Starts the worker thread.
    pub(crate) fn spawn(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let worker = Arc::clone(self);
        thread::spawn(move || worker.run_loop())
    }

    fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a job for execution.
    pub(crate) fn schedule(&self, job: Job) {
        let mut state = self.lock();
        if state.closing {
            return;
        }
        state.queue.push(job);
        self.has_work.notify_one();
    }

    /// Blocks until every job scheduled so far has finished, or until the
    /// worker is shut down.
    pub(crate) fn drain_and_wait_idle(&self) {
        let mut state = self.lock();
        while !state.closing && (!state.queue.is_empty() || state.busy) {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Discards pending jobs and waits for any in-flight batch to finish.
    ///
    /// Returns immediately once the worker is shutting down.
    pub(crate) fn reset(&self) {
        let mut state = self.lock();
        state.queue.clear();
        while state.busy && !state.closing {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Asks the worker thread to exit. Pending jobs are discarded and every
    /// blocked drain or reset caller is woken.
    pub(crate) fn shutdown(&self) {
        let mut state = self.lock();
        state.closing = true;
        state.queue.clear();
        self.has_work.notify_all();
        self.idle.notify_all();
    }

    fn run_loop(&self) {
        loop {
            let batch = {
                let mut state = self.lock();
                while state.queue.is_empty() && !state.closing {
                    state = self
                        .has_work
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if state.closing {
                    self.idle.notify_all();
                    return;
                }
                state.busy = true;
                std::mem::take(&mut state.queue)
            };
            for job in batch {
                if catch_unwind(AssertUnwindSafe(move || job.run())).is_err() {
                    error!(target: WORKER_TARGET, "deferred command panicked");
                }
            }
            let mut state = self.lock();
            state.busy = false;
            self.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn job(work: impl Fn(&mut Args<'_>, Context) -> Result<(), crate::dispatch::CommandError>
        + Send
        + Sync
        + 'static) -> Job {
        Job::new(Arc::new(work), String::new(), None)
    }

    #[test]
    fn jobs_run_in_scheduling_order() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..20 {
            let log = Arc::clone(&log);
            worker.schedule(job(move |_, _| {
                log.lock().expect("log lock").push(index);
                Ok(())
            }));
        }
        worker.drain_and_wait_idle();

        let observed = log.lock().expect("log lock").clone();
        assert_eq!(observed, (0..20).collect::<Vec<_>>());
        worker.shutdown();
        thread.join().expect("worker thread");
    }

    #[test]
    fn jobs_never_overlap() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        for _ in 0..50 {
            let running = Arc::clone(&running);
            let overlapped = Arc::clone(&overlapped);
            worker.schedule(job(move |_, _| {
                if running.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_micros(100));
                running.store(false, Ordering::SeqCst);
                Ok(())
            }));
        }
        worker.drain_and_wait_idle();

        assert!(!overlapped.load(Ordering::SeqCst));
        worker.shutdown();
        thread.join().expect("worker thread");
    }

    #[test]
    fn reset_discards_pending_jobs() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let ran_pending = Arc::new(AtomicBool::new(false));

        worker.schedule(job(move |_, _| {
            // Hold the worker busy until the test releases it.
            let _ = gate.lock().expect("gate lock").recv_timeout(Duration::from_secs(2));
            Ok(())
        }));
        // Give the blocking job time to be picked up before queueing more.
        std::thread::sleep(Duration::from_millis(50));
        {
            let ran_pending = Arc::clone(&ran_pending);
            worker.schedule(job(move |_, _| {
                ran_pending.store(true, Ordering::SeqCst);
                Ok(())
            }));
        }

        // Release the in-flight job only once reset is already waiting, so the
        // pending job has been discarded before the worker looks for more work.
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let _ = release.send(());
        });
        worker.reset();
        releaser.join().expect("releaser thread");
        worker.drain_and_wait_idle();
        assert!(!ran_pending.load(Ordering::SeqCst));

        worker.shutdown();
        thread.join().expect("worker thread");
    }

    #[test]
    fn drain_unblocks_at_shutdown() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);

        worker.schedule(job(move |_, _| {
            // Hold the worker busy until the test releases it.
            let _ = gate.lock().expect("gate lock").recv_timeout(Duration::from_secs(2));
            Ok(())
        }));
        std::thread::sleep(Duration::from_millis(50));

        let waiter = {
            let worker = Arc::clone(&worker);
            std::thread::spawn(move || worker.drain_and_wait_idle())
        };
        std::thread::sleep(Duration::from_millis(50));

        // The job is still blocked; shutdown must wake the drain caller.
        worker.shutdown();
        waiter.join().expect("drain thread");
        // Reset after shutdown must not wait on the in-flight batch either.
        worker.reset();

        release.send(()).expect("release worker");
        thread.join().expect("worker thread");
    }

    #[test]
    fn concurrent_schedulers_observe_one_total_order() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let log = Arc::new(Mutex::new(Vec::new()));

        let schedulers: Vec<_> = (0..2)
            .map(|client| {
                let worker = Arc::clone(&worker);
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for index in 0..10 {
                        let log = Arc::clone(&log);
                        worker.schedule(job(move |_, _| {
                            log.lock().expect("log lock").push((client, index));
                            Ok(())
                        }));
                    }
                })
            })
            .collect();
        for scheduler in schedulers {
            scheduler.join().expect("scheduler thread");
        }
        worker.drain_and_wait_idle();

        // One total order: every job ran exactly once, and each client's jobs
        // appear as a subsequence in the order that client enqueued them.
        let observed = log.lock().expect("log lock").clone();
        assert_eq!(observed.len(), 20);
        for client in 0..2 {
            let per_client: Vec<_> = observed
                .iter()
                .filter(|(owner, _)| *owner == client)
                .map(|(_, index)| *index)
                .collect();
            assert_eq!(per_client, (0..10).collect::<Vec<_>>());
        }

        worker.shutdown();
        thread.join().expect("worker thread");
    }

    #[test]
    fn panicking_job_does_not_kill_the_worker() {
        let worker = Worker::new();
        let thread = worker.spawn();
        let survived = Arc::new(AtomicBool::new(false));

        worker.schedule(job(|_, _| panic!("boom")));
        {
            let survived = Arc::clone(&survived);
            worker.schedule(job(move |_, _| {
                survived.store(true, Ordering::SeqCst);
                Ok(())
            }));
        }
        worker.drain_and_wait_idle();

        assert!(survived.load(Ordering::SeqCst));
        worker.shutdown();
        thread.join().expect("worker thread");
    }
}
