//! Bounded worker pool with delayed resubmission.
//!
//! A fixed set of worker threads executes tasks from a shared ready queue.
//! Admission is capped on *outstanding* tasks (queued, running, or waiting
//! for a scheduled retry): [`WorkerPool::submit`] blocks on a [`Semaphore`]
//! until a permit is free, so the feeder never buffers unboundedly.
//!
//! A task that asks to be retried keeps its permit and is parked in a
//! timer heap until its delay elapses; a dedicated timer thread then moves it
//! back to the ready queue. Workers never sleep on behalf of a retry.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::semaphore::Semaphore;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 16;

/// Default cap on outstanding tasks
pub const DEFAULT_MAX_SUBMITTED: usize = 100_000;

/// Result of running a task once
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// Terminal: success or final failure
    Done,
    /// Run this task again after `delay`
    Retry { task: T, delay: Duration },
}

/// Worker pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Thread name prefix
    pub name: String,
    /// Number of worker threads (max concurrently running tasks)
    pub workers: usize,
    /// Max outstanding tasks (queued + running + awaiting retry)
    pub max_submitted: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            workers: DEFAULT_WORKERS,
            max_submitted: DEFAULT_MAX_SUBMITTED,
        }
    }
}

/// Point-in-time view of pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub max_outstanding: usize,
    /// Tasks currently executing
    pub active: usize,
    /// Tasks admitted but not yet terminal
    pub outstanding: usize,
    /// Tasks that reached a terminal state
    pub completed: u64,
    /// Retries scheduled so far
    pub retries: u64,
    /// Tasks dropped because the handler panicked
    pub panicked: u64,
}

impl PoolStats {
    /// Outstanding count has reached the admission cap
    pub fn is_saturated(&self) -> bool {
        self.outstanding >= self.max_outstanding
    }
}

/// Counters shared with read-only observers
#[derive(Debug)]
struct PoolState {
    workers: usize,
    admission: Semaphore,
    active: AtomicUsize,
    completed: AtomicU64,
    retries: AtomicU64,
    panicked: AtomicU64,
}

impl PoolState {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            max_outstanding: self.admission.capacity(),
            active: self.active.load(Ordering::Relaxed).min(self.workers),
            outstanding: self.admission.in_use(),
            completed: self.completed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    fn finish_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.admission.release(1);
    }
}

/// Cheap cloneable handle for sampling pool occupancy from another thread
#[derive(Debug, Clone)]
pub struct PoolProbe {
    state: Arc<PoolState>,
}

impl PoolProbe {
    pub fn snapshot(&self) -> PoolStats {
        self.state.snapshot()
    }
}

/// Task parked until `due`
struct Delayed<T> {
    due: Instant,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Delayed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Delayed<T> {}

impl<T> PartialOrd for Delayed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Delayed<T> {
    // Reversed: BinaryHeap is a max-heap, we want the earliest deadline on top
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

struct Queue<T> {
    ready: VecDeque<T>,
    delayed: BinaryHeap<Delayed<T>>,
    next_seq: u64,
    stopping: bool,
}

impl<T> Queue<T> {
    fn pop_due(&mut self, now: Instant) -> Option<T> {
        if self.delayed.peek()?.due <= now {
            self.delayed.pop().map(|d| d.task)
        } else {
            None
        }
    }
}

struct Shared<T> {
    queue: Mutex<Queue<T>>,
    work_ready: Condvar,
    timer_wake: Condvar,
    state: Arc<PoolState>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Queue<T>> {
        self.queue.lock().expect("pool queue poisoned")
    }

    fn push_ready(&self, task: T) {
        self.lock().ready.push_back(task);
        self.work_ready.notify_one();
    }

    fn schedule(&self, task: T, delay: Duration) {
        self.state.retries.fetch_add(1, Ordering::Relaxed);
        if delay.is_zero() {
            self.push_ready(task);
            return;
        }
        let mut q = self.lock();
        let seq = q.next_seq;
        q.next_seq += 1;
        q.delayed.push(Delayed {
            due: Instant::now() + delay,
            seq,
            task,
        });
        drop(q);
        self.timer_wake.notify_one();
    }

    fn stop(&self) {
        self.lock().stopping = true;
        self.work_ready.notify_all();
        self.timer_wake.notify_all();
    }
}

/// Fixed-size pool executing `H` on every admitted task.
pub struct WorkerPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("stats", &self.shared.state.snapshot())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn worker and timer threads.
    pub fn new<H>(config: &PoolConfig, handler: H) -> std::io::Result<Self>
    where
        H: Fn(T) -> TaskOutcome<T> + Send + Sync + 'static,
    {
        let workers = config.workers.max(1);
        let state = Arc::new(PoolState {
            workers,
            admission: Semaphore::new(config.max_submitted.max(1)),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                ready: VecDeque::new(),
                delayed: BinaryHeap::new(),
                next_seq: 0,
                stopping: false,
            }),
            work_ready: Condvar::new(),
            timer_wake: Condvar::new(),
            state,
        });
        let handler = Arc::new(handler);

        let mut pool = Self {
            shared: shared.clone(),
            workers: Vec::with_capacity(workers),
            timer: None,
        };

        for i in 0..workers {
            let shared = shared.clone();
            let handler = handler.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{i}", config.name))
                .spawn(move || worker_loop(&shared, handler.as_ref()))?;
            pool.workers.push(handle);
        }

        let timer_shared = shared;
        pool.timer = Some(
            std::thread::Builder::new()
                .name(format!("{}-timer", config.name))
                .spawn(move || timer_loop(&timer_shared))?,
        );

        log::debug!(
            "{}: {} workers, max {} outstanding tasks",
            config.name,
            workers,
            pool.shared.state.admission.capacity()
        );
        Ok(pool)
    }

    /// Submit a task, blocking while the outstanding cap is reached.
    pub fn submit(&self, task: T) {
        self.shared.state.admission.acquire(1);
        self.shared.push_ready(task);
    }

    /// Submit without blocking; hands the task back if the pool is full.
    pub fn try_submit(&self, task: T) -> Result<(), T> {
        if self.shared.state.admission.try_acquire(1) {
            self.shared.push_ready(task);
            Ok(())
        } else {
            Err(task)
        }
    }

    /// Whether `n` more tasks would be admitted without blocking.
    pub fn can_accept(&self, n: usize) -> bool {
        self.shared.state.admission.available() >= n
    }

    /// Current occupancy.
    pub fn stats(&self) -> PoolStats {
        self.shared.state.snapshot()
    }

    /// Read-only handle for progress sampling.
    pub fn probe(&self) -> PoolProbe {
        PoolProbe {
            state: self.shared.state.clone(),
        }
    }

    /// Stop accepting work, drain every outstanding task (including
    /// scheduled retries), then join all threads.
    pub fn shutdown(mut self) -> PoolStats {
        self.shared.state.admission.wait_idle();
        self.shared.stop();
        self.join_all();
        self.shared.state.snapshot()
    }

    fn join_all(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                log::error!("timer thread panicked");
            }
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if self.workers.is_empty() && self.timer.is_none() {
            return;
        }
        // Dropped without shutdown: abandon queued work, finish running tasks
        {
            let mut q = self.shared.lock();
            let abandoned = q.ready.len() + q.delayed.len();
            if abandoned > 0 {
                log::warn!("worker pool dropped with {abandoned} tasks still queued");
            }
            q.ready.clear();
            q.delayed.clear();
        }
        self.shared.stop();
        self.join_all();
    }
}

fn worker_loop<T, H>(shared: &Shared<T>, handler: &H)
where
    H: Fn(T) -> TaskOutcome<T>,
{
    loop {
        let task = {
            let mut q = shared.lock();
            loop {
                if let Some(task) = q.ready.pop_front() {
                    break task;
                }
                if q.stopping {
                    return;
                }
                q = shared.work_ready.wait(q).expect("pool queue poisoned");
            }
        };

        shared.state.active.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(task)));
        shared.state.active.fetch_sub(1, Ordering::Relaxed);

        match outcome {
            Ok(TaskOutcome::Done) => shared.state.finish_one(),
            Ok(TaskOutcome::Retry { task, delay }) => shared.schedule(task, delay),
            Err(_) => {
                log::error!("task handler panicked, task dropped");
                shared.state.panicked.fetch_add(1, Ordering::Relaxed);
                shared.state.finish_one();
            }
        }
    }
}

fn timer_loop<T>(shared: &Shared<T>) {
    let mut q = shared.lock();
    loop {
        if q.stopping {
            return;
        }
        let now = Instant::now();
        let mut moved = 0usize;
        while let Some(task) = q.pop_due(now) {
            q.ready.push_back(task);
            moved += 1;
        }
        if moved > 0 {
            shared.work_ready.notify_all();
        }
        q = match q.delayed.peek().map(|d| d.due) {
            Some(due) => {
                shared
                    .timer_wake
                    .wait_timeout(q, due.saturating_duration_since(now))
                    .expect("pool queue poisoned")
                    .0
            }
            None => shared.timer_wake.wait(q).expect("pool queue poisoned"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn config(workers: usize, max_submitted: usize) -> PoolConfig {
        PoolConfig {
            name: "test".to_string(),
            workers,
            max_submitted,
        }
    }

    #[test]
    fn runs_every_task_once() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let pool = WorkerPool::new(&config(4, 16), move |_n: u32| {
            seen2.fetch_add(1, Ordering::Relaxed);
            TaskOutcome::Done
        })
        .unwrap();

        for n in 0..100 {
            pool.submit(n);
        }
        let stats = pool.shutdown();

        assert_eq!(seen.load(Ordering::Relaxed), 100);
        assert_eq!(stats.completed, 100);
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.retries, 0);
    }

    #[test]
    fn retries_are_bounded_and_drained() {
        const MAX_RETRIES: u32 = 3;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = attempts.clone();
        let pool = WorkerPool::new(&config(2, 8), move |attempt: u32| {
            attempts2.fetch_add(1, Ordering::Relaxed);
            if attempt < MAX_RETRIES {
                TaskOutcome::Retry {
                    task: attempt + 1,
                    delay: Duration::from_millis(5),
                }
            } else {
                TaskOutcome::Done
            }
        })
        .unwrap();

        for _ in 0..5 {
            pool.submit(0);
        }
        // shutdown must wait for the delayed retries, not only the first attempts
        let stats = pool.shutdown();

        assert_eq!(attempts.load(Ordering::Relaxed), 5 * (MAX_RETRIES as usize + 1));
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.retries, 5 * u64::from(MAX_RETRIES));
    }

    #[test]
    fn feeder_blocks_at_outstanding_cap() {
        let gate = Arc::new(AtomicBool::new(false));
        let gate2 = gate.clone();
        let pool = Arc::new(
            WorkerPool::new(&config(2, 4), move |_n: u32| {
                while !gate2.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(1));
                }
                TaskOutcome::Done
            })
            .unwrap(),
        );
        let probe = pool.probe();

        let feeder_pool = pool.clone();
        let feeder = std::thread::spawn(move || {
            for n in 0..10 {
                feeder_pool.submit(n);
            }
        });

        std::thread::sleep(Duration::from_millis(100));
        let stats = probe.snapshot();
        assert_eq!(stats.outstanding, 4);
        assert!(stats.is_saturated());
        assert_eq!(stats.active, 2);
        assert!(!feeder.is_finished());
        assert!(!pool.can_accept(1));

        gate.store(true, Ordering::Relaxed);
        feeder.join().unwrap();

        let pool = Arc::try_unwrap(pool).expect("feeder released its handle");
        let stats = pool.shutdown();
        assert_eq!(stats.completed, 10);
    }

    #[test]
    fn outstanding_never_exceeds_cap() {
        let max_seen = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(
            WorkerPool::new(&config(3, 5), |_n: u32| {
                std::thread::sleep(Duration::from_millis(1));
                TaskOutcome::Done
            })
            .unwrap(),
        );
        let probe = pool.probe();
        let done = Arc::new(AtomicBool::new(false));

        let sampler = {
            let max_seen = max_seen.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    max_seen.fetch_max(probe.snapshot().outstanding, Ordering::Relaxed);
                    std::thread::yield_now();
                }
            })
        };

        for n in 0..200 {
            pool.submit(n);
        }
        let pool = Arc::try_unwrap(pool).expect("single owner");
        pool.shutdown();
        done.store(true, Ordering::Relaxed);
        sampler.join().unwrap();

        assert!(max_seen.load(Ordering::Relaxed) <= 5);
    }

    #[test]
    fn try_submit_returns_task_when_full() {
        let gate = Arc::new(AtomicBool::new(false));
        let gate2 = gate.clone();
        let pool = WorkerPool::new(&config(1, 2), move |_n: u32| {
            while !gate2.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(1));
            }
            TaskOutcome::Done
        })
        .unwrap();

        assert!(pool.try_submit(1).is_ok());
        assert!(pool.try_submit(2).is_ok());
        assert_eq!(pool.try_submit(3), Err(3));

        gate.store(true, Ordering::Relaxed);
        assert_eq!(pool.shutdown().completed, 2);
    }

    #[test]
    fn panicking_task_releases_its_permit() {
        let pool = WorkerPool::new(&config(2, 4), |n: u32| {
            if n == 3 {
                panic!("boom");
            }
            TaskOutcome::Done
        })
        .unwrap();

        for n in 0..6 {
            pool.submit(n);
        }
        let stats = pool.shutdown();
        assert_eq!(stats.completed, 6);
        assert_eq!(stats.panicked, 1);
    }

    #[test]
    fn delayed_heap_pops_earliest_first() {
        let now = Instant::now();
        let mut q: Queue<&str> = Queue {
            ready: VecDeque::new(),
            delayed: BinaryHeap::new(),
            next_seq: 0,
            stopping: false,
        };
        q.delayed.push(Delayed {
            due: now + Duration::from_millis(20),
            seq: 0,
            task: "late",
        });
        q.delayed.push(Delayed {
            due: now,
            seq: 1,
            task: "early",
        });

        assert_eq!(q.pop_due(now), Some("early"));
        assert_eq!(q.pop_due(now), None);
        assert_eq!(q.pop_due(now + Duration::from_millis(20)), Some("late"));
    }
}
