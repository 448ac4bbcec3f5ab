//! Counting semaphore for capping outstanding work.
//!
//! Uses `Mutex + Condvar` from std. Permits are not tied to a guard: a task
//! takes its permit at submission and gives it back when it reaches a
//! terminal state, possibly on another thread and after several retries.

use std::sync::{Condvar, Mutex};

/// A counting semaphore with a fixed capacity.
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    available: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    /// Create a semaphore with `capacity` permits, all available.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: Mutex::new(capacity),
            cond: Condvar::new(),
        }
    }

    /// Total number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until `n` permits are available, then take them.
    ///
    /// `n` is clamped to the capacity so an oversized request cannot wait forever.
    pub fn acquire(&self, n: usize) {
        let n = n.min(self.capacity);
        let mut available = self.available.lock().expect("semaphore poisoned");
        while *available < n {
            available = self.cond.wait(available).expect("semaphore poisoned");
        }
        *available -= n;
    }

    /// Take `n` permits if they are available right now.
    pub fn try_acquire(&self, n: usize) -> bool {
        let mut available = self.available.lock().expect("semaphore poisoned");
        if *available >= n {
            *available -= n;
            true
        } else {
            false
        }
    }

    /// Return `n` permits and wake waiters.
    pub fn release(&self, n: usize) {
        let mut available = self.available.lock().expect("semaphore poisoned");
        *available = (*available + n).min(self.capacity);
        // Both acquirers and `wait_idle` wait on the same condvar
        self.cond.notify_all();
    }

    /// Number of permits currently taken.
    pub fn in_use(&self) -> usize {
        self.capacity - *self.available.lock().expect("semaphore poisoned")
    }

    /// Number of permits that could be taken without blocking.
    pub fn available(&self) -> usize {
        *self.available.lock().expect("semaphore poisoned")
    }

    /// Block until every permit has been returned.
    pub fn wait_idle(&self) {
        let mut available = self.available.lock().expect("semaphore poisoned");
        while *available < self.capacity {
            available = self.cond.wait(available).expect("semaphore poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn acquire_and_release() {
        let sem = Semaphore::new(2);
        sem.acquire(1);
        sem.acquire(1);
        assert_eq!(sem.in_use(), 2);
        assert_eq!(sem.available(), 0);
        sem.release(1);
        assert_eq!(sem.in_use(), 1);
    }

    #[test]
    fn try_acquire_respects_capacity() {
        let sem = Semaphore::new(3);
        assert!(sem.try_acquire(2));
        assert!(!sem.try_acquire(2));
        assert!(sem.try_acquire(1));
        assert!(!sem.try_acquire(1));
    }

    #[test]
    fn release_never_exceeds_capacity() {
        let sem = Semaphore::new(2);
        sem.release(5);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn blocking_acquire() {
        let sem = Arc::new(Semaphore::new(1));
        sem.acquire(1);

        let sem2 = sem.clone();
        let handle = std::thread::spawn(move || {
            sem2.acquire(1);
            42
        });

        // Give thread time to block
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        sem.release(1);

        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn oversized_request_is_clamped() {
        let sem = Semaphore::new(2);
        sem.acquire(10);
        assert_eq!(sem.in_use(), 2);
    }

    #[test]
    fn wait_idle_returns_after_all_released() {
        let sem = Arc::new(Semaphore::new(4));
        sem.acquire(3);

        let sem2 = sem.clone();
        let releaser = std::thread::spawn(move || {
            for _ in 0..3 {
                std::thread::sleep(Duration::from_millis(10));
                sem2.release(1);
            }
        });

        sem.wait_idle();
        assert_eq!(sem.in_use(), 0);
        releaser.join().unwrap();
    }
}
