//! Worker leases bounding build parallelism.

use parking_lot::{Condvar, Mutex};

/// Hands out up to `max_workers` leases; further requests block until one
/// is returned.
pub struct WorkerLeaseService {
    max_workers: usize,
    in_use: Mutex<usize>,
    returned: Condvar,
}

impl WorkerLeaseService {
    pub fn new(max_workers: usize) -> Self {
        assert!(max_workers > 0, "need at least one worker");
        Self {
            max_workers,
            in_use: Mutex::new(0),
            returned: Condvar::new(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Blocks until a lease is free.
    pub fn acquire(&self) -> WorkerLease<'_> {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.max_workers {
            self.returned.wait(&mut in_use);
        }
        *in_use += 1;
        WorkerLease { service: self }
    }

    pub fn leases_in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Run `work` while holding one lease.
    pub fn with_worker_lease<T>(&self, work: impl FnOnce() -> T) -> T {
        let _lease = self.acquire();
        work()
    }
}

/// Releases the lease when dropped.
pub struct WorkerLease<'a> {
    service: &'a WorkerLeaseService,
}

impl Drop for WorkerLease<'_> {
    fn drop(&mut self) {
        let mut in_use = self.service.in_use.lock();
        *in_use -= 1;
        self.service.returned.notify_one();
    }
}
