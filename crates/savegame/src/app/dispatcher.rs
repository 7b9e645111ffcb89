use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, warn};

use crate::sync::panic_message;

static DISPATCH_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_dispatch_lock_poison_once(operation: &'static str) {
    if DISPATCH_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "dispatcher lock poisoned; recovered inner value");
    }
}

type Job<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub ran: usize,
    pub panicked: usize,
}

/// FIFO of continuations that background threads schedule onto the main
/// thread. Each continuation receives the main-thread target `T` when the
/// queue is drained.
pub struct MainThreadDispatcher<T> {
    queue: Arc<Mutex<VecDeque<Job<T>>>>,
}

impl<T> Clone for MainThreadDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> Default for MainThreadDispatcher<T> {
    fn default() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T> MainThreadDispatcher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from any thread.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.lock("enqueue").push_back(Box::new(job));
    }

    pub fn pending(&self) -> usize {
        self.lock("pending").len()
    }

    /// Runs every continuation queued before this call, oldest first.
    /// Continuations enqueued while draining wait for the next drain. A
    /// panicking continuation is logged and the rest still run.
    pub fn drain(&self, target: &mut T) -> DrainReport {
        let jobs = std::mem::take(&mut *self.lock("drain"));
        let mut report = DrainReport::default();
        for job in jobs {
            match panic::catch_unwind(AssertUnwindSafe(|| job(&mut *target))) {
                Ok(()) => report.ran += 1,
                Err(payload) => {
                    report.panicked += 1;
                    error!(
                        panic = %panic_message(payload.as_ref()),
                        "dispatched_callback_panicked"
                    );
                }
            }
        }
        report
    }

    fn lock(&self, operation: &'static str) -> MutexGuard<'_, VecDeque<Job<T>>> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_dispatch_lock_poison_once(operation);
                poisoned.into_inner()
            }
        }
    }
}
