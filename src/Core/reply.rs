// Reply delivery: where callbacks run and how they are serialized

use lazy_static::lazy_static;
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

/// A unit of work posted to a [`ReplyContext`].
pub type ReplyJob = Box<dyn FnOnce() + Send + 'static>;

lazy_static! {
    static ref GLOBAL_REPLIES: Arc<ReplyDispatcher> = Arc::new(ReplyDispatcher::new());
}

/// The execution context a reply must run on.
///
/// Whoever registers a reply callback also names the context that owns it,
/// for example the thread that drives a UI or an event loop. The processor
/// never calls a callback directly; it hands the job to the context.
pub trait ReplyContext: Send + Sync {
    fn invoke(&self, job: ReplyJob);
}

/// Runs jobs immediately on whichever thread delivers the reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl ReplyContext for InlineContext {
    fn invoke(&self, job: ReplyJob) {
        job()
    }
}

/// A context-bound dispatch queue.
///
/// Jobs accumulate until the owning thread calls [`pump`](Self::pump) or
/// [`pump_timeout`](Self::pump_timeout), so callbacks always run on that
/// thread.
#[derive(Default)]
pub struct QueuedContext {
    jobs: Mutex<VecDeque<ReplyJob>>,
    ready: Condvar,
}

impl QueuedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to be pumped.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Runs every job queued so far on the calling thread and returns how
    /// many ran. Jobs posted while pumping are picked up in the same call.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        loop {
            // The queue lock is released before the job runs so that a job
            // may post further work to this context.
            let job = self.jobs.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Waits up to `timeout` for at least one job, then pumps.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        {
            let mut jobs = self.jobs.lock();
            while jobs.is_empty() {
                if self.ready.wait_until(&mut jobs, deadline).timed_out() {
                    break;
                }
            }
        }
        self.pump()
    }
}

impl ReplyContext for QueuedContext {
    fn invoke(&self, job: ReplyJob) {
        self.jobs.lock().push_back(job);
        self.ready.notify_all();
    }
}

/// Serializes reply delivery.
///
/// Every callback routed through one dispatcher runs under its lock, so two
/// callbacks sharing a dispatcher never overlap. The lock is re-entrant: a
/// callback may itself trigger another reply on the same thread. The
/// process-wide default gives system-wide serialization.
#[derive(Debug, Default)]
pub struct ReplyDispatcher {
    lock: ReentrantMutex<()>,
    delivered: AtomicU64,
    panicked: AtomicU64,
}

impl ReplyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared dispatcher used by messages that are not given one.
    pub fn global() -> Arc<ReplyDispatcher> {
        Arc::clone(&GLOBAL_REPLIES)
    }

    /// Runs `callback` under the reply lock. A panicking callback is logged
    /// and contained; returns whether the callback ran to completion.
    pub fn deliver<F: FnOnce()>(&self, callback: F) -> bool {
        let _guard = self.lock.lock();
        match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(payload) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                error!(panic = %panic_message(payload.as_ref()), "reply callback panicked");
                false
            }
        }
    }

    /// Callbacks that completed normally.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Callbacks that panicked.
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
