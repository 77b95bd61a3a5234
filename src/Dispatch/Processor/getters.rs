use super::processor::{Processor, ProcessorStats};
use crate::Core::error::DispatchError;
use crate::Dispatch::builder::ProcessorConfig;
use crate::Dispatch::Structs::ProcessorState;

use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Read-only views of a processor for monitoring and tests.
impl Processor {
    pub fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.shared.config
    }

    /// Messages waiting on the async lane.
    pub fn async_len(&self) -> usize {
        self.shared.async_lane.len()
    }

    /// Messages waiting on the sync lane.
    pub fn sync_len(&self) -> usize {
        self.shared.sync_lane.len()
    }

    /// Messages waiting on either lane.
    pub fn pending(&self) -> usize {
        self.async_len() + self.sync_len()
    }

    /// Async messages currently executing on the worker pool.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// The fault that stopped the loop, if any. Cleared by `start`.
    pub fn fault(&self) -> Option<Arc<DispatchError>> {
        self.shared.fault.lock().clone()
    }

    pub fn stats(&self) -> ProcessorStats {
        let c = &self.shared.counters;
        ProcessorStats {
            pushed: c.pushed.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            replied: c.replied.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
            loops: c.loops.load(Ordering::Relaxed),
        }
    }
}
