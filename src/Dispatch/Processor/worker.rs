// The message loop: lane draining, execution, shutdown

use super::processor::{LaneQueue, Shared};
use crate::Core::error::{DispatchError, DispatchResult};
use crate::Core::reply::panic_message;
use crate::Dispatch::Message::Message;
use crate::Dispatch::Structs::{Lane, MessageState, ProcessorState};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

impl Shared {
    /// Body of the loop thread.
    pub(crate) fn run(self: Arc<Self>) {
        debug!(thread = %self.config.thread_name, "message loop running");

        loop {
            let started = Instant::now();
            if let Err(fault) = self.message_loop() {
                self.fail(fault);
            }
            self.counters.loops.fetch_add(1, Ordering::Relaxed);

            if self.state() == ProcessorState::Stopping
                && self.in_flight.load(Ordering::Acquire) == 0
            {
                break;
            }

            // Adaptive pause: fast iterations sleep, slow ones only yield.
            if started.elapsed() < self.config.fast_loop_threshold {
                let pause = if self.has_pending() {
                    self.config.busy_sleep
                } else {
                    self.config.idle_sleep
                };
                thread::sleep(pause);
            } else {
                thread::yield_now();
            }
        }

        self.finish();
    }

    /// One iteration: the async lane, then the sync lane.
    pub(crate) fn message_loop(self: &Arc<Self>) -> DispatchResult<()> {
        self.drain_lane(&self.async_lane)?;
        self.drain_lane(&self.sync_lane)
    }

    fn drain_lane(self: &Arc<Self>, lane: &LaneQueue) -> DispatchResult<()> {
        if self.state() != ProcessorState::Running {
            return Ok(());
        }
        if lane.len() == 0 {
            return Ok(());
        }

        let (batch, selection) = {
            let mut queue = lane.queue.write();
            let selection = match lane.lane {
                Lane::Async => self.policy.select_async(&queue),
                Lane::Sync => self.policy.select_sync(&queue),
            };
            if selection.process_count < 0 {
                return Err(DispatchError::InvalidSelection {
                    lane: lane.lane,
                    count: selection.process_count,
                });
            }
            let requested = usize::try_from(selection.process_count).unwrap_or(usize::MAX);
            let take = queue.len().min(requested);
            let batch = queue.drain(..take).collect::<Vec<_>>();
            (batch, selection)
        };

        let total = batch.len();
        for (index, message) in batch.into_iter().enumerate() {
            if self.state() == ProcessorState::Stopping {
                let dropped = total - index;
                self.counters
                    .abandoned
                    .fetch_add(dropped as u64, Ordering::Relaxed);
                debug!(lane = %lane.lane, dropped, "stop requested, abandoning rest of batch");
                break;
            }

            if selection.is_discarded(message.uid()) && message.allow_discard() {
                self.discard(&message);
                continue;
            }

            match lane.lane {
                Lane::Sync => self.execute(&message),
                Lane::Async => self.dispatch_async(message),
            }
        }
        Ok(())
    }

    fn discard(&self, message: &Arc<Message>) {
        if !message.transition(MessageState::Discarded) {
            warn!(uid = message.uid(), state = %message.state(), "queued message could not be discarded");
            return;
        }
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(uid = message.uid(), code = message.code(), "message discarded");
        self.reply(message);
    }

    fn dispatch_async(self: &Arc<Self>, message: Arc<Message>) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(self);
        rayon::spawn(move || {
            // A panic escaping a rayon job aborts the process.
            if panic::catch_unwind(AssertUnwindSafe(|| shared.execute(&message))).is_err() {
                error!(uid = message.uid(), "async message execution panicked outside the handler");
            }
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        });
    }

    /// `Processing`, handler, `ProcessCompleted` or `ProcessFailed`, reply.
    fn execute(&self, message: &Arc<Message>) {
        if !message.transition(MessageState::Processing) {
            warn!(uid = message.uid(), state = %message.state(), "dequeued message could not start processing");
            return;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.process_message(message)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(anyhow::anyhow!(
                "process_message panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        match failure {
            None => {
                let finished = message.transition(MessageState::ProcessCompleted);
                debug_assert!(finished);
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Some(e) => {
                warn!(uid = message.uid(), code = message.code(), error = %e, "message processing failed");
                message.record_failure(e);
                let finished = message.transition(MessageState::ProcessFailed);
                debug_assert!(finished);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.reply(message);
    }

    fn reply(&self, message: &Arc<Message>) {
        if message.try_reply() {
            self.counters.replied.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a loop fault and turns it into a stop.
    fn fail(&self, fault: DispatchError) {
        error!(error = %fault, "message loop fault, stopping processor");
        *self.fault.lock() = Some(Arc::new(fault));

        let mut state = self.state.lock();
        if *state == ProcessorState::Running {
            *state = ProcessorState::Stopping;
            self.state_changed.notify_all();
        }
    }

    /// Clears both lanes, marks the processor stopped and sends the stop
    /// notification.
    fn finish(&self) {
        let (dropped, notice) = {
            let mut state = self.state.lock();
            let dropped = [self.async_lane.take_all(), self.sync_lane.take_all()];
            let notice = self.stop_notice.lock().take();
            *state = ProcessorState::Stopped;
            self.state_changed.notify_all();
            (dropped, notice)
        };

        // Released only after the state lock: a dropped message may hold
        // the last handle to this processor.
        let abandoned = dropped.iter().map(|queue| queue.len()).sum::<usize>();
        drop(dropped);

        if abandoned > 0 {
            self.counters
                .abandoned
                .fetch_add(abandoned as u64, Ordering::Relaxed);
            warn!(abandoned, "processor stopped with queued messages, they will not be processed");
        }
        info!(thread = %self.config.thread_name, "processor stopped");

        if let Some(notice) = notice {
            notice.sender.invoke(notice.callback);
        }
    }
}
