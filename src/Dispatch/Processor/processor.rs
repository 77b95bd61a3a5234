// Two-lane message processor: lifecycle, push, shared loop state

use crate::Core::error::{DispatchError, DispatchResult};
use crate::Core::reply::{ReplyContext, ReplyJob};
use crate::Dispatch::builder::{ProcessorBuilder, ProcessorConfig};
use crate::Dispatch::policy::{MessageHandler, MessageQueue, SelectionPolicy};
use crate::Dispatch::Message::Message;
use crate::Dispatch::Structs::{Lane, MessageState, ProcessorState};

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One FIFO lane behind its own reader/writer lock.
pub(crate) struct LaneQueue {
    pub(crate) lane: Lane,
    pub(crate) queue: RwLock<MessageQueue>,
}

impl LaneQueue {
    fn new(lane: Lane) -> Self {
        Self {
            lane,
            queue: RwLock::new(MessageQueue::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.read().len()
    }

    /// Moves everything queued out of the lane.
    pub(crate) fn take_all(&self) -> MessageQueue {
        std::mem::take(&mut *self.queue.write())
    }
}

/// Who to tell, and where, once the processor has stopped.
pub(crate) struct StopNotice {
    pub(crate) sender: Arc<dyn ReplyContext>,
    pub(crate) callback: ReplyJob,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) pushed: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) replied: AtomicU64,
    pub(crate) abandoned: AtomicU64,
    pub(crate) loops: AtomicU64,
}

/// Point-in-time copy of a processor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Messages accepted by `push_message`.
    pub pushed: u64,
    pub completed: u64,
    pub failed: u64,
    pub discarded: u64,
    /// Replies dispatched to sender contexts.
    pub replied: u64,
    /// Messages dequeued or still queued when a stop dropped them.
    pub abandoned: u64,
    /// Loop iterations run.
    pub loops: u64,
}

/// State shared between the processor handle, its loop thread and async
/// workers.
pub(crate) struct Shared {
    pub(crate) config: ProcessorConfig,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) policy: Arc<dyn SelectionPolicy>,
    pub(crate) state: Mutex<ProcessorState>,
    pub(crate) state_changed: Condvar,
    pub(crate) async_lane: LaneQueue,
    pub(crate) sync_lane: LaneQueue,
    pub(crate) in_flight: CachePadded<AtomicUsize>,
    pub(crate) stop_notice: Mutex<Option<StopNotice>>,
    pub(crate) fault: Mutex<Option<Arc<DispatchError>>>,
    pub(crate) counters: Counters,
}

impl Shared {
    pub(crate) fn state(&self) -> ProcessorState {
        *self.state.lock()
    }

    pub(crate) fn lane(&self, lane: Lane) -> &LaneQueue {
        match lane {
            Lane::Async => &self.async_lane,
            Lane::Sync => &self.sync_lane,
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.async_lane.len() > 0 || self.sync_lane.len() > 0
    }
}

/// Drains an async lane and a sync lane from a dedicated loop thread.
///
/// Async-lane messages run on the rayon pool and the loop does not wait
/// for them; sync-lane messages run inline on the loop thread. A stop is
/// cooperative: the loop exits once it is stopping and no async message is
/// still executing, dropping whatever is left in the queues.
///
/// ```no_run
/// use dmxp_dispatch::{Message, Processor};
///
/// let processor = Processor::builder()
///     .with_handler(|message: &Message| -> anyhow::Result<()> {
///         message.set_reply_data(b"ok".to_vec())?;
///         Ok(())
///     })
///     .build_started()?;
///
/// processor.push_message(&Message::new(1))?;
/// processor.stop()?;
/// processor.wait_until_stopped(None);
/// # Ok::<(), dmxp_dispatch::DispatchError>(())
/// ```
pub struct Processor {
    pub(crate) shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    pub(crate) fn new(
        config: ProcessorConfig,
        handler: Arc<dyn MessageHandler>,
        policy: Arc<dyn SelectionPolicy>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                handler,
                policy,
                state: Mutex::new(ProcessorState::Stopped),
                state_changed: Condvar::new(),
                async_lane: LaneQueue::new(Lane::Async),
                sync_lane: LaneQueue::new(Lane::Sync),
                in_flight: CachePadded::new(AtomicUsize::new(0)),
                stop_notice: Mutex::new(None),
                fault: Mutex::new(None),
                counters: Counters::default(),
            }),
            thread: Mutex::new(None),
        }
    }

    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    /// Starts the loop thread. Only allowed while `Stopped`.
    ///
    /// A processor that has completed a stop can be started again; the
    /// previous loop thread is joined and any recorded fault is cleared.
    pub fn start(&self) -> DispatchResult<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != ProcessorState::Stopped {
                return Err(DispatchError::ProcessorState {
                    operation: "start",
                    expected: ProcessorState::Stopped,
                    actual: *state,
                });
            }
            *state = ProcessorState::Running;
            self.shared.state_changed.notify_all();
        }

        let previous = self.thread.lock().take();
        if let Some(handle) = previous {
            // A stop callback may restart the processor from the old loop
            // thread; that thread cannot join itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        *self.shared.fault.lock() = None;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || shared.run());

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                info!(thread = %self.shared.config.thread_name, "processor started");
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = ProcessorState::Stopped;
                self.shared.state_changed.notify_all();
                Err(DispatchError::Spawn(e))
            }
        }
    }

    /// Requests a cooperative stop. Only allowed while `Running`.
    pub fn stop(&self) -> DispatchResult<()> {
        self.request_stop(None)
    }

    /// Like [`stop`](Self::stop), and runs `callback` once on `sender` after
    /// the loop has exited and the processor is `Stopped`.
    pub fn stop_with_callback<F>(&self, sender: Arc<dyn ReplyContext>, callback: F) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.request_stop(Some(StopNotice {
            sender,
            callback: Box::new(callback),
        }))
    }

    fn request_stop(&self, notice: Option<StopNotice>) -> DispatchResult<()> {
        let mut state = self.shared.state.lock();
        if *state != ProcessorState::Running {
            return Err(DispatchError::ProcessorState {
                operation: "stop",
                expected: ProcessorState::Running,
                actual: *state,
            });
        }
        if let Some(notice) = notice {
            *self.shared.stop_notice.lock() = Some(notice);
        }
        *state = ProcessorState::Stopping;
        self.shared.state_changed.notify_all();

        info!(
            in_flight = self.shared.in_flight.load(Ordering::Acquire),
            "processor stopping"
        );
        Ok(())
    }

    /// Queues `message` on its lane. The message moves from `Created` to
    /// `WaitingToProcess`; a message that was already pushed is rejected.
    pub fn push_message(&self, message: &Arc<Message>) -> DispatchResult<()> {
        // Held across the enqueue so a concurrent shutdown cannot clear the
        // queues between the check and the push.
        let state = self.shared.state.lock();
        if *state != ProcessorState::Running {
            return Err(DispatchError::ProcessorState {
                operation: "push a message",
                expected: ProcessorState::Running,
                actual: *state,
            });
        }

        if !message.transition(MessageState::WaitingToProcess) {
            return Err(DispatchError::AlreadyQueued {
                uid: message.uid(),
                state: message.state(),
            });
        }

        let lane = message.lane();
        self.shared.lane(lane).queue.write().push_back(Arc::clone(message));
        self.shared.counters.pushed.fetch_add(1, Ordering::Relaxed);
        debug!(uid = message.uid(), code = message.code(), %lane, "message queued");
        Ok(())
    }

    /// Blocks until the processor is `Stopped`, or until `timeout` elapses.
    /// Returns whether it is stopped.
    pub fn wait_until_stopped(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.shared.state.lock();
        match timeout {
            None => {
                while *state != ProcessorState::Stopped {
                    self.shared.state_changed.wait(&mut state);
                }
                true
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while *state != ProcessorState::Stopped {
                    if self
                        .shared
                        .state_changed
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                *state == ProcessorState::Stopped
            }
        }
    }
}

impl Drop for Processor {
    /// Stops a running processor and waits for its loop, including any
    /// async messages still executing.
    fn drop(&mut self) {
        if self.shared.state() == ProcessorState::Running {
            let _ = self.stop();
        }
        if let Some(handle) = self.thread.get_mut().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
