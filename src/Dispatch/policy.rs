// Injection points: what to take each cycle, and how to process a message

use crate::Core::error::DispatchError;
use crate::Dispatch::Message::Message;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// A lane's queue as seen by a selection hook.
pub type MessageQueue = VecDeque<Arc<Message>>;

/// One cycle's decision for one lane.
///
/// The processor dequeues `process_count` messages from the front of the
/// lane (clamped to its length) and discards those of them whose uid is in
/// `discard` and that allow discarding. A negative count is a policy bug
/// and stops the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub process_count: i64,
    pub discard: HashSet<i64>,
}

impl Selection {
    /// Take everything currently queued, discard nothing.
    pub fn all(queue: &MessageQueue) -> Self {
        Self::take(queue.len() as i64)
    }

    pub fn take(process_count: i64) -> Self {
        Self {
            process_count,
            discard: HashSet::new(),
        }
    }

    pub fn discard(mut self, uid: i64) -> Self {
        self.discard.insert(uid);
        self
    }

    pub fn discard_many(mut self, uids: impl IntoIterator<Item = i64>) -> Self {
        self.discard.extend(uids);
        self
    }

    pub fn is_discarded(&self, uid: i64) -> bool {
        self.discard.contains(&uid)
    }
}

/// Per-cycle, per-lane selection hook.
///
/// Called on the loop thread under the lane's write lock, so the queue is
/// stable for the duration of the call. Implementations that keep state
/// across cycles need interior mutability.
pub trait SelectionPolicy: Send + Sync {
    fn select_async(&self, queue: &MessageQueue) -> Selection {
        Selection::all(queue)
    }

    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        Selection::all(queue)
    }
}

/// Lets a caller keep a handle on a stateful policy after handing it to a
/// processor.
impl<P: SelectionPolicy + ?Sized> SelectionPolicy for Arc<P> {
    fn select_async(&self, queue: &MessageQueue) -> Selection {
        (**self).select_async(queue)
    }

    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        (**self).select_sync(queue)
    }
}

/// Processes every queued message, discards nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TakeAll;

impl SelectionPolicy for TakeAll {}

/// Takes at most a fixed number of messages per lane per cycle.
#[derive(Debug, Clone, Copy)]
pub struct BatchLimit {
    pub async_max: usize,
    pub sync_max: usize,
}

impl BatchLimit {
    pub fn new(async_max: usize, sync_max: usize) -> Self {
        Self {
            async_max,
            sync_max,
        }
    }
}

impl SelectionPolicy for BatchLimit {
    fn select_async(&self, queue: &MessageQueue) -> Selection {
        Selection::take(queue.len().min(self.async_max) as i64)
    }

    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        Selection::take(queue.len().min(self.sync_max) as i64)
    }
}

/// Keeps only the newest queued message per code.
///
/// Every discardable message whose code appears again later in the same
/// queue is discarded; the rest of the queue is processed in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoalesceByCode;

impl CoalesceByCode {
    fn select(queue: &MessageQueue) -> Selection {
        let mut seen = HashSet::new();
        let stale = queue
            .iter()
            .rev()
            .filter(|m| !seen.insert(m.code()) && m.allow_discard())
            .map(|m| m.uid())
            .collect::<Vec<_>>();
        Selection::all(queue).discard_many(stale)
    }
}

impl SelectionPolicy for CoalesceByCode {
    fn select_async(&self, queue: &MessageQueue) -> Selection {
        Self::select(queue)
    }

    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        Self::select(queue)
    }
}

/// The work a processor performs for each message.
///
/// Returning `Err` (or panicking) marks the message `ProcessFailed` and
/// stores the error on it; other messages are unaffected. Reply data is set
/// from here with [`Message::set_reply_data`].
pub trait MessageHandler: Send + Sync {
    fn process_message(&self, _message: &Message) -> anyhow::Result<()> {
        Err(DispatchError::NotImplemented.into())
    }
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> anyhow::Result<()> + Send + Sync,
{
    fn process_message(&self, message: &Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Handler used when none is supplied: every message fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unimplemented;

impl MessageHandler for Unimplemented {}
