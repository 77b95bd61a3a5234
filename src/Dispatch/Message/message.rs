// A tracked unit of work and its builder

use crate::Core::error::{DispatchError, DispatchResult};
use crate::Core::reply::{ReplyContext, ReplyDispatcher};
use crate::Core::uid::UidGenerator;
use crate::Dispatch::Structs::{MessageState, Timestamps};

use parking_lot::Mutex;
use std::sync::Arc;

/// Callback run on the sender's context when a reply is due.
pub type ReplyCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Where and how a message replies.
pub(crate) struct ReplyRoute {
    pub(crate) sender: Arc<dyn ReplyContext>,
    pub(crate) callback: ReplyCallback,
}

/// State, timestamps and captured failure. Guarded together.
pub(crate) struct Status {
    pub(crate) state: MessageState,
    pub(crate) times: Timestamps,
    pub(crate) failure: Option<Arc<anyhow::Error>>,
}

/// Request and reply payloads. Guarded separately from [`Status`] so that
/// state reads never wait on payload access.
#[derive(Default)]
pub(crate) struct Payload {
    pub(crate) request: Option<Vec<u8>>,
    pub(crate) reply: Option<Vec<u8>>,
}

/// A unit of work with a strict lifecycle.
///
/// Producers build messages and push them into a running processor. After
/// that only the processor changes state and timestamps, and only the
/// handler writes reply data, during the message's processing window.
/// Messages are shared as `Arc<Message>` between the producer, the
/// processor and reply callbacks.
pub struct Message {
    pub(crate) uid: i64,
    pub(crate) code: i32,
    pub(crate) allow_async: bool,
    pub(crate) allow_discard: bool,
    pub(crate) reply_when_discarded: bool,
    pub(crate) reply: Option<ReplyRoute>,
    pub(crate) replies: Arc<ReplyDispatcher>,
    pub(crate) status: Mutex<Status>,
    pub(crate) payload: Mutex<Payload>,
}

/// Configures a [`Message`] before it gets its uid.
pub struct MessageBuilder {
    code: i32,
    allow_async: bool,
    allow_discard: bool,
    need_reply: bool,
    reply_when_discarded: bool,
    sender: Option<Arc<dyn ReplyContext>>,
    callback: Option<ReplyCallback>,
    uids: Option<Arc<UidGenerator>>,
    replies: Option<Arc<ReplyDispatcher>>,
}

impl MessageBuilder {
    pub fn new(code: i32) -> Self {
        Self {
            code,
            allow_async: false,
            allow_discard: false,
            need_reply: false,
            reply_when_discarded: false,
            sender: None,
            callback: None,
            uids: None,
            replies: None,
        }
    }

    /// Route to the async lane instead of the sync lane.
    pub fn allow_async(mut self, allow: bool) -> Self {
        self.allow_async = allow;
        self
    }

    pub fn allow_discard(mut self, allow: bool) -> Self {
        self.allow_discard = allow;
        self
    }

    /// Requires both [`sender`](Self::sender) and [`on_reply`](Self::on_reply).
    pub fn need_reply(mut self, need: bool) -> Self {
        self.need_reply = need;
        self
    }

    pub fn reply_when_discarded(mut self, reply: bool) -> Self {
        self.reply_when_discarded = reply;
        self
    }

    pub fn sender(mut self, sender: Arc<dyn ReplyContext>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn on_reply<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Shorthand for `need_reply(true).sender(sender).on_reply(callback)`.
    pub fn reply_to<F>(self, sender: Arc<dyn ReplyContext>, callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.need_reply(true).sender(sender).on_reply(callback)
    }

    /// Draw the uid from `uids` instead of the process-wide generator.
    pub fn uid_generator(mut self, uids: Arc<UidGenerator>) -> Self {
        self.uids = Some(uids);
        self
    }

    /// Serialize replies through `replies` instead of the process-wide dispatcher.
    pub fn reply_dispatcher(mut self, replies: Arc<ReplyDispatcher>) -> Self {
        self.replies = Some(replies);
        self
    }

    pub fn build(mut self) -> DispatchResult<Arc<Message>> {
        let reply = if self.need_reply {
            match (self.sender.take(), self.callback.take()) {
                (Some(sender), Some(callback)) => Some(ReplyRoute { sender, callback }),
                _ => return Err(DispatchError::MissingReplyTarget { code: self.code }),
            }
        } else {
            None
        };
        Ok(self.assemble(reply))
    }

    /// Assigns the uid and creates the message. `reply` has been validated.
    pub(crate) fn assemble(self, reply: Option<ReplyRoute>) -> Arc<Message> {
        let uids = self.uids.unwrap_or_else(UidGenerator::global);
        let replies = self.replies.unwrap_or_else(ReplyDispatcher::global);

        Arc::new(Message {
            uid: uids.next_uid(),
            code: self.code,
            allow_async: self.allow_async,
            allow_discard: self.allow_discard,
            reply_when_discarded: self.reply_when_discarded,
            reply,
            replies,
            status: Mutex::new(Status {
                state: MessageState::Created,
                times: Timestamps::created_now(),
                failure: None,
            }),
            payload: Mutex::new(Payload::default()),
        })
    }
}
