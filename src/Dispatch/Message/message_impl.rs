use std::fmt;
use std::sync::Arc;

use super::message::{Message, MessageBuilder};
use crate::Core::error::{DispatchError, DispatchResult};
use crate::Dispatch::Structs::Message_Structs::{now_ns, TIME_UNSET};
use crate::Dispatch::Structs::{Lane, MessageState, Timestamps};

impl Message {
    pub fn builder(code: i32) -> MessageBuilder {
        MessageBuilder::new(code)
    }

    /// A sync-lane message that cannot be discarded and never replies.
    pub fn new(code: i32) -> Arc<Message> {
        MessageBuilder::new(code).assemble(None)
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn allow_async(&self) -> bool {
        self.allow_async
    }

    pub fn allow_discard(&self) -> bool {
        self.allow_discard
    }

    pub fn need_reply(&self) -> bool {
        self.reply.is_some()
    }

    pub fn reply_when_discarded(&self) -> bool {
        self.reply_when_discarded
    }

    /// The lane this message is routed to.
    pub fn lane(&self) -> Lane {
        if self.allow_async {
            Lane::Async
        } else {
            Lane::Sync
        }
    }

    pub fn state(&self) -> MessageState {
        self.status.lock().state
    }

    pub fn timestamps(&self) -> Timestamps {
        self.status.lock().times
    }

    /// The error captured while processing, if the handler failed.
    pub fn failure(&self) -> Option<Arc<anyhow::Error>> {
        self.status.lock().failure.clone()
    }

    pub fn request_data(&self) -> Option<Vec<u8>> {
        self.payload.lock().request.clone()
    }

    pub fn reply_data(&self) -> Option<Vec<u8>> {
        self.payload.lock().reply.clone()
    }

    /// Attempts `current -> to`, stamping the matching timestamps.
    ///
    /// Returns `false` and changes nothing when the pair is not a legal
    /// transition. Only the processor drives a message's lifecycle.
    #[must_use]
    pub(crate) fn transition(&self, to: MessageState) -> bool {
        let mut status = self.status.lock();
        if !status.state.can_transition_to(to) {
            return false;
        }

        let now = now_ns();
        match to {
            MessageState::WaitingToProcess => status.times.request_ns = now,
            MessageState::Processing => status.times.process_start_ns = now,
            MessageState::Discarded => {
                status.times.process_start_ns = now;
                status.times.process_finish_ns = now;
            }
            MessageState::ProcessCompleted | MessageState::ProcessFailed => {
                status.times.process_finish_ns = now
            }
            MessageState::Created => unreachable!("no transition leads back to Created"),
        }
        status.state = to;
        true
    }

    /// Sets the request payload. Only allowed before the message is pushed.
    pub fn set_request_data(&self, data: impl Into<Vec<u8>>) -> DispatchResult<()> {
        let data = data.into();
        if data.is_empty() {
            return Err(DispatchError::EmptyPayload {
                field: "request_data",
            });
        }

        // Payload lock first, then status: transitions never take the
        // payload lock, so this order cannot deadlock.
        let mut payload = self.payload.lock();
        let state = self.state();
        if state != MessageState::Created {
            return Err(DispatchError::PayloadState {
                field: "request_data",
                expected: MessageState::Created,
                actual: state,
            });
        }
        payload.request = Some(data);
        Ok(())
    }

    /// Sets the reply payload. Only allowed from inside the handler, while
    /// the message is `Processing`.
    pub fn set_reply_data(&self, data: impl Into<Vec<u8>>) -> DispatchResult<()> {
        let data = data.into();
        if data.is_empty() {
            return Err(DispatchError::EmptyPayload {
                field: "reply_data",
            });
        }

        let mut payload = self.payload.lock();
        let state = self.state();
        if state != MessageState::Processing {
            return Err(DispatchError::PayloadState {
                field: "reply_data",
                expected: MessageState::Processing,
                actual: state,
            });
        }
        payload.reply = Some(data);
        Ok(())
    }

    /// Records a handler failure. Ignored unless the message is still
    /// `Processing`.
    pub(crate) fn record_failure(&self, error: anyhow::Error) {
        let mut status = self.status.lock();
        if status.state == MessageState::Processing {
            status.failure = Some(Arc::new(error));
        }
    }

    /// Delivers the reply if one is due.
    ///
    /// A reply is due when the message requested one, has reached a terminal
    /// state, and either was not discarded or asked to be told about
    /// discards. The reply time is stamped, then the callback is posted to
    /// the sender's context where it runs under the reply dispatcher's lock.
    /// A message replies at most once.
    pub(crate) fn try_reply(self: &Arc<Self>) -> bool {
        let Some(route) = self.reply.as_ref() else {
            return false;
        };

        {
            let mut status = self.status.lock();
            if !status.state.is_terminal() {
                return false;
            }
            if status.state == MessageState::Discarded && !self.reply_when_discarded {
                return false;
            }
            if status.times.reply_ns != TIME_UNSET {
                return false;
            }
            status.times.reply_ns = now_ns();
        }

        let message = Arc::clone(self);
        let callback = Arc::clone(&route.callback);
        route.sender.invoke(Box::new(move || {
            let replies = Arc::clone(&message.replies);
            replies.deliver(|| callback(message.as_ref()));
        }));
        true
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_message(self, f)
    }
}
