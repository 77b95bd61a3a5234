use crate::Dispatch::Message::Message;
use crate::Dispatch::Processor::Processor;
use std::fmt;

/// Debug function for Message
///
/// Shows identity, routing flags and lifecycle state. Payloads are reported
/// by length only, and the reply route as present/absent, since callbacks
/// and contexts are opaque.
pub fn debug_message(message: &Message, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (state, failed) = {
        let status = message.status.lock();
        (status.state, status.failure.is_some())
    };
    let (request_len, reply_len) = {
        let payload = message.payload.lock();
        (
            payload.request.as_ref().map(Vec::len),
            payload.reply.as_ref().map(Vec::len),
        )
    };

    f.debug_struct("Message")
        .field("uid", &message.uid)
        .field("code", &message.code)
        .field("lane", &message.lane())
        .field("allow_discard", &message.allow_discard)
        .field("need_reply", &message.reply.is_some())
        .field("reply_when_discarded", &message.reply_when_discarded)
        .field("state", &state)
        .field("failed", &failed)
        .field("request_len", &request_len)
        .field("reply_len", &reply_len)
        .finish()
}

/// Debug function for Processor
///
/// Shows:
/// - Lifecycle state
/// - Queue depths and async work in flight
/// - Loop thread name
pub fn debug_processor(processor: &Processor, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Processor")
        .field("state", &processor.state())
        .field("async_len", &processor.async_len())
        .field("sync_len", &processor.sync_len())
        .field("in_flight", &processor.in_flight())
        .field("thread", &processor.config().thread_name)
        .finish_non_exhaustive()
}
