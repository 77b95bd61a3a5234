mod common;

use common::{fast_builder, wait_for, WAIT};
use dmxp_dispatch::{
    InlineContext, Message, MessageState, QueuedContext, ReplyContext, ReplyDispatcher,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn counting_message(
    sender: Arc<dyn ReplyContext>,
    replies: &Arc<ReplyDispatcher>,
    count: &Arc<AtomicUsize>,
) -> dmxp_dispatch::MessageBuilder {
    let count = Arc::clone(count);
    Message::builder(1)
        .reply_dispatcher(Arc::clone(replies))
        .reply_to(sender, move |_m: &Message| {
            count.fetch_add(1, Ordering::SeqCst);
        })
}

#[test]
fn queued_context_runs_callback_on_owner_thread() {
    let context = Arc::new(QueuedContext::new());
    let owner = thread::current().id();
    let ran_on = Arc::new(parking_lot::Mutex::new(None));
    let ran_on_cb = Arc::clone(&ran_on);

    let processor = fast_builder()
        .with_handler(|_m: &Message| -> anyhow::Result<()> { Ok(()) })
        .build_started()
        .unwrap();

    let message = Message::builder(1)
        .allow_async(true)
        .reply_to(context.clone(), move |m: &Message| {
            *ran_on_cb.lock() = Some((thread::current().id(), m.state()));
        })
        .build()
        .unwrap();
    processor.push_message(&message).unwrap();

    assert!(wait_for(WAIT, || context.pending() == 1));
    assert!(ran_on.lock().is_none(), "callback ran before the owner pumped");

    assert_eq!(context.pump(), 1);
    let (thread_id, state) = ran_on.lock().take().unwrap();
    assert_eq!(thread_id, owner);
    assert_eq!(state, MessageState::ProcessCompleted);
}

#[test]
fn pump_timeout_returns_zero_when_nothing_arrives() {
    let context = QueuedContext::new();
    assert_eq!(context.pump_timeout(Duration::from_millis(20)), 0);

    context.invoke(Box::new(|| {}));
    context.invoke(Box::new(|| {}));
    assert_eq!(context.pump_timeout(Duration::from_millis(20)), 2);
}

#[test]
fn replies_sharing_a_dispatcher_never_overlap() {
    let replies = Arc::new(ReplyDispatcher::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let processor = fast_builder()
        .with_handler(|_m: &Message| -> anyhow::Result<()> { Ok(()) })
        .build_started()
        .unwrap();

    let total = 32;
    for i in 0..total {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let done = Arc::clone(&done);
        let message = Message::builder(i)
            .allow_async(true)
            .reply_dispatcher(Arc::clone(&replies))
            .reply_to(Arc::new(InlineContext), move |_m: &Message| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        processor.push_message(&message).unwrap();
    }

    assert!(wait_for(WAIT, || done.load(Ordering::SeqCst) == total as usize));
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert!(wait_for(WAIT, || replies.delivered() == total as u64));
}

#[test]
fn panicking_callback_is_contained() {
    let replies = Arc::new(ReplyDispatcher::new());
    let processor = fast_builder()
        .with_handler(|_m: &Message| -> anyhow::Result<()> { Ok(()) })
        .build_started()
        .unwrap();

    let bad = Message::builder(1)
        .reply_dispatcher(Arc::clone(&replies))
        .reply_to(Arc::new(InlineContext), |_m: &Message| panic!("callback blew up"))
        .build()
        .unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let good = counting_message(Arc::new(InlineContext), &replies, &count)
        .build()
        .unwrap();

    processor.push_message(&bad).unwrap();
    processor.push_message(&good).unwrap();

    assert!(wait_for(WAIT, || count.load(Ordering::SeqCst) == 1));
    assert_eq!(replies.panicked(), 1);
    assert_eq!(bad.state(), MessageState::ProcessCompleted);
    assert!(processor.is_running());
}

#[test]
#[serial]
fn default_messages_use_the_global_dispatcher() {
    let global = ReplyDispatcher::global();
    let before = global.delivered();
    let processor = fast_builder()
        .with_handler(|_m: &Message| -> anyhow::Result<()> { anyhow::bail!("rejected") })
        .build_started()
        .unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(None));
    let seen_cb = Arc::clone(&seen);
    let message = Message::builder(1)
        .reply_to(Arc::new(InlineContext), move |m: &Message| {
            *seen_cb.lock() = Some(m.state());
        })
        .build()
        .unwrap();
    processor.push_message(&message).unwrap();

    assert!(wait_for(WAIT, || processor.stats().replied == 1));
    assert_eq!(*seen.lock(), Some(MessageState::ProcessFailed));
    assert!(global.delivered() > before);
}

#[test]
fn held_message_does_not_reply_until_processed() {
    let policy = Arc::new(common::HoldSync::default());
    let processor = fast_builder()
        .with_policy(Arc::clone(&policy))
        .with_handler(|_m: &Message| -> anyhow::Result<()> { Ok(()) })
        .build_started()
        .unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    let message = Message::builder(1)
        .reply_to(Arc::new(InlineContext), move |m: &Message| {
            seen_cb.lock().push(m.state());
        })
        .build()
        .unwrap();
    processor.push_message(&message).unwrap();

    thread::sleep(Duration::from_millis(20));
    assert_eq!(message.state(), MessageState::WaitingToProcess);
    assert!(seen.lock().is_empty());
    assert!(message.timestamps().reply_time().is_none());

    policy.released.store(true, Ordering::SeqCst);
    assert!(wait_for(WAIT, || processor.stats().replied == 1));
    assert_eq!(*seen.lock(), vec![MessageState::ProcessCompleted]);
}
