// In demos/hasher.rs
use dmxp_dispatch::{CoalesceByCode, Message, MessageState, Processor, QueuedContext};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Distinct message codes; messages sharing a code coalesce.
const CODES: usize = 16;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [--auto-exit]", args[0]);
        std::process::exit(1);
    }

    let num_messages: usize = args[1].parse()?;
    let auto_exit = args.get(2).map(|s| s == "--auto-exit").unwrap_or(false);

    let processor = Processor::builder()
        .with_thread_name("hasher")
        .with_policy(CoalesceByCode)
        .with_handler(|message: &Message| -> anyhow::Result<()> {
            let request = message
                .request_data()
                .ok_or_else(|| anyhow::anyhow!("message {} has no request data", message.uid()))?;
            let digest = Sha256::digest(&request);
            message.set_reply_data(format!("{:x}", digest))?;
            Ok(())
        })
        .build_started()?;

    // Replies are pumped on this thread, the way a UI thread would.
    let replies = Arc::new(QueuedContext::new());
    let received = Arc::new(AtomicUsize::new(0));

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_for_handler = Arc::clone(&keep_running);
    ctrlc::set_handler(move || {
        keep_running_for_handler.store(false, Ordering::SeqCst);
    })?;

    // Every message replies, including the older duplicates that
    // CoalesceByCode drops while a newer message with the same code waits.
    let discarded = Arc::new(AtomicUsize::new(0));
    let start = std::time::Instant::now();
    for i in 0..num_messages {
        let received = Arc::clone(&received);
        let discarded = Arc::clone(&discarded);
        let message = Message::builder((i % CODES) as i32)
            .allow_async(i % 2 == 0)
            .allow_discard(true)
            .reply_when_discarded(true)
            .reply_to(replies.clone(), move |m: &Message| {
                let n = received.fetch_add(1, Ordering::Relaxed) + 1;
                if m.state() == MessageState::Discarded {
                    discarded.fetch_add(1, Ordering::Relaxed);
                } else if n % 100 == 0 {
                    let hash = m.reply_data().map(|d| String::from_utf8_lossy(&d).into_owned());
                    info!(uid = m.uid(), received = n, hash = ?hash, "reply");
                }
            })
            .build()?;
        message.set_request_data(format!("message_{}", i))?;
        processor.push_message(&message)?;
    }
    info!(num_messages, elapsed = ?start.elapsed(), "all messages pushed");

    while received.load(Ordering::Relaxed) < num_messages && keep_running.load(Ordering::SeqCst) {
        replies.pump_timeout(Duration::from_millis(100));
    }
    info!(
        received = received.load(Ordering::Relaxed),
        coalesced = discarded.load(Ordering::Relaxed),
        elapsed = ?start.elapsed(),
        "replies received"
    );

    if !auto_exit {
        println!("Press Ctrl+C to exit...");
        while keep_running.load(Ordering::SeqCst) {
            replies.pump_timeout(Duration::from_millis(100));
        }
    }

    let stopped = Arc::new(AtomicBool::new(false));
    let stopped_flag = Arc::clone(&stopped);
    processor.stop_with_callback(replies.clone(), move || {
        stopped_flag.store(true, Ordering::SeqCst);
    })?;
    while !stopped.load(Ordering::SeqCst) {
        replies.pump_timeout(Duration::from_millis(50));
    }

    info!(stats = ?processor.stats(), "processor stopped");
    Ok(())
}
