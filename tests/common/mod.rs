#![allow(dead_code)]

use dmxp_dispatch::{MessageQueue, ProcessorBuilder, Selection, SelectionPolicy};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Builder with short loop sleeps so tests do not idle.
pub fn fast_builder() -> ProcessorBuilder {
    ProcessorBuilder::new()
        .with_busy_sleep(Duration::from_micros(200))
        .with_idle_sleep(Duration::from_millis(1))
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// A one-shot latch handlers can block on.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    /// Blocks until opened. Panics after `WAIT` so a broken test fails
    /// instead of hanging.
    pub fn wait(&self) {
        let deadline = Instant::now() + WAIT;
        let mut open = self.open.lock();
        while !*open {
            if self.opened.wait_until(&mut open, deadline).timed_out() {
                panic!("gate was never opened");
            }
        }
    }
}

/// Discards a fixed set of uids on both lanes, takes everything else.
pub struct DiscardUids(pub HashSet<i64>);

impl SelectionPolicy for DiscardUids {
    fn select_async(&self, queue: &MessageQueue) -> Selection {
        Selection::all(queue).discard_many(self.0.iter().copied())
    }

    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        Selection::all(queue).discard_many(self.0.iter().copied())
    }
}

/// Takes nothing from the sync lane until released, then everything.
#[derive(Default)]
pub struct HoldSync {
    pub released: AtomicBool,
}

impl SelectionPolicy for HoldSync {
    fn select_sync(&self, queue: &MessageQueue) -> Selection {
        if self.released.load(Ordering::SeqCst) {
            Selection::all(queue)
        } else {
            Selection::take(0)
        }
    }
}
