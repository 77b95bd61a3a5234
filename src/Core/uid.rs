// Message identity generation

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::sync::Arc;

/// Lowest uid handed out by the process-wide generator.
pub const DEFAULT_UID_FLOOR: i64 = 1;

lazy_static! {
    static ref GLOBAL_UIDS: Arc<UidGenerator> = Arc::new(UidGenerator::new());
}

/// Hands out strictly increasing message uids under its own lock.
///
/// When the next value would overflow `i64::MAX` the sequence restarts at
/// the floor. Uids identify messages (discard sets, logs); they are not a
/// logical clock.
#[derive(Debug)]
pub struct UidGenerator {
    floor: i64,
    next: Mutex<i64>,
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl UidGenerator {
    pub fn new() -> Self {
        Self::with_floor(DEFAULT_UID_FLOOR)
    }

    pub fn with_floor(floor: i64) -> Self {
        Self::starting_at(floor, floor)
    }

    /// Generator whose first uid is `start`. Values below the floor are
    /// raised to it.
    pub fn starting_at(floor: i64, start: i64) -> Self {
        Self {
            floor,
            next: Mutex::new(start.max(floor)),
        }
    }

    /// The shared generator used by messages that are not given one.
    pub fn global() -> Arc<UidGenerator> {
        Arc::clone(&GLOBAL_UIDS)
    }

    pub fn floor(&self) -> i64 {
        self.floor
    }

    pub fn next_uid(&self) -> i64 {
        let mut next = self.next.lock();
        let uid = *next;
        *next = match uid.checked_add(1) {
            Some(n) => n,
            None => self.floor,
        };
        uid
    }

    /// The uid the next call to `next_uid` will return.
    pub fn peek(&self) -> i64 {
        *self.next.lock()
    }
}
