// Plain state types shared by messages and processors

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sentinel for a timestamp that has not been stamped yet ("far future").
pub const TIME_UNSET: u64 = u64::MAX;

/// Lifecycle of a message.
///
/// `Created -> WaitingToProcess -> Processing -> ProcessCompleted | ProcessFailed`,
/// or `WaitingToProcess -> Discarded`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageState {
    Created,
    WaitingToProcess,
    Processing,
    ProcessCompleted,
    ProcessFailed,
    Discarded,
}

impl MessageState {
    /// True once the message can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted | Self::ProcessFailed | Self::Discarded
        )
    }

    /// Whether `self -> to` is one of the legal transitions.
    pub fn can_transition_to(self, to: MessageState) -> bool {
        use MessageState::*;
        matches!(
            (self, to),
            (Created, WaitingToProcess)
                | (WaitingToProcess, Processing)
                | (WaitingToProcess, Discarded)
                | (Processing, ProcessCompleted)
                | (Processing, ProcessFailed)
        )
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::WaitingToProcess => "WaitingToProcess",
            Self::Processing => "Processing",
            Self::ProcessCompleted => "ProcessCompleted",
            Self::ProcessFailed => "ProcessFailed",
            Self::Discarded => "Discarded",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessorState {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// The two queues a processor drains.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Executed on the worker pool; the loop does not wait.
    Async,
    /// Executed inline on the loop thread.
    Sync,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async => f.write_str("async"),
            Self::Sync => f.write_str("sync"),
        }
    }
}

/// Lifecycle timestamps in nanoseconds since the Unix epoch.
/// Fields hold [`TIME_UNSET`] until their transition happens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timestamps {
    pub create_ns: u64,
    pub request_ns: u64,
    pub process_start_ns: u64,
    pub process_finish_ns: u64,
    pub reply_ns: u64,
}

impl Timestamps {
    pub(crate) fn created_now() -> Self {
        Self {
            create_ns: now_ns(),
            request_ns: TIME_UNSET,
            process_start_ns: TIME_UNSET,
            process_finish_ns: TIME_UNSET,
            reply_ns: TIME_UNSET,
        }
    }

    pub fn create_time(&self) -> Option<SystemTime> {
        to_system_time(self.create_ns)
    }

    pub fn request_time(&self) -> Option<SystemTime> {
        to_system_time(self.request_ns)
    }

    pub fn process_start_time(&self) -> Option<SystemTime> {
        to_system_time(self.process_start_ns)
    }

    pub fn process_finish_time(&self) -> Option<SystemTime> {
        to_system_time(self.process_finish_ns)
    }

    pub fn reply_time(&self) -> Option<SystemTime> {
        to_system_time(self.reply_ns)
    }
}

pub(crate) fn now_ns() -> u64 {
    let ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // Never collide with the sentinel.
    ns.min(TIME_UNSET - 1)
}

fn to_system_time(ns: u64) -> Option<SystemTime> {
    if ns == TIME_UNSET {
        None
    } else {
        Some(UNIX_EPOCH + Duration::from_nanos(ns))
    }
}
