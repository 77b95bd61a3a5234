// Error types shared by messages and processors

use crate::Dispatch::Structs::{Lane, MessageState, ProcessorState};

/// Broad classification of a [`DispatchError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A bad argument: empty payload, missing reply target.
    Argument,
    /// An operation attempted from the wrong lifecycle state.
    State,
    /// A selection policy produced output the processor cannot honor.
    Policy,
    /// The handler was never supplied or the loop thread could not start.
    Runtime,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("message with code {code} requests a reply but is missing a sender or callback")]
    MissingReplyTarget { code: i32 },

    #[error("{field} must not be empty")]
    EmptyPayload { field: &'static str },

    #[error("{field} can only be set while the message is {expected}, but it is {actual}")]
    PayloadState {
        field: &'static str,
        expected: MessageState,
        actual: MessageState,
    },

    #[error("cannot {operation}: processor must be {expected}, but it is {actual}")]
    ProcessorState {
        operation: &'static str,
        expected: ProcessorState,
        actual: ProcessorState,
    },

    #[error("message {uid} cannot be queued from state {state}")]
    AlreadyQueued { uid: i64, state: MessageState },

    #[error("selection for the {lane} lane returned a negative process count ({count})")]
    InvalidSelection { lane: Lane, count: i64 },

    #[error("process_message is not implemented for this processor")]
    NotImplemented,

    #[error("failed to spawn the message loop thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingReplyTarget { .. } | Self::EmptyPayload { .. } => ErrorKind::Argument,
            Self::PayloadState { .. } | Self::ProcessorState { .. } | Self::AlreadyQueued { .. } => {
                ErrorKind::State
            }
            Self::InvalidSelection { .. } => ErrorKind::Policy,
            Self::NotImplemented | Self::Spawn(_) => ErrorKind::Runtime,
        }
    }

    /// True for argument and state violations surfaced straight to the caller.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Argument | ErrorKind::State)
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
