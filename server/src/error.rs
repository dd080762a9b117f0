//! Error taxonomy of the lobby core.

use crate::game::types::RoomStatus;
use crate::protocol::ActionKind;

/// Synchronous rule violations, returned to the acting client only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("player is already in a room")]
    AlreadyInRoom,
    #[error("player is not in this room")]
    UserNotInRoom,
    #[error("no empty seats")]
    NoEmptySeats,
    #[error("not allowed while the room is {0}")]
    InvalidState(RoomStatus),
    #[error("invalid seat {0}")]
    InvalidSeat(usize),
    #[error("invalid room options: {0}")]
    InvalidOptions(String),
    #[error("wrong room password")]
    WrongPassword,

    #[error("game not started")]
    GameNotStarted,
    #[error("no rerolls remaining")]
    NoRerollsRemaining,
    #[error("no champion left to roll")]
    RollFailed,
    #[error("champion {0} is not available")]
    InvalidChampion(u32),
    #[error("champion {0} is not owned")]
    ChampionNotOwned(u32),
}

/// Failures of one execution phase. None of them outlive the room pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("{kind} failed for {target}: {detail}")]
    RemoteActionFailed {
        kind: ActionKind,
        target: String,
        detail: String,
    },
    #[error("{kind} timed out for {target}")]
    RemoteActionTimeout { kind: ActionKind, target: String },
    #[error("{target} disconnected during {kind}")]
    RemoteActionDisconnected { kind: ActionKind, target: String },
    #[error("unreadable {kind} reply from {target}: {detail}")]
    BadReply {
        kind: ActionKind,
        target: String,
        detail: String,
    },
    #[error("no game result received")]
    NoResult,
    #[error("stopped by player")]
    PipelineCancelled,
}

impl ExecError {
    /// Failures worth re-sending the request for.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::RemoteActionFailed { .. }
                | ExecError::RemoteActionTimeout { .. }
                | ExecError::BadReply { .. }
        )
    }
}
