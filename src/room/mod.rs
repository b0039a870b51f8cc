//! Rooms: lifecycle scheduling, the tick driver and the registry

pub mod driver;
pub mod registry;
pub mod scheduler;

pub use driver::{RoomHandle, RoomRequest};
pub use registry::{RoomRegistry, RoomSummary};
pub use scheduler::{JoinAccepted, Room, RoomPhase};

use serde::Serialize;
use uuid::Uuid;

use crate::game::CombatantId;

pub type RoomId = Uuid;

/// Why a combatant left a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// Client asked to leave
    Left,
    /// Socket closed
    Disconnected,
    /// No input within the inactivity timeout
    Inactive,
    /// Same client id joined again
    Superseded,
    /// Room torn down
    RoomClosed,
}

impl LeaveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Disconnected => "disconnected",
            Self::Inactive => "inactive",
            Self::Superseded => "superseded",
            Self::RoomClosed => "room_closed",
        }
    }
}

/// Join errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room is full")]
    RoomFull,

    #[error("Room is closed")]
    RoomClosed,
}

/// Input errors; the command is dropped and the previous one keeps replaying
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Malformed input: {0}")]
    Malformed(&'static str),

    #[error("Unknown combatant: {0}")]
    UnknownCombatant(CombatantId),

    #[error("Input queue full")]
    QueueFull,
}
