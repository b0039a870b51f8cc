//! Append-only session records

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game::{CombatStats, CombatantId};
use crate::room::LeaveReason;
use crate::ws::protocol::ScoreEntry;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum SessionRecord {
    /// A human entered a room
    SessionStarted {
        room_id: Uuid,
        combatant_id: CombatantId,
        name: String,
        client_id: Option<String>,
        at: DateTime<Utc>,
    },

    /// A human left a room, with what they achieved in the current round
    SessionEnded {
        room_id: Uuid,
        combatant_id: CombatantId,
        name: String,
        reason: LeaveReason,
        stats: CombatStats,
        at: DateTime<Utc>,
    },

    /// A round reached its end condition
    RoundFinished {
        room_id: Uuid,
        round: u32,
        scoreboard: Vec<ScoreEntry>,
        at: DateTime<Utc>,
    },
}

impl SessionRecord {
    pub fn session_started(
        room_id: Uuid,
        combatant_id: CombatantId,
        name: &str,
        client_id: Option<String>,
    ) -> Self {
        Self::SessionStarted {
            room_id,
            combatant_id,
            name: name.to_string(),
            client_id,
            at: Utc::now(),
        }
    }

    pub fn session_ended(
        room_id: Uuid,
        combatant_id: CombatantId,
        name: &str,
        reason: LeaveReason,
        stats: CombatStats,
    ) -> Self {
        Self::SessionEnded {
            room_id,
            combatant_id,
            name: name.to_string(),
            reason,
            stats,
            at: Utc::now(),
        }
    }

    pub fn round_finished(room_id: Uuid, round: u32, scoreboard: Vec<ScoreEntry>) -> Self {
        Self::RoundFinished {
            room_id,
            round,
            scoreboard,
            at: Utc::now(),
        }
    }

    /// Tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded { .. } => "session_ended",
            Self::RoundFinished { .. } => "round_finished",
        }
    }
}
