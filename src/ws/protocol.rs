//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::{CombatantId, PendingCommand, WorldEvent, WorldSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to join a room
    Join {
        name: String,
        /// Opaque id that survives reconnects
        #[serde(default)]
        client_id: Option<String>,
    },

    /// Control state for the next tick
    Input {
        seq: u32,
        #[serde(default)]
        forward: bool,
        #[serde(default)]
        backward: bool,
        #[serde(default)]
        left: bool,
        #[serde(default)]
        right: bool,
        /// Desired turret yaw relative to the hull (radians)
        turret_yaw: f32,
        gun_pitch: f32,
        #[serde(default)]
        fire: bool,
        /// Camera stabilization, only meaningful to the renderer
        #[serde(default)]
        stabilize: bool,
        /// Client timestamp (ms)
        #[serde(default)]
        t: u64,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the current room
    Leave,
}

impl ClientMsg {
    /// Command form of an input message
    pub fn to_command(&self) -> Option<PendingCommand> {
        match *self {
            Self::Input {
                seq,
                forward,
                backward,
                left,
                right,
                turret_yaw,
                gun_pitch,
                fire,
                t,
                ..
            } => Some(PendingCommand {
                seq,
                forward,
                backward,
                left,
                right,
                turret_yaw,
                gun_pitch,
                fire,
                client_time: t,
            }),
            _ => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Confirmation of room join
    Joined {
        room_id: Uuid,
        combatant_id: CombatantId,
        /// Seed of the active terrain
        seed: u64,
        /// Every tick and balance constant the server runs with
        config: GameConfig,
    },

    /// Join refused
    Rejected {
        reason: String,
    },

    /// Someone entered the room
    PlayerJoined {
        combatant_id: CombatantId,
        name: String,
        is_ai: bool,
    },

    /// Someone left the room
    PlayerLeft {
        combatant_id: CombatantId,
        name: String,
        is_ai: bool,
    },

    /// Full world state (sent at the snapshot rate)
    Snapshot {
        snapshot_id: u64,
        server_time: u64,
        #[serde(flatten)]
        state: WorldSnapshot,
    },

    /// One discrete world event, relayed the tick it happened
    Event {
        tick: u64,
        #[serde(flatten)]
        event: WorldEvent,
    },

    /// A round began on the given terrain
    RoundStarted {
        round: u32,
        seed: u64,
        duration_secs: f32,
    },

    /// Round over; a new one starts after `restart_in_secs`
    RoundEnd {
        round: u32,
        scoreboard: Vec<ScoreEntry>,
        restart_in_secs: f32,
    },

    /// Sent immediately before the server removes this client
    Kicked {
        reason: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },
}

/// One scoreboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub combatant_id: CombatantId,
    pub name: String,
    pub is_ai: bool,
    pub kills: u32,
    pub deaths: u32,
    pub hits: u32,
    pub shots: u32,
}
