//! Combatant and projectile state owned by the world

use std::collections::VecDeque;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::TankStats;

use super::kinematics::{TankInput, TankState};

/// Room-scoped combatant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round-scoped projectile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectileId(pub u32);

/// One control command, as queued for the next tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingCommand {
    pub seq: u32,
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Desired turret yaw relative to the hull
    pub turret_yaw: f32,
    pub gun_pitch: f32,
    pub fire: bool,
    /// Client clock at send time, in milliseconds
    pub client_time: u64,
}

impl PendingCommand {
    pub fn tank_input(&self) -> TankInput {
        TankInput {
            forward: self.forward,
            backward: self.backward,
            left: self.left,
            right: self.right,
            turret_yaw: self.turret_yaw,
            gun_pitch: self.gun_pitch,
        }
    }

    /// The same command with the trigger released
    pub fn without_fire(&self) -> Self {
        Self { fire: false, ..*self }
    }
}

/// Cumulative per-round statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    pub kills: u32,
    pub deaths: u32,
    pub shots: u32,
    pub hits: u32,
}

/// Human or AI controlled tank (authoritative)
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub is_ai: bool,

    pub tank: TankState,
    pub health: f32,
    pub alive: bool,
    /// Seconds until the gun can fire again
    pub reload: f32,

    inputs: VecDeque<PendingCommand>,
    input_capacity: usize,
    pub last_command: PendingCommand,
    pub last_processed_seq: u32,

    pub stats: CombatStats,
    recent_spawns: VecDeque<Vec3>,
    spawn_history_len: usize,
}

impl Combatant {
    pub fn new(id: CombatantId, name: String, is_ai: bool, stats: &TankStats) -> Self {
        Self {
            id,
            name,
            is_ai,
            tank: TankState::default(),
            health: stats.max_health,
            alive: true,
            reload: 0.0,
            inputs: VecDeque::with_capacity(stats.input_queue_capacity),
            input_capacity: stats.input_queue_capacity,
            last_command: PendingCommand::default(),
            last_processed_seq: 0,
            stats: CombatStats::default(),
            recent_spawns: VecDeque::with_capacity(stats.spawn_history_len),
            spawn_history_len: stats.spawn_history_len,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.tank.position
    }

    /// Queue a command for a later tick. A full queue drops the new command
    /// and keeps the older ones.
    pub fn enqueue(&mut self, command: PendingCommand) -> bool {
        if self.inputs.len() >= self.input_capacity {
            return false;
        }
        self.inputs.push_back(command);
        true
    }

    pub fn queued_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Command to apply this tick.
    ///
    /// A queued command becomes the new last-applied command. With nothing
    /// queued the last-applied command is replayed with fire forced off, so a
    /// late or lost packet neither stops the tank nor keeps the gun firing.
    pub fn next_command(&mut self) -> PendingCommand {
        match self.inputs.pop_front() {
            Some(command) => {
                self.last_command = command;
                self.last_processed_seq = command.seq;
                command
            }
            None => self.last_command.without_fire(),
        }
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
        self.last_command = PendingCommand::default();
    }

    /// Place the tank at a fresh spawn point with full health
    pub fn respawn_at(&mut self, position: Vec3, body_yaw: f32, stats: &TankStats) {
        self.tank = TankState {
            position,
            body_yaw,
            ..TankState::default()
        };
        self.health = stats.max_health;
        self.alive = true;
        self.reload = 0.0;
        self.clear_inputs();

        if self.recent_spawns.len() >= self.spawn_history_len {
            self.recent_spawns.pop_front();
        }
        if self.spawn_history_len > 0 {
            self.recent_spawns.push_back(position);
        }
    }

    pub fn recent_spawns(&self) -> impl Iterator<Item = &Vec3> {
        self.recent_spawns.iter()
    }
}

/// Shell in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner_id: CombatantId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Seconds left before the shell expires
    pub ttl: f32,
    pub active: bool,
}
