//! Snapshot cadence and public state views

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::combatant::{Combatant, CombatantId, Projectile, ProjectileId};

/// Public state of one combatant as broadcast to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantView {
    pub id: CombatantId,
    pub name: String,
    pub is_ai: bool,
    pub position: Vec3,
    pub body_yaw: f32,
    pub turret_yaw: f32,
    pub gun_pitch: f32,
    pub velocity: Vec3,
    pub health: f32,
    pub alive: bool,
    pub reload: f32,
    pub kills: u32,
    pub deaths: u32,
}

impl From<&Combatant> for CombatantView {
    fn from(c: &Combatant) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            is_ai: c.is_ai,
            position: c.tank.position,
            body_yaw: c.tank.body_yaw,
            turret_yaw: c.tank.turret_yaw,
            gun_pitch: c.tank.gun_pitch,
            velocity: c.tank.velocity,
            health: c.health,
            alive: c.alive,
            reload: c.reload,
            kills: c.stats.kills,
            deaths: c.stats.deaths,
        }
    }
}

/// Public state of a shell in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: ProjectileId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub ttl: f32,
}

impl From<&Projectile> for ProjectileView {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id,
            position: p.position,
            velocity: p.velocity,
            ttl: p.ttl,
        }
    }
}

/// Full world state for one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    /// Sequence of the recipient's most recently applied command
    pub last_processed_seq: u32,
    pub combatants: Vec<CombatantView>,
    pub projectiles: Vec<ProjectileView>,
    pub total: usize,
    pub humans: usize,
}

/// Decides which ticks carry a snapshot broadcast
#[derive(Debug)]
pub struct SnapshotBuilder {
    ticks_since_snapshot: u32,
    snapshot_interval: u32,
    next_id: u64,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            next_id: 1,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (round transitions)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Monotonic id for the broadcast about to go out
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
