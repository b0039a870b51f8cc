//! Discrete world events emitted by a tick, in emission order

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::combatant::{CombatantId, ProjectileId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorldEvent {
    /// Shell left the muzzle
    Fire {
        shooter_id: CombatantId,
        projectile_id: ProjectileId,
        muzzle_position: Vec3,
        direction: Vec3,
    },

    /// Shell struck a combatant directly
    Hit {
        projectile_id: ProjectileId,
        target_id: CombatantId,
        position: Vec3,
        damage: f32,
    },

    /// Shell detonated (after a hit or on terrain/cover)
    Explode {
        projectile_id: ProjectileId,
        position: Vec3,
        radius: f32,
    },

    /// Combatant destroyed
    Death {
        victim_id: CombatantId,
        killer_id: CombatantId,
        position: Vec3,
    },

    /// Combatant back in play
    Respawn {
        combatant_id: CombatantId,
        position: Vec3,
    },
}
