//! Game simulation modules

pub mod combatant;
pub mod events;
pub mod kinematics;
pub mod snapshot;
pub mod spawn;
pub mod terrain;
pub mod world;

pub use combatant::{CombatStats, Combatant, CombatantId, PendingCommand, Projectile, ProjectileId};
pub use events::WorldEvent;
pub use snapshot::{CombatantView, ProjectileView, SnapshotBuilder, WorldSnapshot};
pub use spawn::{SpawnPoint, SpawnSelector};
pub use terrain::{CoverObstacle, TerrainMap};
pub use world::World;
