//! Authoritative world simulation.
//!
//! One `tick` advances every combatant and projectile by the fixed step in a
//! fixed order: input and movement, tank collisions, projectile flight,
//! hit detection, projectile purge, respawns, reload timers.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use crate::config::GameConfig;

use super::combatant::{Combatant, CombatantId, PendingCommand, Projectile, ProjectileId};
use super::events::WorldEvent;
use super::kinematics::{
    barrel_direction, integrate_projectile, integrate_tank, muzzle_position, muzzle_velocity,
    sphere_hit, splash_damage, TankState,
};
use super::snapshot::{CombatantView, ProjectileView, WorldSnapshot};
use super::spawn::SpawnSelector;
use super::terrain::TerrainMap;

/// Mixed into the round seed so spawn picks do not mirror terrain draws
const SPAWN_SEED_SALT: u64 = 0x5EED_5BA7_0000_0001;

#[derive(Debug, Clone, Copy)]
struct PendingRespawn {
    id: CombatantId,
    due_tick: u64,
}

/// Owns all combatant and projectile state for one room
pub struct World {
    config: Arc<GameConfig>,
    terrain: TerrainMap,
    spawner: SpawnSelector,
    combatants: BTreeMap<CombatantId, Combatant>,
    projectiles: Vec<Projectile>,
    respawns: Vec<PendingRespawn>,
    next_projectile_id: u32,
    tick: u64,
}

impl World {
    /// Create a world on freshly generated terrain
    pub fn new(config: Arc<GameConfig>, seed: u64) -> Self {
        let terrain = TerrainMap::generate(seed, &config.terrain);
        log_map(&terrain);
        Self::with_terrain(config, terrain, seed)
    }

    /// Create a world on a prepared map
    pub fn with_terrain(config: Arc<GameConfig>, terrain: TerrainMap, seed: u64) -> Self {
        let spawner = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, seed ^ SPAWN_SEED_SALT);
        Self {
            config,
            terrain,
            spawner,
            combatants: BTreeMap::new(),
            projectiles: Vec::new(),
            respawns: Vec::new(),
            next_projectile_id: 0,
            tick: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn terrain(&self) -> &TerrainMap {
        &self.terrain
    }

    pub fn seed(&self) -> u64 {
        self.terrain.seed()
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    /// Direct access for scripted scenarios
    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn human_count(&self) -> usize {
        self.combatants.values().filter(|c| !c.is_ai).count()
    }

    /// Add a combatant at a selected spawn point
    pub fn add_combatant(&mut self, id: CombatantId, name: String, is_ai: bool) -> Vec3 {
        debug_assert!(!self.combatants.contains_key(&id), "combatant {id} added twice");

        let mut combatant = Combatant::new(id, name, is_ai, &self.config.tank);
        let enemies = self.live_positions_except(id);
        let point = self.spawner.select_spawn_point(&combatant, &enemies, &self.terrain);
        combatant.respawn_at(point.position, point.body_yaw, &self.config.tank);
        self.combatants.insert(id, combatant);
        point.position
    }

    /// Remove a combatant together with its pending respawn and its shells
    pub fn remove_combatant(&mut self, id: CombatantId) -> Option<Combatant> {
        let removed = self.combatants.remove(&id)?;
        self.respawns.retain(|r| r.id != id);
        self.projectiles.retain(|p| p.owner_id != id);
        Some(removed)
    }

    /// Append a command to a combatant's queue; false when dropped
    pub fn enqueue_input(&mut self, id: CombatantId, command: PendingCommand) -> bool {
        self.combatants
            .get_mut(&id)
            .map(|c| c.enqueue(command))
            .unwrap_or(false)
    }

    /// Teleport a combatant, snapping it to the ground and stopping it
    pub fn place_combatant(&mut self, id: CombatantId, x: f32, z: f32, body_yaw: f32) {
        let y = self.terrain.height_at(x, z);
        if let Some(c) = self.combatants.get_mut(&id) {
            c.tank = TankState {
                position: Vec3::new(x, y, z),
                body_yaw,
                ..c.tank
            };
            c.tank.velocity = Vec3::ZERO;
        }
    }

    /// Positions of live combatants other than `id`
    pub fn live_positions_except(&self, id: CombatantId) -> Vec<Vec3> {
        self.combatants
            .values()
            .filter(|c| c.alive && c.id != id)
            .map(|c| c.tank.position)
            .collect()
    }

    /// Advance the simulation by one fixed step and return the events in order
    pub fn tick(&mut self) -> Vec<WorldEvent> {
        self.tick += 1;
        let mut events = Vec::new();

        self.step_combatants(&mut events);
        self.resolve_tank_collisions();
        self.step_projectiles(&mut events);
        self.resolve_direct_hits(&mut events);
        self.projectiles.retain(|p| p.active);
        self.process_respawns(&mut events);
        self.advance_reloads();

        events
    }

    /// Start a new round on new terrain: shells cleared, stats zeroed,
    /// everyone respawned at full health
    pub fn reset(&mut self, seed: u64) {
        self.terrain = TerrainMap::generate(seed, &self.config.terrain);
        log_map(&self.terrain);
        self.spawner.reset();
        self.projectiles.clear();
        self.respawns.clear();
        self.next_projectile_id = 0;

        let mut placed: Vec<Vec3> = Vec::with_capacity(self.combatants.len());
        for combatant in self.combatants.values_mut() {
            combatant.stats = Default::default();
            let point = self
                .spawner
                .select_spawn_point(combatant, &placed, &self.terrain);
            combatant.respawn_at(point.position, point.body_yaw, &self.config.tank);
            placed.push(point.position);
        }
    }

    /// Zero every combatant's round statistics
    pub fn reset_stats(&mut self) {
        for combatant in self.combatants.values_mut() {
            combatant.stats = Default::default();
        }
    }

    /// Full public state as seen by `requester`
    pub fn snapshot(&self, requester: Option<CombatantId>) -> WorldSnapshot {
        let combatants: Vec<CombatantView> = self.combatants.values().map(CombatantView::from).collect();
        let projectiles: Vec<ProjectileView> = self
            .projectiles
            .iter()
            .filter(|p| p.active)
            .map(ProjectileView::from)
            .collect();

        WorldSnapshot {
            tick: self.tick,
            last_processed_seq: requester
                .and_then(|id| self.combatants.get(&id))
                .map(|c| c.last_processed_seq)
                .unwrap_or(0),
            total: combatants.len(),
            humans: self.human_count(),
            combatants,
            projectiles,
        }
    }

    // ------------------------------------------------------------------
    // Tick phases
    // ------------------------------------------------------------------

    fn step_combatants(&mut self, events: &mut Vec<WorldEvent>) {
        let dt = self.config.tick.dt();
        let tick_rate = self.config.tick.tick_rate;
        let stats = &self.config.tank;
        let weapon = &self.config.weapon;
        let terrain = &self.terrain;

        for combatant in self.combatants.values_mut() {
            if !combatant.alive {
                continue;
            }

            let command = combatant.next_command();
            let mut tank = integrate_tank(&combatant.tank, &command.tank_input(), dt, stats, tick_rate, None);
            push_out_of_cover(&mut tank, terrain, stats.collision_radius);
            clamp_to_map(&mut tank, terrain, stats.collision_radius);
            tank.position.y = terrain.height_at(tank.position.x, tank.position.z);
            combatant.tank = tank;

            debug_assert!(tank.turret_yaw.abs() <= stats.yaw_max + 1e-5);
            debug_assert!(tank.gun_pitch >= stats.pitch_min && tank.gun_pitch <= stats.pitch_max);

            if command.fire && combatant.reload <= 0.0 {
                let projectile_id = ProjectileId(self.next_projectile_id);
                self.next_projectile_id += 1;

                let muzzle = muzzle_position(&tank, stats);
                self.projectiles.push(Projectile {
                    id: projectile_id,
                    owner_id: combatant.id,
                    position: muzzle,
                    velocity: muzzle_velocity(&tank, weapon),
                    ttl: weapon.projectile_ttl,
                    active: true,
                });
                combatant.reload = weapon.reload_time;
                combatant.stats.shots += 1;

                events.push(WorldEvent::Fire {
                    shooter_id: combatant.id,
                    projectile_id,
                    muzzle_position: muzzle,
                    direction: barrel_direction(tank.body_yaw, tank.turret_yaw, tank.gun_pitch),
                });
            }
        }
    }

    fn resolve_tank_collisions(&mut self) {
        let radius = self.config.tank.collision_radius;
        let min_distance = 2.0 * radius;

        let mut bodies: Vec<(CombatantId, TankState)> = self
            .combatants
            .values()
            .filter(|c| c.alive)
            .map(|c| (c.id, c.tank))
            .collect();

        let mut touched = false;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let mut delta = bodies[j].1.position - bodies[i].1.position;
                delta.y = 0.0;
                let distance_sq = delta.length_squared();
                if distance_sq >= min_distance * min_distance {
                    continue;
                }

                let distance = distance_sq.sqrt();
                let normal = if distance > 1e-4 { delta / distance } else { Vec3::X };
                let push = normal * (min_distance - distance) * 0.5;

                let a = &mut bodies[i].1;
                a.position -= push;
                let closing = a.velocity.dot(normal);
                if closing > 0.0 {
                    a.velocity -= normal * closing;
                }

                let b = &mut bodies[j].1;
                b.position += push;
                let closing = b.velocity.dot(normal);
                if closing < 0.0 {
                    b.velocity -= normal * closing;
                }
                touched = true;
            }
        }

        if !touched {
            return;
        }
        for (id, mut tank) in bodies {
            clamp_to_map(&mut tank, &self.terrain, radius);
            tank.position.y = self.terrain.height_at(tank.position.x, tank.position.z);
            if let Some(c) = self.combatants.get_mut(&id) {
                c.tank = tank;
            }
        }
    }

    /// Move shells; swept test against cover, point test against the ground
    fn step_projectiles(&mut self, events: &mut Vec<WorldEvent>) {
        let dt = self.config.tick.dt();
        let gravity = self.config.weapon.gravity;
        let mut impacts: Vec<(ProjectileId, CombatantId, Vec3)> = Vec::new();

        for projectile in self.projectiles.iter_mut().filter(|p| p.active) {
            let from = projectile.position;
            let (to, velocity) = integrate_projectile(from, projectile.velocity, dt, gravity);
            projectile.velocity = velocity;
            projectile.ttl -= dt;

            let cover_hit = self
                .terrain
                .covers()
                .iter()
                .filter_map(|cover| cover.sweep(from, to))
                .min_by(|a, b| a.total_cmp(b));
            if let Some(t) = cover_hit {
                projectile.position = from.lerp(to, t);
                projectile.active = false;
                impacts.push((projectile.id, projectile.owner_id, projectile.position));
                continue;
            }

            projectile.position = to;
            let ground = self.terrain.height_at(to.x, to.z);
            if to.y <= ground {
                projectile.position.y = ground;
                projectile.active = false;
                impacts.push((projectile.id, projectile.owner_id, projectile.position));
                continue;
            }

            if projectile.ttl <= 0.0 {
                projectile.active = false;
            }
        }

        for (projectile_id, owner_id, position) in impacts {
            self.detonate(projectile_id, owner_id, position, None, events);
        }
    }

    /// Sphere test of every live shell against live non-owner combatants;
    /// the first combatant in id order takes the hit
    fn resolve_direct_hits(&mut self, events: &mut Vec<WorldEvent>) {
        let shell_radius = self.config.weapon.projectile_radius;
        let hit_radius = self.config.tank.hit_radius;
        let center = Vec3::Y * self.config.tank.hit_center_height;
        let damage = self.config.weapon.direct_hit_damage;

        for index in 0..self.projectiles.len() {
            let projectile = &self.projectiles[index];
            if !projectile.active {
                continue;
            }
            let (projectile_id, owner_id, position) = (projectile.id, projectile.owner_id, projectile.position);

            let target = self
                .combatants
                .values()
                .filter(|c| c.alive && c.id != owner_id)
                .find(|c| sphere_hit(position, shell_radius, c.tank.position + center, hit_radius))
                .map(|c| c.id);
            let Some(target_id) = target else {
                continue;
            };

            self.projectiles[index].active = false;
            if let Some(shooter) = self.combatants.get_mut(&owner_id) {
                shooter.stats.hits += 1;
            }
            events.push(WorldEvent::Hit {
                projectile_id,
                target_id,
                position,
                damage,
            });
            self.apply_damage(target_id, damage, owner_id, events);
            self.detonate(projectile_id, owner_id, position, Some(target_id), events);
        }
    }

    /// Explosion with splash to every live combatant except the shooter and
    /// the directly hit target
    fn detonate(
        &mut self,
        projectile_id: ProjectileId,
        owner_id: CombatantId,
        position: Vec3,
        direct_target: Option<CombatantId>,
        events: &mut Vec<WorldEvent>,
    ) {
        let weapon = &self.config.weapon;
        let center = Vec3::Y * self.config.tank.hit_center_height;
        events.push(WorldEvent::Explode {
            projectile_id,
            position,
            radius: weapon.splash_radius,
        });

        let victims: Vec<(CombatantId, f32)> = self
            .combatants
            .values()
            .filter(|c| c.alive && c.id != owner_id && Some(c.id) != direct_target)
            .map(|c| (c.id, splash_damage(position, c.tank.position + center, weapon)))
            .filter(|(_, damage)| *damage > 0.0)
            .collect();

        for (victim, damage) in victims {
            self.apply_damage(victim, damage, owner_id, events);
        }
    }

    fn apply_damage(
        &mut self,
        target_id: CombatantId,
        damage: f32,
        killer_id: CombatantId,
        events: &mut Vec<WorldEvent>,
    ) {
        let Some(victim) = self.combatants.get_mut(&target_id) else {
            debug_assert!(false, "damage applied to removed combatant {target_id}");
            return;
        };
        if !victim.alive {
            return;
        }

        victim.health = (victim.health - damage).max(0.0);
        if victim.health > 0.0 {
            return;
        }

        victim.alive = false;
        victim.tank.velocity = Vec3::ZERO;
        victim.stats.deaths += 1;
        victim.clear_inputs();
        let position = victim.tank.position;

        if killer_id != target_id {
            match self.combatants.get_mut(&killer_id) {
                Some(killer) => killer.stats.kills += 1,
                None => debug_assert!(false, "kill credited to removed combatant {killer_id}"),
            }
        }

        events.push(WorldEvent::Death {
            victim_id: target_id,
            killer_id,
            position,
        });
        self.respawns.push(PendingRespawn {
            id: target_id,
            due_tick: self.tick + self.config.tick.ticks_for(self.config.weapon.respawn_delay),
        });
    }

    fn process_respawns(&mut self, events: &mut Vec<WorldEvent>) {
        let now = self.tick;
        let (due, waiting): (Vec<PendingRespawn>, Vec<PendingRespawn>) =
            self.respawns.iter().partition(|r| r.due_tick <= now);
        self.respawns = waiting;

        for pending in due {
            let enemies = self.live_positions_except(pending.id);
            let Some(combatant) = self.combatants.get_mut(&pending.id) else {
                continue;
            };
            let point = self
                .spawner
                .select_spawn_point(combatant, &enemies, &self.terrain);
            combatant.respawn_at(point.position, point.body_yaw, &self.config.tank);

            events.push(WorldEvent::Respawn {
                combatant_id: pending.id,
                position: point.position,
            });
        }
    }

    fn advance_reloads(&mut self) {
        let dt = self.config.tick.dt();
        for combatant in self.combatants.values_mut() {
            combatant.reload = (combatant.reload - dt).max(0.0);
        }
    }
}

/// Cylinder-versus-footprint push-out, cancelling velocity into the cover
fn push_out_of_cover(tank: &mut TankState, terrain: &TerrainMap, radius: f32) {
    for cover in terrain.covers() {
        if tank.position.y > cover.position.y + cover.height {
            continue;
        }
        if let Some((normal, depth)) = cover.penetration(tank.position, radius) {
            tank.position += normal * depth;
            let into = tank.velocity.dot(normal);
            if into < 0.0 {
                tank.velocity -= normal * into;
            }
        }
    }
}

/// Keep the hull inside the map, cancelling outward velocity
fn clamp_to_map(tank: &mut TankState, terrain: &TerrainMap, radius: f32) {
    let bound = terrain.half_size() - radius;
    if tank.position.x > bound {
        tank.position.x = bound;
        tank.velocity.x = tank.velocity.x.min(0.0);
    } else if tank.position.x < -bound {
        tank.position.x = -bound;
        tank.velocity.x = tank.velocity.x.max(0.0);
    }
    if tank.position.z > bound {
        tank.position.z = bound;
        tank.velocity.z = tank.velocity.z.min(0.0);
    } else if tank.position.z < -bound {
        tank.position.z = -bound;
        tank.velocity.z = tank.velocity.z.max(0.0);
    }
}

fn log_map(terrain: &TerrainMap) {
    let report = terrain.validate();
    debug!(
        seed = terrain.seed(),
        covers = terrain.covers().len(),
        slope_exceedance = report.slope_exceedance_ratio,
        spawn_fairness = report.spawn_fairness,
        "Terrain generated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::terrain::CoverObstacle;

    const SHOOTER: CombatantId = CombatantId(1);
    const TARGET: CombatantId = CombatantId(2);

    fn flat_world(covers: Vec<CoverObstacle>) -> World {
        let config = Arc::new(GameConfig::default());
        let terrain = TerrainMap::flat(&config.terrain, covers);
        World::with_terrain(config, terrain, 7)
    }

    /// Shooter at the origin facing +Z, target straight ahead
    fn duel(distance: f32, covers: Vec<CoverObstacle>) -> World {
        let mut world = flat_world(covers);
        world.add_combatant(SHOOTER, "shooter".into(), false);
        world.add_combatant(TARGET, "target".into(), false);
        world.place_combatant(SHOOTER, 0.0, 0.0, 0.0);
        world.place_combatant(TARGET, 0.0, distance, 0.0);
        world
    }

    fn fire(seq: u32) -> PendingCommand {
        PendingCommand {
            seq,
            fire: true,
            ..PendingCommand::default()
        }
    }

    #[test]
    fn lethal_damage_takes_exact_number_of_direct_hits() {
        let mut world = duel(15.0, Vec::new());
        let config = GameConfig::default();
        let expected = (config.tank.max_health / config.weapon.direct_hit_damage).ceil() as usize;

        let mut hits = 0;
        let mut deaths = 0;
        let mut seq = 0;
        for _ in 0..2_000 {
            let shooter = world.combatant(SHOOTER).unwrap();
            if shooter.reload <= 0.0 && shooter.queued_inputs() == 0 {
                seq += 1;
                world.enqueue_input(SHOOTER, fire(seq));
            }
            for event in world.tick() {
                match event {
                    WorldEvent::Hit { target_id, .. } if target_id == TARGET => hits += 1,
                    WorldEvent::Death { victim_id, killer_id, .. } => {
                        assert_eq!(victim_id, TARGET);
                        assert_eq!(killer_id, SHOOTER);
                        deaths += 1;
                    }
                    _ => {}
                }
            }
            let target = world.combatant(TARGET).unwrap();
            assert!(target.health >= 0.0);
            if deaths > 0 {
                break;
            }
        }

        assert_eq!(hits, expected);
        assert_eq!(deaths, 1);
        assert_eq!(world.combatant(SHOOTER).unwrap().stats.kills, 1);
        assert_eq!(world.combatant(TARGET).unwrap().stats.deaths, 1);
        assert!(!world.combatant(TARGET).unwrap().alive);
    }

    #[test]
    fn victim_respawns_at_full_health_after_delay() {
        let mut world = duel(15.0, Vec::new());
        let config = GameConfig::default();
        let delay_ticks = config.tick.ticks_for(config.weapon.respawn_delay);

        let mut death_tick = None;
        let mut seq = 0;
        while death_tick.is_none() && world.tick_count() < 2_000 {
            let shooter = world.combatant(SHOOTER).unwrap();
            if shooter.reload <= 0.0 && shooter.queued_inputs() == 0 {
                seq += 1;
                world.enqueue_input(SHOOTER, fire(seq));
            }
            if world.tick().iter().any(|e| matches!(e, WorldEvent::Death { .. })) {
                death_tick = Some(world.tick_count());
            }
        }
        let death_tick = death_tick.expect("target destroyed");

        let mut respawns = 0;
        while world.tick_count() < death_tick + delay_ticks + 5 {
            let events = world.tick();
            let target = world.combatant(TARGET).unwrap();
            if world.tick_count() < death_tick + delay_ticks {
                assert!(!target.alive, "respawned early at tick {}", world.tick_count());
            }
            for event in events {
                if let WorldEvent::Respawn { combatant_id, .. } = event {
                    assert_eq!(combatant_id, TARGET);
                    assert!(world.tick_count() >= death_tick + delay_ticks);
                    respawns += 1;
                }
            }
        }

        let target = world.combatant(TARGET).unwrap();
        assert_eq!(respawns, 1);
        assert!(target.alive);
        assert_eq!(target.health, config.tank.max_health);
    }

    #[test]
    fn missing_input_does_not_keep_firing() {
        let mut world = duel(30.0, Vec::new());
        world.enqueue_input(
            SHOOTER,
            PendingCommand {
                seq: 1,
                forward: true,
                fire: true,
                ..PendingCommand::default()
            },
        );

        let mut fires = 0;
        for _ in 0..200 {
            fires += world
                .tick()
                .iter()
                .filter(|e| matches!(e, WorldEvent::Fire { .. }))
                .count();
        }
        assert_eq!(fires, 1);
        // Movement kept replaying
        assert!(world.combatant(SHOOTER).unwrap().position().z > 5.0);
    }

    #[test]
    fn thin_cover_stops_shells_between_ticks() {
        let mut world = duel(15.0, vec![CoverObstacle::new(Vec3::new(0.0, 0.0, 8.0), 0.3, 4.0)]);
        world.enqueue_input(SHOOTER, fire(1));

        let mut exploded = false;
        for _ in 0..120 {
            for event in world.tick() {
                assert!(!matches!(event, WorldEvent::Hit { .. }), "shell tunneled through cover");
                if let WorldEvent::Explode { position, .. } = event {
                    assert!(position.z < 8.0);
                    exploded = true;
                }
            }
        }
        assert!(exploded);
        assert_eq!(world.combatant(TARGET).unwrap().health, GameConfig::default().tank.max_health);
    }

    #[test]
    fn splash_spares_shooter_and_direct_target() {
        let mut world = duel(15.0, Vec::new());
        world.add_combatant(CombatantId(3), "bystander".into(), false);
        world.place_combatant(CombatantId(3), 4.5, 15.0, 0.0);
        world.enqueue_input(SHOOTER, fire(1));

        let mut hit = false;
        for _ in 0..60 {
            hit |= world.tick().iter().any(|e| matches!(e, WorldEvent::Hit { .. }));
        }
        assert!(hit);

        let config = GameConfig::default();
        let target = world.combatant(TARGET).unwrap();
        let bystander = world.combatant(CombatantId(3)).unwrap();
        assert_eq!(target.health, config.tank.max_health - config.weapon.direct_hit_damage);
        assert!(bystander.health < config.tank.max_health);
        assert_eq!(world.combatant(SHOOTER).unwrap().health, config.tank.max_health);
    }

    #[test]
    fn tanks_cannot_overlap() {
        let mut world = duel(1.0, Vec::new());
        world.tick();
        let a = world.combatant(SHOOTER).unwrap().position();
        let b = world.combatant(TARGET).unwrap().position();
        let radius = GameConfig::default().tank.collision_radius;
        assert!(a.distance(b) >= 2.0 * radius - 1e-3);
    }

    #[test]
    fn wrecks_do_not_collide() {
        let mut world = duel(1.0, Vec::new());
        world.combatants.get_mut(&TARGET).unwrap().alive = false;
        let before = world.combatant(TARGET).unwrap().position();
        world.tick();
        assert_eq!(world.combatant(TARGET).unwrap().position(), before);
        assert_eq!(world.combatant(SHOOTER).unwrap().position(), Vec3::ZERO);
    }

    #[test]
    fn cover_pushes_tanks_out() {
        let mut world = flat_world(vec![CoverObstacle::new(Vec3::new(0.0, 0.0, 6.0), 2.0, 3.0)]);
        world.add_combatant(SHOOTER, "driver".into(), false);
        world.place_combatant(SHOOTER, 0.0, 0.0, 0.0);
        world.enqueue_input(
            SHOOTER,
            PendingCommand {
                seq: 1,
                forward: true,
                ..PendingCommand::default()
            },
        );

        let min = 2.0 + GameConfig::default().tank.collision_radius;
        for _ in 0..300 {
            world.tick();
            let p = world.combatant(SHOOTER).unwrap().position();
            let d = glam::Vec2::new(p.x, p.z - 6.0).length();
            assert!(d >= min - 1e-3, "inside cover footprint at distance {d}");
        }
    }

    #[test]
    fn map_edge_clamps_position_and_outward_velocity() {
        let mut world = flat_world(Vec::new());
        world.add_combatant(SHOOTER, "runner".into(), false);
        let config = GameConfig::default();
        let bound = config.terrain.half_size - config.tank.collision_radius;
        world.place_combatant(SHOOTER, 0.0, bound - 1.0, 0.0);
        world.enqueue_input(
            SHOOTER,
            PendingCommand {
                seq: 1,
                forward: true,
                ..PendingCommand::default()
            },
        );

        for _ in 0..240 {
            world.tick();
        }
        let c = world.combatant(SHOOTER).unwrap();
        assert!((c.position().z - bound).abs() < 1e-4);
        assert!(c.tank.velocity.z <= 0.0);
    }

    #[test]
    fn snapshot_reports_requester_sequence_and_counts() {
        let mut world = duel(20.0, Vec::new());
        world.add_combatant(CombatantId(3), "bot".into(), true);
        world.enqueue_input(
            SHOOTER,
            PendingCommand {
                seq: 41,
                ..PendingCommand::default()
            },
        );
        world.tick();

        let snapshot = world.snapshot(Some(SHOOTER));
        assert_eq!(snapshot.last_processed_seq, 41);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.humans, 2);
        assert_eq!(world.snapshot(Some(TARGET)).last_processed_seq, 0);
        assert_eq!(world.snapshot(None).last_processed_seq, 0);
    }

    #[test]
    fn reset_zeroes_stats_and_changes_terrain() {
        let mut world = duel(15.0, Vec::new());
        world.enqueue_input(SHOOTER, fire(1));
        for _ in 0..30 {
            world.tick();
        }
        assert_eq!(world.combatant(SHOOTER).unwrap().stats.shots, 1);

        world.reset(1234);
        assert_eq!(world.seed(), 1234);
        assert!(world.projectiles().is_empty());
        for c in world.combatants() {
            assert_eq!(c.stats, Default::default());
            assert!(c.alive);
            assert_eq!(c.health, GameConfig::default().tank.max_health);
        }
    }
}
