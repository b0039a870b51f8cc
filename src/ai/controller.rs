//! Behavior state machine for one AI tank.
//!
//! Each tick the controller reads the world, picks the nearest live target,
//! settles on one of four states and emits the command a human client would
//! have sent. Commands go through the same queue as human input.

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::{AiTuning, GameConfig};
use crate::game::kinematics::{ballistic_elevation, step_toward, step_toward_angle, wrap_angle};
use crate::game::{Combatant, CombatantId, PendingCommand, World};

use super::difficulty::{AiDifficulty, DifficultyProfile};

/// Heading error (rad) under which the hull drives instead of turning in place
const DRIVE_ARC: f32 = 1.2;
/// Heading error (rad) tolerated without steering
const STEER_DEADBAND: f32 = 0.08;
/// Seconds between steering noise draws
const WANDER_PERIOD: f32 = 1.0;
/// Fraction of the turret traverse past which the hull turns toward the target
const ARC_MARGIN: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    /// No target: roam between random points
    Patrol,
    /// Target known but out of range, or still reacting
    Chase,
    /// Target in range: hold distance, aim and fire
    Engage,
    /// Low health with a threat close by
    Retreat,
}

/// Input synthesizer for one computer-controlled combatant
#[derive(Debug)]
pub struct AiController {
    id: CombatantId,
    profile: DifficultyProfile,
    tuning: AiTuning,
    state: AiState,

    target: Option<CombatantId>,
    reaction_left: f32,

    patrol_point: Option<Vec2>,
    patrol_timer: f32,
    stuck_timer: f32,
    stuck_anchor: Vec3,
    wander: f32,
    wander_timer: f32,

    aim_yaw: f32,
    aim_pitch: f32,
    on_target_for: f32,

    seq: u32,
    rng: ChaCha8Rng,
}

/// Intermediate drive and aim decision for one tick
#[derive(Debug, Default)]
struct Steering {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    fire: bool,
}

impl AiController {
    pub fn new(id: CombatantId, difficulty: AiDifficulty, tuning: &AiTuning, seed: u64) -> Self {
        Self {
            id,
            profile: difficulty.profile(),
            tuning: tuning.clone(),
            state: AiState::Patrol,
            target: None,
            reaction_left: 0.0,
            patrol_point: None,
            patrol_timer: 0.0,
            stuck_timer: 0.0,
            stuck_anchor: Vec3::ZERO,
            wander: 0.0,
            wander_timer: 0.0,
            aim_yaw: 0.0,
            aim_pitch: 0.0,
            on_target_for: 0.0,
            seq: 0,
            rng: ChaCha8Rng::seed_from_u64(seed ^ u64::from(id.0)),
        }
    }

    pub fn id(&self) -> CombatantId {
        self.id
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn target(&self) -> Option<CombatantId> {
        self.target
    }

    /// Decide this tick's command. `None` while the tank is destroyed or gone.
    pub fn think(&mut self, world: &World, config: &GameConfig) -> Option<PendingCommand> {
        let me = world.combatant(self.id)?;
        if !me.alive {
            self.target = None;
            self.on_target_for = 0.0;
            self.state = AiState::Patrol;
            return None;
        }
        let dt = config.tick.dt();

        let target = nearest_target(world, me);
        self.update_target(target.map(|t| t.id));
        self.reaction_left = (self.reaction_left - dt).max(0.0);
        self.state = self.choose_state(me, target, config);
        self.check_stuck(me, dt);

        let steering = match (self.state, target) {
            (AiState::Engage, Some(target)) => self.engage(me, target, config, dt),
            (AiState::Retreat, Some(target)) => self.retreat(me, target, config, dt),
            (AiState::Chase, Some(target)) => {
                self.track(me, target, config, dt);
                self.on_target_for = 0.0;
                self.drive_toward(me, ground(target.position()), dt)
            }
            _ => self.patrol(me, world, dt),
        };

        self.seq = self.seq.wrapping_add(1);
        Some(PendingCommand {
            seq: self.seq,
            forward: steering.forward,
            backward: steering.backward,
            left: steering.left,
            right: steering.right,
            turret_yaw: self.jittered(self.aim_yaw),
            gun_pitch: self.jittered(self.aim_pitch),
            fire: steering.fire,
            client_time: 0,
        })
    }

    fn update_target(&mut self, target: Option<CombatantId>) {
        if target != self.target {
            if target.is_some() {
                self.reaction_left = self.profile.reaction_time;
            }
            self.target = target;
            self.on_target_for = 0.0;
        }
    }

    fn choose_state(&self, me: &Combatant, target: Option<&Combatant>, config: &GameConfig) -> AiState {
        let Some(target) = target else {
            return AiState::Patrol;
        };
        let distance = ground(me.position()).distance(ground(target.position()));

        let health_fraction = me.health / config.tank.max_health;
        if health_fraction <= self.tuning.retreat_health_fraction && distance <= self.tuning.retreat_threat_range {
            return AiState::Retreat;
        }

        // Still reacting: never engage yet
        if self.reaction_left > 0.0 {
            return if distance <= self.tuning.awareness_range {
                AiState::Chase
            } else {
                AiState::Patrol
            };
        }

        if distance <= self.profile.engage_range {
            AiState::Engage
        } else {
            AiState::Chase
        }
    }

    /// Near-zero displacement over the check window while not fighting
    /// forces a fresh patrol point
    fn check_stuck(&mut self, me: &Combatant, dt: f32) {
        self.stuck_timer += dt;
        if self.stuck_timer < self.tuning.stuck_check_secs {
            return;
        }
        let moved = ground(me.position()).distance(ground(self.stuck_anchor));
        if self.state != AiState::Engage && moved < self.tuning.stuck_distance {
            self.patrol_point = None;
            self.wander = self.rng.gen_range(-1.0..1.0);
        }
        self.stuck_timer = 0.0;
        self.stuck_anchor = me.position();
    }

    fn patrol(&mut self, me: &Combatant, world: &World, dt: f32) -> Steering {
        self.patrol_timer -= dt;
        self.on_target_for = 0.0;
        self.aim_yaw = step_toward_angle(self.aim_yaw, 0.0, self.profile.aim_speed * dt);
        self.aim_pitch = step_toward(self.aim_pitch, 0.0, self.profile.aim_speed * dt);

        let position = ground(me.position());
        let arrived = self
            .patrol_point
            .map_or(true, |p| p.distance(position) <= self.tuning.patrol_arrive_distance);
        if arrived || self.patrol_timer <= 0.0 {
            let terrain = world.terrain();
            let reach = terrain.half_size() * 0.8;
            self.patrol_point = Some(Vec2::new(
                self.rng.gen_range(-reach..reach),
                self.rng.gen_range(-reach..reach),
            ));
            self.patrol_timer = self.tuning.patrol_refresh_secs;
        }

        match self.patrol_point {
            Some(point) => self.drive_toward(me, point, dt),
            None => Steering::default(),
        }
    }

    fn engage(&mut self, me: &Combatant, target: &Combatant, config: &GameConfig, dt: f32) -> Steering {
        let distance = ground(me.position()).distance(ground(target.position()));
        let band_min = self.profile.engage_range * self.tuning.band_min_fraction;
        let band_max = self.profile.engage_range * self.tuning.band_max_fraction;

        let mut steering = Steering {
            forward: distance > band_max,
            backward: distance < band_min,
            ..Steering::default()
        };

        // Bring a target outside the turret arc back in range
        let relative = wrap_angle(bearing(me.position(), target.position()) - me.tank.body_yaw);
        if relative.abs() > config.tank.yaw_max * ARC_MARGIN {
            steering.left = relative > 0.0;
            steering.right = relative < 0.0;
        }

        steering.fire = self.track(me, target, config, dt);
        steering
    }

    fn retreat(&mut self, me: &Combatant, threat: &Combatant, config: &GameConfig, dt: f32) -> Steering {
        let away = ground(me.position()) - ground(threat.position());
        let away = if away.length_squared() > 1e-6 { away.normalize() } else { Vec2::X };
        let goal = ground(me.position()) + away * self.tuning.retreat_threat_range;

        let mut steering = self.drive_toward(me, goal, dt);
        steering.fire = self.track(me, threat, config, dt);
        steering
    }

    /// Move the aim toward the ballistic solution; true once the gun has
    /// been on target for the fire delay and is loaded
    fn track(&mut self, me: &Combatant, target: &Combatant, config: &GameConfig, dt: f32) -> bool {
        let (yaw, pitch) = aim_solution(me, target, config);
        let step = self.profile.aim_speed * dt;
        self.aim_yaw = step_toward_angle(self.aim_yaw, yaw, step);
        self.aim_pitch = step_toward(self.aim_pitch, pitch, step);

        let error = wrap_angle(me.tank.turret_yaw - yaw)
            .abs()
            .max((me.tank.gun_pitch - pitch).abs());
        if error < self.tuning.aim_error_threshold {
            self.on_target_for += dt;
        } else {
            self.on_target_for = 0.0;
        }

        let ready = self.state != AiState::Chase
            && self.on_target_for >= self.profile.fire_delay
            && me.reload <= 0.0;
        if ready {
            self.on_target_for = 0.0;
        }
        ready
    }

    fn drive_toward(&mut self, me: &Combatant, point: Vec2, dt: f32) -> Steering {
        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.wander = self.rng.gen_range(-1.0..1.0);
            self.wander_timer = WANDER_PERIOD;
        }

        let offset = point - ground(me.position());
        if offset.length_squared() < 1e-4 {
            return Steering::default();
        }
        let desired = offset.x.atan2(offset.y) + self.wander * self.profile.randomness;
        let error = wrap_angle(desired - me.tank.body_yaw);

        Steering {
            forward: error.abs() < DRIVE_ARC,
            left: error > STEER_DEADBAND,
            right: error < -STEER_DEADBAND,
            ..Steering::default()
        }
    }

    fn jittered(&mut self, angle: f32) -> f32 {
        let spread = self.tuning.max_aim_jitter * (1.0 - self.profile.accuracy);
        if spread <= 0.0 {
            return angle;
        }
        angle + self.rng.gen_range(-spread..spread)
    }
}

/// Turret yaw (relative to the hull, clamped to the traverse) and gun pitch
/// that put a shell on `target`, compensating for drop over the flight time
pub fn aim_solution(me: &Combatant, target: &Combatant, config: &GameConfig) -> (f32, f32) {
    let tank = &config.tank;
    let relative = wrap_angle(bearing(me.position(), target.position()) - me.tank.body_yaw);
    let yaw = relative.clamp(-tank.yaw_max, tank.yaw_max);

    let horizontal = ground(me.position()).distance(ground(target.position()));
    let vertical = (target.position().y + tank.hit_center_height) - (me.position().y + tank.turret_height);
    let pitch = ballistic_elevation(
        horizontal.max(1e-3),
        vertical,
        config.weapon.muzzle_speed,
        config.weapon.gravity,
    )
    .clamp(tank.pitch_min, tank.pitch_max);

    (yaw, pitch)
}

fn nearest_target<'w>(world: &'w World, me: &Combatant) -> Option<&'w Combatant> {
    let here = ground(me.position());
    world
        .combatants()
        .filter(|c| c.alive && c.id != me.id)
        .min_by(|a, b| {
            let da = ground(a.position()).distance_squared(here);
            let db = ground(b.position()).distance_squared(here);
            da.total_cmp(&db)
        })
}

fn bearing(from: Vec3, to: Vec3) -> f32 {
    (to.x - from.x).atan2(to.z - from.z)
}

fn ground(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}
