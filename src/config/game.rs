//! Simulation and balance constants.
//!
//! Everything a client needs to predict or render the simulation lives here
//! and is echoed back in the join acknowledgement. The struct is built once at
//! startup and shared as `Arc<GameConfig>`; nothing mutates it afterwards.

use serde::Serialize;

use crate::ai::AiDifficulty;

use super::{env_override, ConfigError};

/// Tick clock
#[derive(Debug, Clone, Serialize)]
pub struct TickConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshots broadcast per second
    pub snapshot_rate: u32,
}

impl TickConfig {
    /// Fixed simulation step in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Number of ticks between two snapshot broadcasts
    pub fn snapshot_interval_ticks(&self) -> u32 {
        (self.tick_rate / self.snapshot_rate.max(1)).max(1)
    }

    /// Convert a duration in seconds to a whole number of ticks, rounding up
    pub fn ticks_for(&self, secs: f32) -> u64 {
        (secs * self.tick_rate as f32).ceil().max(0.0) as u64
    }
}

/// Tank chassis, turret and gun limits
#[derive(Debug, Clone, Serialize)]
pub struct TankStats {
    /// Maximum ground speed (units/s)
    pub max_speed: f32,
    /// Forward thrust acceleration (units/s²)
    pub acceleration: f32,
    /// Reverse thrust as a fraction of forward thrust
    pub reverse_factor: f32,
    /// Per-tick velocity retention at the nominal tick rate
    pub damping: f32,
    /// Hull rotation speed (rad/s)
    pub body_turn_rate: f32,
    /// Turret traverse speed (rad/s)
    pub turret_turn_rate: f32,
    /// Turret traverse limit relative to the hull (rad)
    pub yaw_max: f32,
    /// Gun depression limit (rad, negative)
    pub pitch_min: f32,
    /// Gun elevation limit (rad)
    pub pitch_max: f32,
    /// Hull footprint radius for cover and tank collisions
    pub collision_radius: f32,
    /// Radius of the hit sphere used for projectile tests
    pub hit_radius: f32,
    /// Height of the hit sphere center above the ground contact
    pub hit_center_height: f32,
    /// Height of the turret pivot above the ground contact
    pub turret_height: f32,
    /// Distance from the turret pivot to the muzzle
    pub barrel_length: f32,
    pub max_health: f32,
    /// Pending commands kept per combatant before new input is dropped
    pub input_queue_capacity: usize,
    /// Recent spawn positions remembered per combatant
    pub spawn_history_len: usize,
}

/// Main gun and projectile ballistics
#[derive(Debug, Clone, Serialize)]
pub struct WeaponStats {
    /// Shell speed relative to the firing tank (units/s)
    pub muzzle_speed: f32,
    pub gravity: f32,
    /// Shell lifetime (seconds)
    pub projectile_ttl: f32,
    pub projectile_radius: f32,
    /// Seconds between shots
    pub reload_time: f32,
    pub direct_hit_damage: f32,
    pub splash_radius: f32,
    /// Fraction of direct-hit damage dealt at the center of a splash
    pub splash_factor: f32,
    /// Seconds a destroyed tank stays wrecked before respawning
    pub respawn_delay: f32,
}

/// Procedural terrain generation
#[derive(Debug, Clone, Serialize)]
pub struct TerrainParams {
    /// Grid cells per side; the heightfield has `resolution + 1` samples per side
    pub resolution: usize,
    /// The map spans `[-half_size, half_size]` on both ground axes
    pub half_size: f32,
    /// Amplitude of the first noise octave
    pub max_height: f32,
    /// Lattice spacing of the first octave, in grid cells
    pub base_lattice_cells: usize,
    /// Radius (fraction of half size) over which amplitude ramps up from the center
    pub center_flat_radius: f32,
    /// Amplitude multiplier at the exact center
    pub center_min_amplitude: f32,
    /// Bound of the per-cell random perturbation
    pub perturbation: f32,
    pub max_slope_deg: f32,
    pub relaxation_passes: usize,
    pub cover_count_min: usize,
    pub cover_count_max: usize,
    pub cover_radius_min: f32,
    pub cover_radius_max: f32,
    pub cover_height_min: f32,
    pub cover_height_max: f32,
    /// Distance of the spawn ring from the center (fraction of half size)
    pub spawn_ring_fraction: f32,
    pub spawn_zone_radius: f32,
    /// Keep-out band along the map edge for covers and spawns
    pub edge_margin: f32,
}

impl TerrainParams {
    /// Distance between adjacent height samples
    pub fn grid_spacing(&self) -> f32 {
        2.0 * self.half_size / self.resolution as f32
    }

    /// Largest allowed height delta between adjacent samples
    pub fn max_height_step(&self) -> f32 {
        self.max_slope_deg.to_radians().tan() * self.grid_spacing()
    }
}

/// Spawn point scoring
#[derive(Debug, Clone, Serialize)]
pub struct SpawnParams {
    /// Candidates generated per selection, spread over all zones
    pub candidates_total: usize,
    pub ideal_enemy_distance: f32,
    pub enemy_distance_sigma: f32,
    /// Enemies closer than this with a clear line count as threats
    pub danger_radius: f32,
    /// Covers within this radius contribute to the cover bonus
    pub cover_radius: f32,
    /// Width of the central band Gaussian (fraction of half size)
    pub central_band_sigma: f32,
    pub cooldown_radius: f32,
    /// Number of recent selections remembered for the cooldown
    pub history_len: usize,
    /// Best candidates kept for the final random pick
    pub top_k: usize,
    pub weight_distance: f32,
    pub weight_exposure: f32,
    pub weight_cover: f32,
    pub weight_center: f32,
    pub cooldown_penalty: f32,
}

/// Room lifecycle and admission rules
#[derive(Debug, Clone, Serialize)]
pub struct RoomRules {
    /// Combined human and AI ceiling
    pub capacity: usize,
    /// Humans needed to leave warm-up without AI present
    pub min_humans: usize,
    pub round_duration_secs: f32,
    /// First combatant reaching this many kills ends the round
    pub kill_limit: u32,
    pub round_end_delay_secs: f32,
    pub afk_check_interval_secs: f32,
    pub inactivity_timeout_secs: f32,
    /// Time an empty room is kept alive before teardown
    pub empty_grace_secs: f32,
    /// Capacity of the room request channel
    pub request_queue: usize,
    /// Capacity of each human's outbound message channel
    pub outbox_capacity: usize,
}

/// AI behavior constants shared by all difficulty presets
#[derive(Debug, Clone, Serialize)]
pub struct AiTuning {
    pub difficulty: AiDifficulty,
    pub patrol_refresh_secs: f32,
    pub patrol_arrive_distance: f32,
    pub stuck_check_secs: f32,
    pub stuck_distance: f32,
    /// Health fraction at or below which a close threat triggers retreat
    pub retreat_health_fraction: f32,
    pub retreat_threat_range: f32,
    /// Range within which a target is chased during the reaction hold
    pub awareness_range: f32,
    /// Aim error (rad) below which the fire delay starts counting
    pub aim_error_threshold: f32,
    /// Jitter (rad) applied at zero accuracy
    pub max_aim_jitter: f32,
    /// Preferred engagement band as fractions of the engage range
    pub band_min_fraction: f32,
    pub band_max_fraction: f32,
}

/// Complete constant set for one server process
#[derive(Debug, Clone, Serialize)]
pub struct GameConfig {
    pub tick: TickConfig,
    pub tank: TankStats,
    pub weapon: WeaponStats,
    pub terrain: TerrainParams,
    pub spawn: SpawnParams,
    pub room: RoomRules,
    pub ai: AiTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig {
                tick_rate: 60,
                snapshot_rate: 20,
            },
            tank: TankStats {
                max_speed: 12.0,
                acceleration: 18.0,
                reverse_factor: 0.6,
                damping: 0.98,
                body_turn_rate: 1.8,
                turret_turn_rate: 2.0,
                yaw_max: 120f32.to_radians(),
                pitch_min: -0.15,
                pitch_max: 0.4,
                collision_radius: 2.0,
                hit_radius: 2.2,
                hit_center_height: 1.0,
                turret_height: 1.6,
                barrel_length: 3.0,
                max_health: 100.0,
                input_queue_capacity: 8,
                spawn_history_len: 4,
            },
            weapon: WeaponStats {
                muzzle_speed: 60.0,
                gravity: 9.81,
                projectile_ttl: 4.0,
                projectile_radius: 0.3,
                reload_time: 1.5,
                direct_hit_damage: 35.0,
                splash_radius: 6.0,
                splash_factor: 0.5,
                respawn_delay: 3.0,
            },
            terrain: TerrainParams {
                resolution: 128,
                half_size: 100.0,
                max_height: 9.0,
                base_lattice_cells: 32,
                center_flat_radius: 0.4,
                center_min_amplitude: 0.2,
                perturbation: 0.12,
                max_slope_deg: 35.0,
                relaxation_passes: 4,
                cover_count_min: 10,
                cover_count_max: 18,
                cover_radius_min: 1.5,
                cover_radius_max: 3.5,
                cover_height_min: 2.5,
                cover_height_max: 5.0,
                spawn_ring_fraction: 0.8,
                spawn_zone_radius: 12.0,
                edge_margin: 4.0,
            },
            spawn: SpawnParams {
                candidates_total: 48,
                ideal_enemy_distance: 45.0,
                enemy_distance_sigma: 20.0,
                danger_radius: 30.0,
                cover_radius: 12.0,
                central_band_sigma: 0.5,
                cooldown_radius: 15.0,
                history_len: 4,
                top_k: 3,
                weight_distance: 3.0,
                weight_exposure: 2.0,
                weight_cover: 1.0,
                weight_center: 1.0,
                cooldown_penalty: 1000.0,
            },
            room: RoomRules {
                capacity: 8,
                min_humans: 2,
                round_duration_secs: 300.0,
                kill_limit: 20,
                round_end_delay_secs: 8.0,
                afk_check_interval_secs: 1.0,
                inactivity_timeout_secs: 60.0,
                empty_grace_secs: 30.0,
                request_queue: 256,
                outbox_capacity: 128,
            },
            ai: AiTuning {
                difficulty: AiDifficulty::Normal,
                patrol_refresh_secs: 8.0,
                patrol_arrive_distance: 5.0,
                stuck_check_secs: 1.5,
                stuck_distance: 0.5,
                retreat_health_fraction: 0.3,
                retreat_threat_range: 25.0,
                awareness_range: 90.0,
                aim_error_threshold: 0.035,
                max_aim_jitter: 0.08,
                band_min_fraction: 0.5,
                band_max_fraction: 0.85,
            },
        }
    }
}

impl GameConfig {
    /// Defaults with the supported environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(rate) = env_override::<u32>("TICK_RATE")? {
            config.tick.tick_rate = rate;
        }
        if let Some(rate) = env_override::<u32>("SNAPSHOT_RATE")? {
            config.tick.snapshot_rate = rate;
        }
        if let Some(capacity) = env_override::<usize>("ROOM_CAPACITY")? {
            config.room.capacity = capacity;
        }
        if let Some(min) = env_override::<usize>("MIN_HUMANS")? {
            config.room.min_humans = min;
        }
        if let Some(difficulty) = env_override::<AiDifficulty>("AI_DIFFICULTY")? {
            config.ai.difficulty = difficulty;
        }
        if let Some(secs) = env_override::<f32>("INACTIVITY_TIMEOUT_SECS")? {
            config.room.inactivity_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.tick_rate == 0 {
            return Err(ConfigError::Inconsistent("tick rate must be positive"));
        }
        if self.tick.snapshot_rate == 0 || self.tick.snapshot_rate > self.tick.tick_rate {
            return Err(ConfigError::Inconsistent(
                "snapshot rate must be between 1 and the tick rate",
            ));
        }
        if self.room.capacity == 0 {
            return Err(ConfigError::Inconsistent("room capacity must be positive"));
        }
        if self.tank.pitch_min > self.tank.pitch_max {
            return Err(ConfigError::Inconsistent("gun pitch range is inverted"));
        }
        if self.terrain.cover_count_min > self.terrain.cover_count_max {
            return Err(ConfigError::Inconsistent("cover count range is inverted"));
        }
        if self.spawn.top_k == 0 || self.spawn.candidates_total == 0 {
            return Err(ConfigError::Inconsistent("spawn selection needs candidates"));
        }
        Ok(())
    }
}
