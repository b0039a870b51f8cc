//! Tank and projectile kinematics.
//!
//! Stateless functions shared by the world simulator and the AI. The ground
//! plane is X/Z with +Y up; a yaw of zero faces +Z and positive yaw turns
//! toward +X.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::config::{TankStats, WeaponStats};

/// Physical state of one tank
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TankState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Hull heading in radians
    pub body_yaw: f32,
    /// Turret traverse relative to the hull
    pub turret_yaw: f32,
    pub gun_pitch: f32,
}

/// Control input for one integration step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TankInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Desired turret yaw relative to the hull
    pub turret_yaw: f32,
    pub gun_pitch: f32,
}

/// Unit vector along the hull heading
pub fn forward_vector(body_yaw: f32) -> Vec3 {
    Vec3::new(body_yaw.sin(), 0.0, body_yaw.cos())
}

/// Unit vector along the gun barrel
pub fn barrel_direction(body_yaw: f32, turret_yaw: f32, gun_pitch: f32) -> Vec3 {
    let yaw = body_yaw + turret_yaw;
    let (sin_p, cos_p) = gun_pitch.sin_cos();
    Vec3::new(cos_p * yaw.sin(), sin_p, cos_p * yaw.cos())
}

/// Advance a tank by `dt` seconds.
///
/// Turret yaw is clamped to the traverse limit and then rate limited, gun
/// pitch is clamped without a rate limit. Damping is applied as
/// `damping^(dt * tick_rate)` so the result does not depend on step size.
pub fn integrate_tank(
    state: &TankState,
    input: &TankInput,
    dt: f32,
    stats: &TankStats,
    tick_rate: u32,
    height_at: Option<&dyn Fn(f32, f32) -> f32>,
) -> TankState {
    let mut next = *state;

    let turn = (input.left as i8 - input.right as i8) as f32;
    next.body_yaw = wrap_angle(state.body_yaw + turn * stats.body_turn_rate * dt);

    // Non-finite targets leave the turret and gun where they are
    if input.turret_yaw.is_finite() {
        let target = input.turret_yaw.clamp(-stats.yaw_max, stats.yaw_max);
        next.turret_yaw = step_toward(state.turret_yaw, target, stats.turret_turn_rate * dt);
    }
    next.turret_yaw = next.turret_yaw.clamp(-stats.yaw_max, stats.yaw_max);

    if input.gun_pitch.is_finite() {
        next.gun_pitch = input.gun_pitch;
    }
    next.gun_pitch = next.gun_pitch.clamp(stats.pitch_min, stats.pitch_max);

    let heading = forward_vector(next.body_yaw);
    let mut velocity = state.velocity;
    if input.forward && !input.backward {
        velocity += heading * stats.acceleration * dt;
    } else if input.backward && !input.forward {
        velocity -= heading * stats.acceleration * stats.reverse_factor * dt;
    }

    velocity *= stats.damping.powf(dt * tick_rate as f32);
    velocity.y = 0.0;
    velocity = velocity.clamp_length_max(stats.max_speed);

    next.velocity = velocity;
    next.position = state.position + velocity * dt;
    if let Some(height_at) = height_at {
        next.position.y = height_at(next.position.x, next.position.z);
    }

    next
}

/// Ballistic step without drag: gravity first, then position
pub fn integrate_projectile(position: Vec3, velocity: Vec3, dt: f32, gravity: f32) -> (Vec3, Vec3) {
    let mut velocity = velocity;
    velocity.y -= gravity * dt;
    (position + velocity * dt, velocity)
}

/// World position of the gun muzzle
pub fn muzzle_position(state: &TankState, stats: &TankStats) -> Vec3 {
    let pivot = state.position + Vec3::Y * stats.turret_height;
    pivot + barrel_direction(state.body_yaw, state.turret_yaw, state.gun_pitch) * stats.barrel_length
}

/// Shell velocity at launch, inheriting the firer's motion
pub fn muzzle_velocity(state: &TankState, weapon: &WeaponStats) -> Vec3 {
    barrel_direction(state.body_yaw, state.turret_yaw, state.gun_pitch) * weapon.muzzle_speed
        + state.velocity
}

/// Gun elevation that compensates for drop over a flat-fire flight time
pub fn ballistic_elevation(horizontal: f32, vertical: f32, muzzle_speed: f32, gravity: f32) -> f32 {
    let flight_time = horizontal / muzzle_speed;
    (vertical + 0.5 * gravity * flight_time * flight_time).atan2(horizontal)
}

/// Splash damage at `target` from a detonation at `hit`
pub fn splash_damage(hit: Vec3, target: Vec3, weapon: &WeaponStats) -> f32 {
    let distance = hit.distance(target);
    if distance >= weapon.splash_radius {
        return 0.0;
    }
    let falloff = 1.0 - distance / weapon.splash_radius;
    weapon.direct_hit_damage * weapon.splash_factor * falloff
}

/// Sphere overlap test, inclusive at the combined radius
pub fn sphere_hit(a: Vec3, radius_a: f32, b: Vec3, radius_b: f32) -> bool {
    let combined = radius_a + radius_b;
    a.distance_squared(b) <= combined * combined
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Move `current` toward `target` along the shortest arc by at most `max_step`
pub fn step_toward_angle(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = wrap_angle(target - current);
    if diff.abs() <= max_step {
        wrap_angle(target)
    } else {
        wrap_angle(current + diff.signum() * max_step)
    }
}

/// Shortest-arc interpolation between two angles
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    wrap_angle(from + wrap_angle(to - from) * t)
}

/// Move a scalar toward a target by at most `max_step`
pub fn step_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = target - current;
    if diff.abs() <= max_step {
        target
    } else {
        current + diff.signum() * max_step
    }
}
