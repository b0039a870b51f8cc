//! Procedural terrain: heightfield, cover obstacles and spawn zones.
//!
//! A map is generated once per round from a seed and never mutated. The same
//! seed and parameters always produce the same map.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::TerrainParams;

const OCTAVES: u32 = 3;
const SPAWN_ZONE_COUNT: usize = 8;

/// Static cylindrical obstacle standing on the terrain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverObstacle {
    /// Center of the footprint; `y` is the ground height at the center
    pub position: Vec3,
    pub radius: f32,
    pub height: f32,
}

impl CoverObstacle {
    pub fn new(position: Vec3, radius: f32, height: f32) -> Self {
        Self {
            position,
            radius,
            height,
        }
    }

    fn footprint(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    /// Whether `y` lies within the vertical extent of the obstacle
    pub fn spans_height(&self, y: f32) -> bool {
        y >= self.position.y && y <= self.position.y + self.height
    }

    /// Push-out for a circle of `radius` at `position` overlapping the footprint.
    /// Returns the outward ground-plane normal and the penetration depth.
    pub fn penetration(&self, position: Vec3, radius: f32) -> Option<(Vec3, f32)> {
        let offset = Vec2::new(position.x, position.z) - self.footprint();
        let min_distance = self.radius + radius;
        let distance_sq = offset.length_squared();
        if distance_sq >= min_distance * min_distance {
            return None;
        }

        let distance = distance_sq.sqrt();
        let normal = if distance > 1e-4 {
            offset / distance
        } else {
            Vec2::X
        };
        Some((Vec3::new(normal.x, 0.0, normal.y), min_distance - distance))
    }

    /// Swept test of the segment `from -> to` against the obstacle treated as
    /// an infinite vertical cylinder, gated by its vertical extent.
    /// Returns the segment parameter of the first contact in `[0, 1]`.
    pub fn sweep(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let start = Vec2::new(from.x, from.z) - self.footprint();
        let delta = Vec2::new(to.x - from.x, to.z - from.z);
        let r_sq = self.radius * self.radius;

        let t = if start.length_squared() <= r_sq {
            0.0
        } else {
            let a = delta.length_squared();
            if a <= f32::EPSILON {
                return None;
            }
            let b = 2.0 * start.dot(delta);
            let c = start.length_squared() - r_sq;
            let discriminant = b * b - 4.0 * a * c;
            if discriminant < 0.0 {
                return None;
            }
            let t = (-b - discriminant.sqrt()) / (2.0 * a);
            if !(0.0..=1.0).contains(&t) {
                return None;
            }
            t
        };

        let y = from.y + (to.y - from.y) * t;
        self.spans_height(y).then_some(t)
    }

    /// Whether the ground-plane segment `a -> b` crosses the footprint
    pub fn blocks_segment(&self, a: Vec3, b: Vec3) -> bool {
        let a = Vec2::new(a.x, a.z);
        let b = Vec2::new(b.x, b.z);
        let ab = b - a;
        let len_sq = ab.length_squared();
        let t = if len_sq <= f32::EPSILON {
            0.0
        } else {
            ((self.footprint() - a).dot(ab) / len_sq).clamp(0.0, 1.0)
        };
        (a + ab * t).distance_squared(self.footprint()) <= self.radius * self.radius
    }
}

/// Circular area combatants may spawn in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnZone {
    pub center: Vec3,
    pub radius: f32,
}

/// Advisory quality figures for a generated map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapReport {
    /// Share of adjacent sample pairs steeper than the slope limit
    pub slope_exceedance_ratio: f32,
    /// Worst-to-best ratio of per-zone mean distance to the other zones (1.0 = fair)
    pub spawn_fairness: f32,
}

/// Immutable terrain for one round
#[derive(Debug, Clone)]
pub struct TerrainMap {
    seed: u64,
    resolution: usize,
    half_size: f32,
    spacing: f32,
    max_height_step: f32,
    heights: Vec<f32>,
    covers: Vec<CoverObstacle>,
    spawn_zones: Vec<SpawnZone>,
}

impl TerrainMap {
    /// Generate a map from a seed
    pub fn generate(seed: u64, params: &TerrainParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let res = params.resolution;
        let samples = res + 1;
        let spacing = params.grid_spacing();
        let max_step = params.max_height_step();

        let mut heights = Vec::with_capacity(samples * samples);
        for j in 0..samples {
            for i in 0..samples {
                let noise = layered_noise(seed, i as f32, j as f32, params);

                let x = -params.half_size + i as f32 * spacing;
                let z = -params.half_size + j as f32 * spacing;
                let r = Vec2::new(x, z).length() / params.half_size;
                let t = (r / params.center_flat_radius.max(1e-3)).clamp(0.0, 1.0);
                let ramp = t * t * (3.0 - 2.0 * t);
                let attenuation = params.center_min_amplitude + (1.0 - params.center_min_amplitude) * ramp;

                let jitter = if params.perturbation > 0.0 {
                    rng.gen_range(-params.perturbation..=params.perturbation)
                } else {
                    0.0
                };
                heights.push(noise * attenuation + jitter);
            }
        }

        for _ in 0..params.relaxation_passes {
            relax(&mut heights, samples, max_step);
        }

        let mut map = Self {
            seed,
            resolution: res,
            half_size: params.half_size,
            spacing,
            max_height_step: max_step,
            heights,
            covers: Vec::new(),
            spawn_zones: Vec::new(),
        };

        let count = rng.gen_range(params.cover_count_min..=params.cover_count_max);
        let extent = (params.half_size - params.edge_margin).max(1.0);
        let covers: Vec<CoverObstacle> = (0..count)
            .map(|_| {
                let x = rng.gen_range(-extent..extent);
                let z = rng.gen_range(-extent..extent);
                let radius = rng.gen_range(params.cover_radius_min..=params.cover_radius_max);
                let height = rng.gen_range(params.cover_height_min..=params.cover_height_max);
                CoverObstacle::new(Vec3::new(x, map.height_at(x, z), z), radius, height)
            })
            .collect();
        map.covers = covers;

        map.spawn_zones = map.spawn_ring(params);
        map
    }

    /// Level map with the standard spawn ring and the given covers
    pub fn flat(params: &TerrainParams, covers: Vec<CoverObstacle>) -> Self {
        let samples = params.resolution + 1;
        let mut map = Self {
            seed: 0,
            resolution: params.resolution,
            half_size: params.half_size,
            spacing: params.grid_spacing(),
            max_height_step: params.max_height_step(),
            heights: vec![0.0; samples * samples],
            covers,
            spawn_zones: Vec::new(),
        };
        map.spawn_zones = map.spawn_ring(params);
        map
    }

    fn spawn_ring(&self, params: &TerrainParams) -> Vec<SpawnZone> {
        let ring = params.half_size * params.spawn_ring_fraction;
        (0..SPAWN_ZONE_COUNT)
            .map(|k| {
                let angle = k as f32 * TAU / SPAWN_ZONE_COUNT as f32;
                let (x, z) = (angle.sin() * ring, angle.cos() * ring);
                SpawnZone {
                    center: Vec3::new(x, self.height_at(x, z), z),
                    radius: params.spawn_zone_radius,
                }
            })
            .collect()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn covers(&self) -> &[CoverObstacle] {
        &self.covers
    }

    pub fn spawn_zones(&self) -> &[SpawnZone] {
        &self.spawn_zones
    }

    /// Bilinearly interpolated ground height; 0 outside the grid
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let gx = (x + self.half_size) / self.spacing;
        let gz = (z + self.half_size) / self.spacing;
        let max = self.resolution as f32;
        if !(gx >= 0.0 && gx <= max && gz >= 0.0 && gz <= max) {
            return 0.0;
        }

        let i = (gx.floor() as usize).min(self.resolution - 1);
        let j = (gz.floor() as usize).min(self.resolution - 1);
        let fx = gx - i as f32;
        let fz = gz - j as f32;

        let h00 = self.sample(i, j);
        let h10 = self.sample(i + 1, j);
        let h01 = self.sample(i, j + 1);
        let h11 = self.sample(i + 1, j + 1);

        let near = h00 + (h10 - h00) * fx;
        let far = h01 + (h11 - h01) * fx;
        near + (far - near) * fz
    }

    /// Surface normal from a central difference over one grid spacing
    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        let e = self.spacing;
        let dx = self.height_at(x - e, z) - self.height_at(x + e, z);
        let dz = self.height_at(x, z - e) - self.height_at(x, z + e);
        Vec3::new(dx, 2.0 * e, dz).normalize()
    }

    /// Clamp a ground position into the map, keeping `margin` from the edge
    pub fn clamp_to_bounds(&self, x: f32, z: f32, margin: f32) -> (f32, f32) {
        let bound = (self.half_size - margin).max(0.0);
        (x.clamp(-bound, bound), z.clamp(-bound, bound))
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        x.abs() <= self.half_size && z.abs() <= self.half_size
    }

    /// Whether any cover footprint lies on the ground segment `a -> b`
    pub fn segment_obstructed(&self, a: Vec3, b: Vec3) -> bool {
        self.covers.iter().any(|cover| cover.blocks_segment(a, b))
    }

    /// Slope and spawn fairness figures. Informational only: nothing rejects
    /// or regenerates a map based on them.
    pub fn validate(&self) -> MapReport {
        let samples = self.resolution + 1;
        let limit = self.max_height_step + 1e-4;
        let mut pairs = 0usize;
        let mut steep = 0usize;
        for j in 0..samples {
            for i in 0..samples {
                let h = self.sample(i, j);
                if i + 1 < samples {
                    pairs += 1;
                    steep += ((self.sample(i + 1, j) - h).abs() > limit) as usize;
                }
                if j + 1 < samples {
                    pairs += 1;
                    steep += ((self.sample(i, j + 1) - h).abs() > limit) as usize;
                }
            }
        }

        let means: Vec<f32> = self
            .spawn_zones
            .iter()
            .map(|zone| {
                let others = self.spawn_zones.len().saturating_sub(1).max(1) as f32;
                self.spawn_zones
                    .iter()
                    .map(|other| zone.center.distance(other.center))
                    .sum::<f32>()
                    / others
            })
            .collect();
        let best = means.iter().copied().fold(0.0f32, f32::max);
        let worst = means.iter().copied().fold(f32::INFINITY, f32::min);
        let spawn_fairness = if best > 0.0 { worst / best } else { 1.0 };

        MapReport {
            slope_exceedance_ratio: if pairs == 0 { 0.0 } else { steep as f32 / pairs as f32 },
            spawn_fairness,
        }
    }

    fn sample(&self, i: usize, j: usize) -> f32 {
        self.heights[j * (self.resolution + 1) + i]
    }
}

/// Pull every adjacent pair steeper than `max_step` halfway back to the limit
fn relax(heights: &mut [f32], samples: usize, max_step: f32) {
    let mut relax_pair = |a: usize, b: usize| {
        let delta = heights[b] - heights[a];
        let excess = delta.abs() - max_step;
        if excess > 0.0 {
            let shift = 0.25 * excess * delta.signum();
            heights[a] += shift;
            heights[b] -= shift;
        }
    };

    for j in 0..samples {
        for i in 0..samples {
            let idx = j * samples + i;
            if i + 1 < samples {
                relax_pair(idx, idx + 1);
            }
            if j + 1 < samples {
                relax_pair(idx, idx + samples);
            }
        }
    }
}

/// Sum of the seeded value-noise octaves at grid coordinates `(i, j)`
fn layered_noise(seed: u64, i: f32, j: f32, params: &TerrainParams) -> f32 {
    let mut total = 0.0;
    let mut amplitude = params.max_height;
    let mut lattice = params.base_lattice_cells.max(1) as f32;
    for octave in 0..OCTAVES {
        total += amplitude * value_noise(seed, octave, i / lattice, j / lattice);
        amplitude *= 0.5;
        lattice = (lattice * 0.5).max(1.0);
    }
    total
}

/// Bilinear interpolation of hashed lattice values, in `[0, 1)`
fn value_noise(seed: u64, octave: u32, u: f32, v: f32) -> f32 {
    let (iu, iv) = (u.floor(), v.floor());
    let (fu, fv) = (u - iu, v - iv);
    let (iu, iv) = (iu as i64, iv as i64);

    let v00 = lattice_value(seed, octave, iu, iv);
    let v10 = lattice_value(seed, octave, iu + 1, iv);
    let v01 = lattice_value(seed, octave, iu, iv + 1);
    let v11 = lattice_value(seed, octave, iu + 1, iv + 1);

    let near = v00 + (v10 - v00) * fu;
    let far = v01 + (v11 - v01) * fu;
    near + (far - near) * fv
}

fn lattice_value(seed: u64, octave: u32, x: i64, z: i64) -> f32 {
    let mut h = seed ^ (octave as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = splitmix64(h ^ (x as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    h = splitmix64(h ^ (z as u64).wrapping_mul(0x94D0_49BB_1331_11EB));
    (h >> 40) as f32 / (1u64 << 24) as f32
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn params() -> TerrainParams {
        GameConfig::default().terrain
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let a = TerrainMap::generate(42, &params());
        let b = TerrainMap::generate(42, &params());
        assert_eq!(a.heights(), b.heights());
        assert_eq!(a.covers(), b.covers());
        assert_eq!(a.spawn_zones(), b.spawn_zones());
    }

    #[test]
    fn different_seeds_differ_in_most_cells() {
        let a = TerrainMap::generate(1, &params());
        let b = TerrainMap::generate(2, &params());
        let differing = a
            .heights()
            .iter()
            .zip(b.heights())
            .filter(|(x, y)| x != y)
            .count();
        assert!(differing * 10 > a.heights().len() * 9);
    }

    #[test]
    fn cover_count_within_range() {
        let p = params();
        for seed in 0..20 {
            let map = TerrainMap::generate(seed, &p);
            let n = map.covers().len();
            assert!(n >= p.cover_count_min && n <= p.cover_count_max);
            for cover in map.covers() {
                assert!(map.contains(cover.position.x, cover.position.z));
            }
        }
    }

    #[test]
    fn spawn_ring_is_symmetric() {
        let p = params();
        let map = TerrainMap::generate(9, &p);
        assert_eq!(map.spawn_zones().len(), 8);
        let ring = p.half_size * p.spawn_ring_fraction;
        for zone in map.spawn_zones() {
            let r = Vec2::new(zone.center.x, zone.center.z).length();
            assert!((r - ring).abs() < 1e-3);
            assert_eq!(zone.radius, p.spawn_zone_radius);
        }
    }

    #[test]
    fn height_is_zero_outside_grid_and_exact_on_samples() {
        let p = params();
        let map = TerrainMap::generate(3, &p);
        assert_eq!(map.height_at(p.half_size + 1.0, 0.0), 0.0);
        assert_eq!(map.height_at(0.0, -p.half_size - 0.01), 0.0);
        assert_eq!(map.height_at(f32::NAN, 0.0), 0.0);

        let spacing = p.grid_spacing();
        let (i, j) = (17usize, 40usize);
        let x = -p.half_size + i as f32 * spacing;
        let z = -p.half_size + j as f32 * spacing;
        let expected = map.heights()[j * (p.resolution + 1) + i];
        assert!((map.height_at(x, z) - expected).abs() < 1e-4);
    }

    #[test]
    fn slopes_are_bounded() {
        let map = TerrainMap::generate(77, &params());
        let report = map.validate();
        assert!(report.slope_exceedance_ratio <= 0.01);
        assert!(report.spawn_fairness > 0.8 && report.spawn_fairness <= 1.0);
    }

    #[test]
    fn relaxation_halves_the_excess() {
        // 2x2 grid, both rows have a 10-unit step against a limit of 2
        let mut grid = vec![0.0, 10.0, 0.0, 10.0];
        relax(&mut grid, 2, 2.0);
        assert!((grid[1] - grid[0] - 6.0).abs() < 1e-5);
        assert!((grid[3] - grid[2] - 6.0).abs() < 1e-5);

        let mut gentle = vec![0.0, 1.0, 0.5, 1.5];
        relax(&mut gentle, 2, 2.0);
        assert_eq!(gentle, vec![0.0, 1.0, 0.5, 1.5]);
    }

    #[test]
    fn flat_map_normal_points_up() {
        let map = TerrainMap::flat(&params(), Vec::new());
        let n = map.normal_at(10.0, -20.0);
        assert!((n - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn sweep_catches_tunneling_through_thin_cover() {
        let cover = CoverObstacle::new(Vec3::ZERO, 1.0, 4.0);
        // Both endpoints are outside the cylinder, the segment crosses it
        let t = cover.sweep(Vec3::new(-5.0, 1.0, 0.0), Vec3::new(5.0, 1.0, 0.0));
        assert!(matches!(t, Some(t) if (t - 0.4).abs() < 1e-5));
        // Passing over the top is not a hit
        assert!(cover
            .sweep(Vec3::new(-5.0, 6.0, 0.0), Vec3::new(5.0, 6.0, 0.0))
            .is_none());
        // Missing sideways
        assert!(cover
            .sweep(Vec3::new(-5.0, 1.0, 2.0), Vec3::new(5.0, 1.0, 2.0))
            .is_none());
        // Stopping short
        assert!(cover
            .sweep(Vec3::new(-5.0, 1.0, 0.0), Vec3::new(-2.0, 1.0, 0.0))
            .is_none());
    }

    #[test]
    fn footprint_blocks_segments_that_cross_it() {
        let map = TerrainMap::flat(
            &params(),
            vec![CoverObstacle::new(Vec3::ZERO, 2.0, 3.0)],
        );
        assert!(map.segment_obstructed(Vec3::new(-10.0, 0.0, 0.5), Vec3::new(10.0, 0.0, 0.5)));
        assert!(!map.segment_obstructed(Vec3::new(-10.0, 0.0, 5.0), Vec3::new(10.0, 0.0, 5.0)));
    }

    #[test]
    fn penetration_pushes_along_contact_normal() {
        let cover = CoverObstacle::new(Vec3::ZERO, 2.0, 3.0);
        let (normal, depth) = cover
            .penetration(Vec3::new(3.0, 0.0, 0.0), 2.0)
            .expect("overlapping");
        assert!((normal - Vec3::X).length() < 1e-6);
        assert!((depth - 1.0).abs() < 1e-6);
        assert!(cover.penetration(Vec3::new(5.0, 0.0, 0.0), 2.0).is_none());
    }
}
