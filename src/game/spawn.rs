//! Spawn point selection.
//!
//! Candidates are scattered over every spawn zone and scored for distance to
//! the nearest enemy, exposure to close enemies, nearby cover, closeness to
//! the center band and recent use. One of the best few is picked at random so
//! a single best spot cannot be farmed.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SpawnParams;

use super::combatant::Combatant;
use super::terrain::TerrainMap;

/// Chosen spawn location and initial heading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec3,
    /// Facing the map center
    pub body_yaw: f32,
}

/// Scores and picks spawn points, remembering recent picks
#[derive(Debug)]
pub struct SpawnSelector {
    params: SpawnParams,
    margin: f32,
    history: VecDeque<Vec3>,
    rng: ChaCha8Rng,
}

impl SpawnSelector {
    /// `margin` keeps candidates that far inside the map edge
    pub fn new(params: &SpawnParams, margin: f32, seed: u64) -> Self {
        Self {
            params: params.clone(),
            margin,
            history: VecDeque::with_capacity(params.history_len),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Pick a spawn point for `combatant` given the positions of live enemies.
    /// Always succeeds; with no enemies the distance term is a flat maximum.
    pub fn select_spawn_point(
        &mut self,
        combatant: &Combatant,
        enemies: &[Vec3],
        map: &TerrainMap,
    ) -> SpawnPoint {
        let recent: Vec<Vec3> = self
            .history
            .iter()
            .chain(combatant.recent_spawns())
            .copied()
            .collect();

        let mut scored: Vec<(f32, Vec3)> = self
            .candidates(map)
            .into_iter()
            .map(|candidate| (self.score(candidate, enemies, map, &recent), candidate))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let keep = self.params.top_k.min(scored.len()).max(1);
        let position = if scored.is_empty() {
            Vec3::new(0.0, map.height_at(0.0, 0.0), 0.0)
        } else {
            scored[self.rng.gen_range(0..keep)].1
        };

        if self.history.len() >= self.params.history_len {
            self.history.pop_front();
        }
        if self.params.history_len > 0 {
            self.history.push_back(position);
        }

        SpawnPoint {
            position,
            body_yaw: (-position.x).atan2(-position.z),
        }
    }

    /// Forget recent selections (round restart)
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> impl Iterator<Item = &Vec3> {
        self.history.iter()
    }

    /// Candidate positions spread round-robin over all zones
    fn candidates(&mut self, map: &TerrainMap) -> Vec<Vec3> {
        let zones = map.spawn_zones();
        if zones.is_empty() {
            return Vec::new();
        }

        (0..self.params.candidates_total)
            .map(|i| {
                let zone = &zones[i % zones.len()];
                let angle = self.rng.gen_range(0.0..TAU);
                let distance = zone.radius * self.rng.gen_range(0.0f32..1.0).sqrt();
                let (x, z) = map.clamp_to_bounds(
                    zone.center.x + angle.sin() * distance,
                    zone.center.z + angle.cos() * distance,
                    self.margin,
                );
                Vec3::new(x, map.height_at(x, z), z)
            })
            .collect()
    }

    fn score(&self, candidate: Vec3, enemies: &[Vec3], map: &TerrainMap, recent: &[Vec3]) -> f32 {
        let p = &self.params;
        let ground = Vec2::new(candidate.x, candidate.z);
        let mut score = 0.0;

        let nearest = enemies
            .iter()
            .map(|enemy| enemy.distance(candidate))
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        score += p.weight_distance
            * match nearest {
                Some(d) => gaussian(d - p.ideal_enemy_distance, p.enemy_distance_sigma),
                None => 1.0,
            };

        let exposed = enemies
            .iter()
            .filter(|enemy| enemy.distance(candidate) < p.danger_radius)
            .filter(|enemy| !map.segment_obstructed(**enemy, candidate))
            .count();
        score -= p.weight_exposure * exposed as f32;

        let nearby_cover = map
            .covers()
            .iter()
            .filter(|cover| Vec2::new(cover.position.x, cover.position.z).distance(ground) <= p.cover_radius)
            .count()
            .min(3);
        score += p.weight_cover * nearby_cover as f32 / 3.0;

        let from_center = ground.length() / map.half_size();
        score += p.weight_center * gaussian(from_center, p.central_band_sigma);

        let cooling = recent.iter().any(|prev| {
            Vec2::new(prev.x, prev.z).distance(ground) <= p.cooldown_radius
        });
        if cooling {
            score -= p.cooldown_penalty;
        }

        score
    }
}

fn gaussian(offset: f32, sigma: f32) -> f32 {
    (-(offset * offset) / (2.0 * sigma * sigma)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::combatant::CombatantId;
    use crate::game::terrain::CoverObstacle;

    fn setup() -> (GameConfig, Combatant) {
        let config = GameConfig::default();
        let combatant = Combatant::new(CombatantId(1), "tester".into(), false, &config.tank);
        (config, combatant)
    }

    #[test]
    fn spawns_in_bounds_on_terrain_without_enemies() {
        let (config, combatant) = setup();
        let map = TerrainMap::generate(11, &config.terrain);
        let mut selector = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, 5);

        for _ in 0..40 {
            let point = selector.select_spawn_point(&combatant, &[], &map);
            let p = point.position;
            let bound = config.terrain.half_size - config.terrain.edge_margin;
            assert!(p.x.abs() <= bound && p.z.abs() <= bound);
            assert!((p.y - map.height_at(p.x, p.z)).abs() < 1e-5);
        }
    }

    #[test]
    fn recent_selections_are_avoided() {
        let (config, combatant) = setup();
        let map = TerrainMap::generate(23, &config.terrain);
        let mut selector = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, 99);
        let n = config.spawn.history_len;
        let mut picks: Vec<Vec3> = Vec::new();

        for _ in 0..60 {
            let p = selector.select_spawn_point(&combatant, &[], &map).position;
            for prev in picks.iter().rev().take(n) {
                let d = Vec2::new(prev.x, prev.z).distance(Vec2::new(p.x, p.z));
                assert!(d > config.spawn.cooldown_radius, "spawned {d} from a recent pick");
            }
            picks.push(p);
        }
    }

    #[test]
    fn close_enemy_pushes_spawns_away() {
        let (config, combatant) = setup();
        let map = TerrainMap::flat(&config.terrain, Vec::new());
        let enemy = map.spawn_zones()[0].center;
        let mut selector = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, 3);

        for _ in 0..30 {
            selector.reset();
            let p = selector.select_spawn_point(&combatant, &[enemy], &map).position;
            assert!(p.distance(enemy) > config.spawn.danger_radius);
        }
    }

    #[test]
    fn cover_between_enemy_and_candidate_removes_exposure() {
        let (config, _) = setup();
        let open = TerrainMap::flat(&config.terrain, Vec::new());
        let covered = TerrainMap::flat(
            &config.terrain,
            vec![CoverObstacle::new(Vec3::new(0.0, 0.0, 5.0), 1.5, 3.0)],
        );
        let selector = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, 1);
        let candidate = Vec3::ZERO;
        let enemy = Vec3::new(0.0, 0.0, 10.0);

        let exposed = selector.score(candidate, &[enemy], &open, &[]);
        let sheltered = selector.score(candidate, &[enemy], &covered, &[]);
        assert!(sheltered > exposed + config.spawn.weight_exposure * 0.99);
    }

    #[test]
    fn reset_clears_history() {
        let (config, combatant) = setup();
        let map = TerrainMap::flat(&config.terrain, Vec::new());
        let mut selector = SpawnSelector::new(&config.spawn, config.terrain.edge_margin, 1);
        selector.select_spawn_point(&combatant, &[], &map);
        assert_eq!(selector.history().count(), 1);
        selector.reset();
        assert_eq!(selector.history().count(), 0);
    }
}
